//! Site initialization module.
//!
//! Creates a new site from the embedded scaffold:
//!
//! ```text
//! <root>/
//! ├── icecake.toml
//! ├── .gitignore
//! ├── content/
//! │   ├── index.html
//! │   ├── atom.xml
//! │   └── articles/welcome.md
//! ├── layouts/
//! │   ├── base.html
//! │   └── markdown.html
//! └── static/css/style.css
//! ```

use crate::{
    cache::list_relative,
    config::{CONFIG_FILE, SiteConfig},
    debug,
    logger::Logger,
    site::Site,
};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Files to write ignore patterns to
const IGNORE_FILES: &[&str] = &[".gitignore"];

/// Scaffold files, relative to the site root.
const SCAFFOLD: &[(&str, &str)] = &[
    ("layouts/base.html", include_str!("embed/scaffold/layouts/base.html")),
    ("layouts/markdown.html", include_str!("embed/scaffold/layouts/markdown.html")),
    ("content/index.html", include_str!("embed/scaffold/content/index.html")),
    ("content/atom.xml", include_str!("embed/scaffold/content/atom.xml")),
    (
        "content/articles/welcome.md",
        include_str!("embed/scaffold/content/articles/welcome.md"),
    ),
    ("static/css/style.css", include_str!("embed/scaffold/static/css/style.css")),
];

/// Create a new site at `root`.
///
/// A directory that already holds files is refused unless `force` is set.
pub fn new_site(root: &Path, force: bool, config: SiteConfig, logger: Logger) -> Result<Site> {
    if !force && !is_dir_empty(root)? {
        bail!(
            "Path `{}` already contains files; use -f to force initialization",
            root.display()
        );
    }
    Site::initialize(root, config, logger)
}

/// Write every scaffold file plus a default config and ignore file.
pub fn write_scaffold(root: &Path, config: &SiteConfig, logger: &Logger) -> Result<()> {
    for (rel, contents) in SCAFFOLD {
        let target = root.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        debug!(logger; "init"; "writing {}", target.display());
        fs::write(&target, contents)
            .with_context(|| format!("Failed to write {}", target.display()))?;
    }

    init_default_config(root, config)?;
    init_ignored_files(root, &["/output/"])?;
    Ok(())
}

/// Whether `path` holds no files at any depth. A missing path is empty.
fn is_dir_empty(path: &Path) -> Result<bool> {
    Ok(list_relative(path)?.is_empty())
}

/// Write `config` as the site's config file, unless one exists.
fn init_default_config(root: &Path, config: &SiteConfig) -> Result<()> {
    let path = root.join(CONFIG_FILE);
    if path.exists() {
        return Ok(());
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Initialize ignore files with the given patterns, keeping existing ones.
fn init_ignored_files(root: &Path, patterns: &[&str]) -> Result<()> {
    let content = format!("{}\n", patterns.join("\n"));
    for filename in IGNORE_FILES {
        let path = root.join(filename);
        if !path.exists() {
            fs::write(&path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }
    Ok(())
}
