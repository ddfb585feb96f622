//! The parsed representation of one content file.
//!
//! A [`Page`] moves through three steps:
//!
//! ```text
//! Page::new()            identity: filepath, folder, slug, ext, url
//!     │
//! parse_metadata()       tags, date, title, template, slug override
//!     │                  (parsed = true, get_target() becomes valid)
//! render()               content (Markdown only), rendered
//! ```
//!
//! # Path mapping
//!
//! | Source                    | url              | target                       |
//! |---------------------------|------------------|------------------------------|
//! | `content/index.md`        | `/`              | `index.html`                 |
//! | `content/cakes/index.md`  | `/cakes/`        | `cakes/index.html`           |
//! | `content/cakes/choc.html` | `/cakes/choc/`   | `cakes/choc/index.html`      |
//! | `content/feeds/atom.xml`  | `/feeds/atom.xml`| `feeds/atom.xml`             |

use crate::{
    cache::{CONTENT_DIR, cache_key},
    debug,
    logger::Logger,
    metadata::{DELIMITER, Metadata},
    render::{PageContext, RenderContext},
    site::Site,
    warn,
};
use anyhow::{Context, Result};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Extensions rendered with the clean-URL convention
pub const PAGE_EXTS: &[&str] = &[".html", ".md", ".markdown"];
/// Extensions run through the Markdown renderer
pub const MARKDOWN_EXTS: &[&str] = &[".md", ".markdown"];
/// Template used by Markdown pages without a `template` override
pub const DEFAULT_TEMPLATE: &str = "markdown.html";
/// Directory receiving rendered files
pub const OUTPUT_DIR: &str = "output";

pub fn is_markdown_ext(ext: &str) -> bool {
    MARKDOWN_EXTS.contains(&ext)
}

pub fn is_page_ext(ext: &str) -> bool {
    PAGE_EXTS.contains(&ext)
}

/// Turn a `/`-separated key into a platform path.
pub fn key_to_path(key: &str) -> PathBuf {
    key.split('/').filter(|s| !s.is_empty()).collect()
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("`{0}`: target requested before metadata was parsed")]
    NotParsed(String),

    #[error("`{0}` is not inside the content directory")]
    OutsideContent(PathBuf),
}

/// Non-fatal problems found while parsing a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageWarning {
    /// A Markdown file without the front matter separator.
    MissingDelimiter,
    /// A required metadata key is absent.
    MissingField(&'static str),
}

impl fmt::Display for PageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDelimiter => write!(f, "no metadata detected; expected `{DELIMITER}` separator"),
            Self::MissingField(key) => write!(f, "metadata `{key}` not specified"),
        }
    }
}

/// One content file: identity, metadata, body and render output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Path relative to `content/`, `/`-separated.
    pub filepath: String,
    /// Directory part of `filepath`, `""` at the top level.
    pub folder: String,
    /// Final URL segment. `index` collapses to `""`.
    pub slug: String,
    /// Extension including the dot, `""` when there is none.
    pub ext: String,
    pub url: String,

    pub tags: Vec<String>,
    pub date: Option<String>,
    pub title: Option<String>,
    pub template: Option<String>,

    /// Source text after the front matter.
    pub body: String,
    /// Markdown rendered to HTML (Markdown pages only).
    pub content: Option<String>,
    /// Final templated output.
    pub rendered: Option<String>,

    parsed: bool,
    warnings: Vec<PageWarning>,
}

impl Page {
    /// Compute a page's identity from its path.
    ///
    /// `path` is absolute or relative to `root`, and must lie under
    /// `root/content`.
    pub fn new(path: &Path, root: &Path) -> Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let relative = absolute
            .strip_prefix(root.join(CONTENT_DIR))
            .map_err(|_| PageError::OutsideContent(path.to_path_buf()))?;

        let filepath = cache_key(relative);
        let (folder, name) = match filepath.rsplit_once('/') {
            Some((folder, name)) => (folder.to_owned(), name.to_owned()),
            None => (String::new(), filepath.clone()),
        };
        let (stem, ext) = match name.rfind('.') {
            Some(idx) if idx > 0 => (name[..idx].to_owned(), name[idx..].to_owned()),
            _ => (name.clone(), String::new()),
        };
        let slug = if stem == "index" { String::new() } else { stem };

        let mut page = Self {
            filepath,
            folder,
            slug,
            ext,
            url: String::new(),
            tags: Vec::new(),
            date: None,
            title: None,
            template: None,
            body: String::new(),
            content: None,
            rendered: None,
            parsed: false,
            warnings: Vec::new(),
        };
        page.url = page.compute_url();
        Ok(page)
    }

    /// Split `text` into front matter and body and build a page from it.
    pub fn parse_string(path: &Path, site: &Site, text: &str) -> Result<Self> {
        Self::parse_with(path, site.root(), text, site.logger())
    }

    /// Read `path` from disk and parse it.
    pub fn parse_file(path: &Path, site: &Site) -> Result<Self> {
        let absolute = site.root().join(path);
        let text = fs::read_to_string(&absolute)
            .with_context(|| format!("Failed to read {}", absolute.display()))?;
        Self::parse_string(path, site, &text)
    }

    /// [`Page::parse_string`] without a site, for callers that only have a root.
    pub fn parse_with(path: &Path, root: &Path, text: &str, logger: &Logger) -> Result<Self> {
        let mut page = Self::new(path, root)?;

        match text.split_once(DELIMITER) {
            Some((meta, body)) => {
                page.parse_metadata(meta.trim(), logger)?;
                page.body = body.trim().to_owned();
            }
            None => {
                page.body = text.trim().to_owned();
                if page.is_markdown() {
                    page.warn(PageWarning::MissingDelimiter, logger);
                }
                page.parsed = true;
            }
        }

        Ok(page)
    }

    /// Apply a front matter block to this page.
    pub fn parse_metadata(&mut self, text: &str, logger: &Logger) -> Result<()> {
        let meta = Metadata::parse(text)
            .with_context(|| format!("Invalid metadata in {}", self.filepath))?;

        for key in meta.missing_required() {
            self.warn(PageWarning::MissingField(key), logger);
        }

        let Metadata {
            tags,
            date,
            title,
            slug,
            template,
        } = meta;
        self.tags = tags;
        self.date = date;
        self.title = title;
        self.template = template;
        // The derived slug is the only default worth keeping
        if let Some(slug) = slug {
            self.slug = slug;
        }

        self.url = self.compute_url();
        self.parsed = true;
        Ok(())
    }

    /// Output path relative to `output/`.
    pub fn get_target(&self) -> Result<PathBuf, PageError> {
        if !self.parsed {
            return Err(PageError::NotParsed(self.filepath.clone()));
        }
        Ok(self.owned_output())
    }

    /// Output file this page owns below `output/`, for removal.
    ///
    /// Same as [`Page::get_target`] but usable on unparsed pages. Only the
    /// file is owned: a clean-URL directory may also hold the outputs of a
    /// same-named content folder.
    pub fn owned_output(&self) -> PathBuf {
        let mut segments = self.segments();
        if is_page_ext(&self.ext) {
            segments.push("index.html".to_owned());
        }
        segments.iter().collect()
    }

    /// Whether the page is written to its own `folder/slug/` directory.
    pub fn has_own_dir(&self) -> bool {
        is_page_ext(&self.ext) && !self.slug.is_empty()
    }

    /// Render through Markdown (when applicable) and the template engine.
    pub fn render(&mut self, site: &Site) -> Result<&str> {
        debug!(site.logger(); "render"; "{}", self.filepath);

        let template = if self.is_markdown() {
            self.content = Some(site.markdown().render(&self.body, site.markdown_plugins()));
            self.template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_owned())
        } else {
            self.filepath.clone()
        };

        let context = RenderContext {
            page: self.context(),
            site: site.snapshot(),
        };
        let html = site
            .engine()
            .render(&template, site.cache().templates(), &context)
            .with_context(|| format!("Failed to render {}", self.filepath))?;

        Ok(self.rendered.insert(html).as_str())
    }

    /// Render and write to `output/<filepath>`, mirroring the source path.
    pub fn render_to_disk(&mut self, site: &Site) -> Result<PathBuf> {
        let target = site.output_dir().join(key_to_path(&self.filepath));
        let html = self.render(site)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&target, html).with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(target)
    }

    /// Attributes exposed to templates.
    pub fn context(&self) -> PageContext<'_> {
        PageContext {
            filepath: &self.filepath,
            folder: &self.folder,
            slug: &self.slug,
            ext: &self.ext,
            url: &self.url,
            tags: &self.tags,
            date: self.date.as_deref(),
            title: self.title.as_deref(),
            template: self.template.as_deref(),
            body: &self.body,
            content: self.content.as_deref(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    pub fn is_markdown(&self) -> bool {
        is_markdown_ext(&self.ext)
    }

    pub fn warnings(&self) -> &[PageWarning] {
        &self.warnings
    }

    fn warn(&mut self, warning: PageWarning, logger: &Logger) {
        warn!(logger; "page"; "{}: {warning}", self.filepath);
        self.warnings.push(warning);
    }

    fn compute_url(&self) -> String {
        let segments = self.segments();
        match (is_page_ext(&self.ext), segments.is_empty()) {
            (true, true) => "/".to_owned(),
            (true, false) => format!("/{}/", segments.join("/")),
            (false, _) => format!("/{}", segments.join("/")),
        }
    }

    /// Normalized `folder/slug` segments, with the extension appended to the
    /// last one for files without clean URLs.
    fn segments(&self) -> Vec<String> {
        let mut segments: Vec<String> = self
            .folder
            .split('/')
            .chain(self.slug.split('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_owned)
            .collect();
        if !is_page_ext(&self.ext) {
            match segments.last_mut() {
                Some(last) => last.push_str(&self.ext),
                None => segments.push(self.ext.clone()),
            }
        }
        segments
    }
}
