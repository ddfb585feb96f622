//! In-memory mirror of the site's source files.
//!
//! [`PathCache`] maps root-relative paths (`content/about.md`) to their text
//! and keeps a second map of named templates, which is what the template
//! engine resolves names against:
//!
//! | Source path                  | Template name        |
//! |------------------------------|----------------------|
//! | `layouts/base.html`          | `base.html`          |
//! | `content/feeds/atom.xml`     | `feeds/atom.xml`     |
//! | `content/posts/hello.md`     | (none, Markdown)     |
//!
//! Keys always use `/` separators regardless of platform.

use crate::page::is_markdown_ext;
use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use walkdir::WalkDir;

/// Directory holding pages
pub const CONTENT_DIR: &str = "content";
/// Directory holding shared templates
pub const LAYOUTS_DIR: &str = "layouts";

/// Named templates, shared with the template engine.
pub type Templates = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("`{0}` is not in the cache")]
    Missing(String),
}

/// Convert a relative path into a cache key (`/`-separated).
pub fn cache_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip `dir/` from a key, if the key lives under `dir`.
pub fn strip_dir<'a>(key: &'a str, dir: &str) -> Option<&'a str> {
    key.strip_prefix(dir)?.strip_prefix('/')
}

/// Extension of a cache key including the dot, or `""`.
fn key_ext(key: &str) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &name[idx..],
    }
}

/// Lazily or eagerly populated file and template cache.
#[derive(Debug, Clone)]
pub struct PathCache {
    root: PathBuf,
    files: BTreeMap<String, String>,
    templates: Arc<Templates>,
}

impl PathCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
            templates: Arc::new(Templates::new()),
        }
    }

    /// Read fresh data from disk without storing it.
    ///
    /// Returns `None` when no regular file exists at `path`.
    pub fn peek(&self, path: &str) -> Result<Option<String>> {
        let file = self.root.join(path);
        if !file.is_file() {
            return Ok(None);
        }
        match fs::read_to_string(&file) {
            Ok(content) => Ok(Some(content)),
            // Vanished between the check and the read
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", file.display())),
        }
    }

    /// Read fresh data from disk and store it.
    pub fn read(&mut self, path: &str) -> Result<Option<String>> {
        let content = self.peek(path)?;
        if let Some(content) = &content {
            self.set(path, content.clone());
        }
        Ok(content)
    }

    /// Store `content` under `path`, projecting it into the template map
    /// when it is a layout or a non-Markdown content file.
    pub fn set(&mut self, path: &str, content: String) {
        if let Some(name) = Self::template_name(path) {
            Arc::make_mut(&mut self.templates).insert(name.to_owned(), content.clone());
        }
        self.files.insert(path.to_owned(), content);
    }

    /// Cached content, no disk access.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Remove `path`, returning its content. Callers check presence first.
    pub fn delete(&mut self, path: &str) -> Result<String, CacheError> {
        let content = self
            .files
            .remove(path)
            .ok_or_else(|| CacheError::Missing(path.to_owned()))?;
        if let Some(name) = Self::template_name(path) {
            Arc::make_mut(&mut self.templates).remove(name);
        }
        Ok(content)
    }

    /// Remove every entry at or below the directory `prefix`.
    ///
    /// Returns the removed keys.
    pub fn delete_tree(&mut self, prefix: &str) -> Vec<String> {
        let nested = format!("{prefix}/");
        let doomed: Vec<String> = self
            .files
            .keys()
            .filter(|key| *key == prefix || key.starts_with(&nested))
            .cloned()
            .collect();
        for key in &doomed {
            // Keys were just collected from the map
            let _ = self.delete(key);
        }
        doomed
    }

    /// Move an entry. Does nothing when `old` is not cached.
    pub fn move_file(&mut self, old: &str, new: &str) {
        let Some(content) = self.files.get(old).cloned() else {
            return;
        };
        self.set(new, content);
        // Present: checked above
        let _ = self.delete(old);
    }

    /// Read every file under `content/` and `layouts/`.
    pub fn warm(&mut self) -> Result<()> {
        for dir in [CONTENT_DIR, LAYOUTS_DIR] {
            for key in list_relative(&self.root.join(dir))? {
                self.read(&format!("{dir}/{key}"))?;
            }
        }
        Ok(())
    }

    /// Cached keys in sorted order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Snapshot of the template map; cheap to clone.
    pub fn templates(&self) -> Arc<Templates> {
        Arc::clone(&self.templates)
    }

    /// Template name a cache key is published under, if any.
    fn template_name(path: &str) -> Option<&str> {
        if let Some(name) = strip_dir(path, CONTENT_DIR)
            && !is_markdown_ext(key_ext(path))
        {
            return Some(name);
        }
        strip_dir(path, LAYOUTS_DIR)
    }
}

/// List files below `dir` as sorted, `/`-separated relative keys.
///
/// A missing directory yields an empty list.
pub fn list_relative(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(dir) {
            found.push(cache_key(rel));
        }
    }
    found.sort();
    Ok(found)
}
