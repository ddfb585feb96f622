//! File system watcher for incremental re-rendering.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Watcher::watch()                      │
//! │                                                              │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────────────┐  │
//! │  │ EventSource │──▶│  FsEvent     │──▶│  ChangeHandler    │  │
//! │  │ (notify,    │   │  (created,   │   │  on_created       │  │
//! │  │  1s poll)   │   │   modified,  │   │  on_modified      │  │
//! │  └─────────────┘   │   deleted,   │   │  on_deleted       │  │
//! │                    │   moved)     │   │  on_moved         │  │
//! │                    └──────────────┘   └─────────┬─────────┘  │
//! │                                                 ▼            │
//! │                                      PathCache + output/     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The handler works on the cache and the disk only; the site's page list
//! from the last build is left as it was. Incrementally rendered pages are
//! written to `output/<filepath>`, mirroring the source path.

use crate::{
    cache::{CONTENT_DIR, LAYOUTS_DIR, cache_key, list_relative, strip_dir},
    debug, log,
    page::{Page, key_to_path},
    site::Site,
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _,
    event::{ModifyKind, RenameMode},
};
use std::{
    collections::VecDeque,
    fs, mem,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    time::Duration,
};

/// How long one poll of the event source may block.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Events
// =============================================================================

/// A filesystem change, absolute or relative to the site root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

/// What the handler did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A page was written to this path.
    Rendered(PathBuf),
    /// Source left the cache; these output paths were removed.
    Removed(Vec<PathBuf>),
    /// A layout was (re)loaded into the cache.
    Cached,
    /// The file content did not change.
    Unchanged,
    /// Outside the watched directories, an editor artifact, or not a file.
    Ignored,
    /// Old outputs removed, pages under the new path rendered.
    Moved {
        removed: Vec<PathBuf>,
        rendered: Vec<PathBuf>,
    },
}

/// Result of one poll of an [`EventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Event(FsEvent),
    /// Nothing happened within the timeout.
    Idle,
    /// The source will not deliver any more events.
    Closed,
}

/// Delivers filesystem events for scheduled directories.
pub trait EventSource {
    fn schedule(&mut self, root: &Path, recursive: bool) -> Result<()>;
    fn next_event(&mut self, timeout: Duration) -> Result<Next>;
    fn stop(&mut self);
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
        || name.starts_with('#')
}

// =============================================================================
// notify adapter
// =============================================================================

/// [`EventSource`] backed by the platform's recommended `notify` watcher.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    pending: VecDeque<FsEvent>,
    watched: Vec<PathBuf>,
}

impl NotifySource {
    pub fn new() -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
        Ok(Self {
            watcher,
            rx,
            pending: VecDeque::new(),
            watched: Vec::new(),
        })
    }
}

impl EventSource for NotifySource {
    fn schedule(&mut self, root: &Path, recursive: bool) -> Result<()> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher
            .watch(root, mode)
            .with_context(|| format!("Failed to watch {}", root.display()))?;
        self.watched.push(root.to_path_buf());
        Ok(())
    }

    fn next_event(&mut self, timeout: Duration) -> Result<Next> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Next::Event(event));
        }
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                self.pending.extend(translate(event));
                Ok(self.pending.pop_front().map_or(Next::Idle, Next::Event))
            }
            Ok(Err(err)) => Err(err).context("File watcher error"),
            Err(RecvTimeoutError::Timeout) => Ok(Next::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(Next::Closed),
        }
    }

    fn stop(&mut self) {
        for path in mem::take(&mut self.watched) {
            // Already gone when the directory was removed
            let _ = self.watcher.unwatch(&path);
        }
    }
}

/// Map a raw `notify` event onto zero or more [`FsEvent`]s.
fn translate(event: Event) -> Vec<FsEvent> {
    let Event { kind, mut paths, .. } = event;
    match kind {
        EventKind::Create(_) => paths.into_iter().map(FsEvent::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsEvent::Deleted).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let to = paths.pop().unwrap_or_default();
            let from = paths.pop().unwrap_or_default();
            vec![FsEvent::Moved { from, to }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(FsEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(FsEvent::Created).collect()
        }
        // Unpaired renames: decide by what is on disk now
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    FsEvent::Created(path)
                } else {
                    FsEvent::Deleted(path)
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths.into_iter().map(FsEvent::Modified).collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Change handler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Content,
    Layouts,
    Other,
}

fn area(key: &str) -> Area {
    if strip_dir(key, CONTENT_DIR).is_some() {
        Area::Content
    } else if strip_dir(key, LAYOUTS_DIR).is_some() {
        Area::Layouts
    } else {
        Area::Other
    }
}

/// Applies filesystem events to a site's cache and output.
pub struct ChangeHandler {
    site: Site,
}

impl ChangeHandler {
    pub fn new(site: Site) -> Self {
        Self { site }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Route an event to its handler, skipping editor artifacts.
    pub fn dispatch(&mut self, event: &FsEvent) -> Result<Outcome> {
        match event {
            FsEvent::Created(path) if !is_temp_file(path) => self.on_created(path),
            FsEvent::Modified(path) if !is_temp_file(path) => self.on_modified(path),
            FsEvent::Deleted(path) if !is_temp_file(path) => self.on_deleted(path),
            FsEvent::Moved { from, to } => match (is_temp_file(from), is_temp_file(to)) {
                (false, false) => self.on_moved(from, to),
                // Save-by-rename: a temp file replaced the real one
                (true, false) => self.on_modified(to),
                (false, true) => self.on_deleted(from),
                (true, true) => Ok(Outcome::Ignored),
            },
            _ => Ok(Outcome::Ignored),
        }
    }

    /// Load a new file; content files are rendered straight away.
    pub fn on_created(&mut self, path: &Path) -> Result<Outcome> {
        let Some(key) = self.key(path) else {
            return Ok(Outcome::Ignored);
        };
        let area = area(&key);
        if area == Area::Other {
            return Ok(Outcome::Ignored);
        }

        let Some(text) = self.site.cache_mut().read(&key)? else {
            return Ok(Outcome::Ignored);
        };
        match area {
            Area::Content => self.render(&key, &text),
            _ => {
                log!(self.site.logger(); "watch"; "loaded {key}");
                Ok(Outcome::Cached)
            }
        }
    }

    /// Re-render a content file whose text changed on disk.
    pub fn on_modified(&mut self, path: &Path) -> Result<Outcome> {
        let Some(key) = self.key(path) else {
            return Ok(Outcome::Ignored);
        };
        let area = area(&key);
        if area == Area::Other {
            return Ok(Outcome::Ignored);
        }

        let cached = self.site.cache().get(&key).map(str::to_owned);
        let Some(fresh) = self.site.cache_mut().read(&key)? else {
            return Ok(Outcome::Ignored);
        };
        if cached.as_deref() == Some(fresh.as_str()) {
            debug!(self.site.logger(); "watch"; "{key} unchanged");
            return Ok(Outcome::Unchanged);
        }

        match area {
            Area::Content => self.render(&key, &fresh),
            _ => {
                log!(self.site.logger(); "watch"; "reloaded {key}");
                Ok(Outcome::Cached)
            }
        }
    }

    /// Drop a file or directory from the cache and remove its outputs.
    pub fn on_deleted(&mut self, path: &Path) -> Result<Outcome> {
        let Some(key) = self.key(path) else {
            return Ok(Outcome::Ignored);
        };
        if area(&key) == Area::Other {
            return Ok(Outcome::Ignored);
        }

        let removed = self.remove_outputs(&key)?;
        self.site.cache_mut().delete_tree(&key);

        for path in &removed {
            log!(self.site.logger(); "watch"; "removed {}", self.display(path));
        }
        Ok(Outcome::Removed(removed))
    }

    /// Remove the old outputs, move the cache entries, render the new pages.
    pub fn on_moved(&mut self, from: &Path, to: &Path) -> Result<Outcome> {
        let old = self.key(from).filter(|key| area(key) != Area::Other);
        let new = self.key(to).filter(|key| area(key) != Area::Other);

        let mut removed = Vec::new();
        let mut moved = Vec::new();
        if let Some(old) = &old {
            removed = self.remove_outputs(old)?;
            let entries = self.cached_entries(old);
            for (key, _) in entries {
                match &new {
                    Some(new) => {
                        let target = format!("{new}{}", &key[old.len()..]);
                        self.site.cache_mut().move_file(&key, &target);
                        moved.push(target);
                    }
                    None => {
                        self.site.cache_mut().delete_tree(&key);
                    }
                }
            }
        }

        let mut rendered = Vec::new();
        if moved.is_empty() {
            // Not cached before: treat whatever arrived as new
            if let Some(new) = &new {
                let absolute = self.site.root().join(key_to_path(new));
                let keys = if absolute.is_dir() {
                    list_relative(&absolute)?
                        .into_iter()
                        .map(|rel| format!("{new}/{rel}"))
                        .collect()
                } else {
                    vec![new.clone()]
                };
                for key in keys {
                    rendered.extend(rendered_paths(self.on_created(&key_to_path(&key))?));
                }
            }
        } else {
            for key in moved.into_iter().filter(|key| area(key) == Area::Content) {
                if let Some(text) = self.site.cache_mut().read(&key)? {
                    rendered.extend(rendered_paths(self.render(&key, &text)?));
                }
            }
        }

        Ok(Outcome::Moved { removed, rendered })
    }

    /// Cache key for an event path, `None` when outside the site root.
    fn key(&self, path: &Path) -> Option<String> {
        if path.is_absolute() {
            return path.strip_prefix(self.site.root()).ok().map(cache_key);
        }
        Some(cache_key(path))
    }

    /// Cached entries at or below `key`, cloned out of the cache.
    fn cached_entries(&self, key: &str) -> Vec<(String, String)> {
        let nested = format!("{key}/");
        let cache = self.site.cache();
        cache
            .files()
            .filter(|k| *k == key || k.starts_with(&nested))
            .filter_map(|k| cache.get(k).map(|text| (k.to_owned(), text.to_owned())))
            .collect()
    }

    /// Delete the outputs produced for content at or below `key`.
    ///
    /// Slug overrides are taken from the cached text when there is one. A
    /// clean-URL directory goes only once it is empty.
    fn remove_outputs(&self, key: &str) -> Result<Vec<PathBuf>> {
        if area(key) != Area::Content {
            return Ok(Vec::new());
        }

        let entries = self.cached_entries(key);
        let pages: Vec<Page> = if entries.is_empty() {
            // Unknown to the cache; fall back to the path-derived identity
            vec![Page::new(&key_to_path(key), self.site.root())?]
        } else {
            entries
                .iter()
                .map(|(k, text)| self.stale_page(k, text))
                .collect::<Result<_>>()?
        };

        let output = self.site.output_dir();
        let mut removed = Vec::new();
        for page in pages {
            let mirror = output.join(key_to_path(&page.filepath));
            let owned = output.join(page.owned_output());
            for path in [&mirror, &owned] {
                if remove_file(path)? {
                    removed.push(path.clone());
                }
            }
            if page.has_own_dir()
                && let Some(dir) = owned.parent()
            {
                remove_empty_dir(dir)?;
            }
        }
        Ok(removed)
    }

    /// Page identity of cached text, tolerating broken front matter.
    fn stale_page(&self, key: &str, text: &str) -> Result<Page> {
        let source = self.site.root().join(key_to_path(key));
        match Page::parse_string(&source, &self.site, text) {
            Ok(page) => Ok(page),
            Err(_) => Page::new(&source, self.site.root()),
        }
    }

    fn render(&mut self, key: &str, text: &str) -> Result<Outcome> {
        let source = self.site.root().join(key_to_path(key));
        let mut page = Page::parse_string(&source, &self.site, text)?;
        let target = page.render_to_disk(&self.site)?;
        log!(self.site.logger(); "watch"; "rendered {}", self.display(&target));
        Ok(Outcome::Rendered(target))
    }

    fn display(&self, path: &Path) -> String {
        cache_key(path.strip_prefix(self.site.root()).unwrap_or(path))
    }
}

fn rendered_paths(outcome: Outcome) -> Option<PathBuf> {
    match outcome {
        Outcome::Rendered(path) => Some(path),
        _ => None,
    }
}

/// Remove a regular file. Returns whether there was one.
fn remove_file(path: &Path) -> Result<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

/// Remove `dir` if it exists and holds nothing.
fn remove_empty_dir(dir: &Path) -> Result<()> {
    let Ok(mut entries) = fs::read_dir(dir) else {
        return Ok(());
    };
    if entries.next().is_none() {
        fs::remove_dir(dir).with_context(|| format!("Failed to remove {}", dir.display()))?;
    }
    Ok(())
}

// =============================================================================
// Watcher
// =============================================================================

/// Feeds events from a source into a [`ChangeHandler`] until shut down.
pub struct Watcher<S: EventSource> {
    handler: ChangeHandler,
    source: S,
}

impl<S: EventSource> Watcher<S> {
    pub fn new(site: Site, source: S) -> Self {
        Self {
            handler: ChangeHandler::new(site),
            source,
        }
    }

    pub fn handler(&self) -> &ChangeHandler {
        &self.handler
    }

    /// Block until `shutdown` is set or the source closes.
    ///
    /// Handler failures are logged and do not stop the loop.
    pub fn watch(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let root = self.handler.site().root().to_path_buf();
        let logger = *self.handler.site().logger();

        for dir in [CONTENT_DIR, LAYOUTS_DIR] {
            let path = root.join(dir);
            if path.is_dir() {
                self.source.schedule(&path, true)?;
                log!(logger; "watch"; "watching {dir}/");
            }
        }

        while !shutdown.load(Ordering::SeqCst) {
            match self.source.next_event(POLL_INTERVAL) {
                Ok(Next::Event(event)) => {
                    debug!(logger; "watch"; "{event:?}");
                    if let Err(err) = self.handler.dispatch(&event) {
                        log!(logger; "error"; "{err:#}");
                    }
                }
                Ok(Next::Idle) => {}
                Ok(Next::Closed) => break,
                Err(err) => log!(logger; "error"; "{err:#}"),
            }
        }

        self.source.stop();
        log!(logger; "watch"; "stopped");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::tests::{fixture, stub_site, write};
    use notify::event::{CreateKind, RemoveKind};

    /// Replays queued events, then reports the source closed.
    #[derive(Default)]
    struct ChannelSource {
        queue: VecDeque<FsEvent>,
        scheduled: Vec<PathBuf>,
        stopped: bool,
    }

    impl ChannelSource {
        fn with(events: Vec<FsEvent>) -> Self {
            Self {
                queue: events.into(),
                ..Self::default()
            }
        }
    }

    impl EventSource for ChannelSource {
        fn schedule(&mut self, root: &Path, _recursive: bool) -> Result<()> {
            self.scheduled.push(root.to_path_buf());
            Ok(())
        }

        fn next_event(&mut self, _timeout: Duration) -> Result<Next> {
            Ok(self.queue.pop_front().map_or(Next::Closed, Next::Event))
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    fn built_handler(root: &Path) -> ChangeHandler {
        let mut site = stub_site(root);
        site.build().unwrap();
        ChangeHandler::new(site)
    }

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn test_modify_renders_fresh_content_once() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));

        write(root, "content/about.md", "title: About us\ndate: 2024-01-01\n++++\nHi");
        let outcome = handler.on_modified(Path::new("content/about.md")).unwrap();
        assert_eq!(outcome, Outcome::Rendered(handler.site().root().join("output/about.md")));
        assert!(read(root, "output/about.md").contains("About us|<md>Hi</md>"));

        let outcome = handler.on_modified(Path::new("content/about.md")).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[test]
    fn test_modify_without_change() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        let outcome = handler.on_modified(Path::new("content/index.html")).unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn test_modify_absolute_path() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        write(dir.path(), "content/index.html", "<h1>new</h1>");
        let path = handler.site().root().join("content/index.html");
        assert!(matches!(handler.on_modified(&path).unwrap(), Outcome::Rendered(_)));
        assert_eq!(handler.site().cache().get("content/index.html"), Some("<h1>new</h1>"));
    }

    #[test]
    fn test_modify_layout_updates_cache_only() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        write(dir.path(), "layouts/markdown.html", "<div>{{ content }}</div>");
        let outcome = handler.on_modified(Path::new("layouts/markdown.html")).unwrap();
        assert_eq!(outcome, Outcome::Cached);
        assert_eq!(
            handler.site().cache().templates().get("markdown.html").map(String::as_str),
            Some("<div>{{ content }}</div>")
        );
    }

    #[test]
    fn test_create_content_renders() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));

        write(root, "content/articles/tart.md", "title: Tart\ndate: 2024-04-01\n++++\nLemon");
        let outcome = handler.on_created(Path::new("content/articles/tart.md")).unwrap();
        assert!(matches!(outcome, Outcome::Rendered(_)));
        assert!(read(root, "output/articles/tart.md").contains("Tart"));
        assert!(handler.site().cache().contains("content/articles/tart.md"));
    }

    #[test]
    fn test_create_layout_is_cached() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        write(dir.path(), "layouts/post.html", "{{ content }}");
        let outcome = handler.on_created(Path::new("layouts/post.html")).unwrap();
        assert_eq!(outcome, Outcome::Cached);
        assert!(handler.site().cache().templates().contains_key("post.html"));
    }

    #[test]
    fn test_create_outside_watched_dirs_is_ignored() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        write(dir.path(), "static/new.css", "a {}");
        let outcome = handler.on_created(Path::new("static/new.css")).unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(
            handler.on_created(Path::new("/elsewhere/content/a.md")).unwrap(),
            Outcome::Ignored
        );
    }

    #[test]
    fn test_create_with_bad_metadata_fails() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        write(dir.path(), "content/bad.md", "no separator here\n++++\nbody");
        assert!(handler.on_created(Path::new("content/bad.md")).is_err());
    }

    #[test]
    fn test_delete_page_removes_its_outputs() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = built_handler(root);

        fs::remove_file(root.join("content/articles/pie.md")).unwrap();
        let outcome = handler.on_deleted(Path::new("content/articles/pie.md")).unwrap();

        let output = handler.site().output_dir();
        assert_eq!(outcome, Outcome::Removed(vec![output.join("articles/pie/index.html")]));
        assert!(!root.join("output/articles/pie").exists());
        assert!(root.join("output/articles/cake/index.html").is_file());
        assert!(!handler.site().cache().contains("content/articles/pie.md"));
    }

    #[test]
    fn test_delete_index_keeps_siblings() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = built_handler(root);

        fs::remove_file(root.join("content/index.html")).unwrap();
        handler.on_deleted(Path::new("content/index.html")).unwrap();

        assert!(!root.join("output/index.html").exists());
        assert!(root.join("output/about/index.html").is_file());
        assert!(root.join("output/css/style.css").is_file());
        assert!(!handler.site().cache().templates().contains_key("index.html"));
    }

    #[test]
    fn test_delete_page_named_like_folder_keeps_folder() {
        let dir = fixture();
        let root = dir.path();
        write(root, "content/articles.md", "title: Articles\ndate: D\n++++\nall");
        let mut handler = built_handler(root);
        assert!(root.join("output/articles/index.html").is_file());

        fs::remove_file(root.join("content/articles.md")).unwrap();
        let outcome = handler.on_deleted(Path::new("content/articles.md")).unwrap();

        let output = handler.site().output_dir();
        assert_eq!(outcome, Outcome::Removed(vec![output.join("articles/index.html")]));
        assert!(root.join("output/articles/pie/index.html").is_file());
        assert!(root.join("output/articles/cake/index.html").is_file());
    }

    #[test]
    fn test_delete_honors_slug_override() {
        let dir = fixture();
        let root = dir.path();
        write(root, "content/articles/long-name.md", "title: S\ndate: D\nslug: short\n++++\nx");
        let mut handler = built_handler(root);
        assert!(root.join("output/articles/short/index.html").is_file());

        fs::remove_file(root.join("content/articles/long-name.md")).unwrap();
        handler.on_deleted(Path::new("content/articles/long-name.md")).unwrap();
        assert!(!root.join("output/articles/short").exists());
    }

    #[test]
    fn test_delete_removes_incremental_mirror() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));
        write(root, "content/about.md", "title: New\ndate: D\n++++\nx");
        handler.on_modified(Path::new("content/about.md")).unwrap();
        assert!(root.join("output/about.md").is_file());

        fs::remove_file(root.join("content/about.md")).unwrap();
        handler.on_deleted(Path::new("content/about.md")).unwrap();
        assert!(!root.join("output/about.md").exists());
    }

    #[test]
    fn test_delete_directory() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = built_handler(root);

        fs::remove_dir_all(root.join("content/articles")).unwrap();
        let outcome = handler.on_deleted(Path::new("content/articles")).unwrap();

        assert!(matches!(outcome, Outcome::Removed(paths) if paths.len() == 2));
        assert!(!root.join("output/articles/pie").exists());
        assert!(!root.join("output/articles/cake").exists());
        assert!(handler.site().cache().files().all(|k| !k.starts_with("content/articles")));
    }

    #[test]
    fn test_delete_outside_is_ignored() {
        let dir = fixture();
        let mut handler = built_handler(dir.path());
        let outcome = handler.on_deleted(Path::new("static/css/style.css")).unwrap();
        assert_eq!(outcome, Outcome::Ignored);
        assert!(dir.path().join("output/css/style.css").is_file());
    }

    #[test]
    fn test_move_propagates() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = built_handler(root);

        fs::rename(root.join("content/about.md"), root.join("content/info.md")).unwrap();
        let outcome = handler
            .on_moved(Path::new("content/about.md"), Path::new("content/info.md"))
            .unwrap();

        let output = handler.site().output_dir();
        assert_eq!(
            outcome,
            Outcome::Moved {
                removed: vec![output.join("about/index.html")],
                rendered: vec![output.join("info.md")],
            }
        );
        let cache = handler.site().cache();
        assert!(!cache.contains("content/about.md"));
        assert!(cache.contains("content/info.md"));
    }

    #[test]
    fn test_move_out_of_content() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = built_handler(root);

        fs::rename(root.join("content/about.md"), root.join("about.md")).unwrap();
        let outcome = handler
            .on_moved(Path::new("content/about.md"), Path::new("about.md"))
            .unwrap();
        assert!(matches!(outcome, Outcome::Moved { rendered, .. } if rendered.is_empty()));
        assert!(!handler.site().cache().contains("content/about.md"));
        assert!(!handler.site().cache().contains("about.md"));
    }

    #[test]
    fn test_move_into_content_renders() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));
        write(root, "drafts/tart.md", "title: Tart\ndate: D\n++++\nx");
        fs::create_dir_all(root.join("content/articles")).unwrap();
        fs::rename(root.join("drafts/tart.md"), root.join("content/articles/tart.md")).unwrap();

        let outcome = handler
            .on_moved(Path::new("drafts/tart.md"), Path::new("content/articles/tart.md"))
            .unwrap();
        assert!(matches!(outcome, Outcome::Moved { rendered, .. } if rendered.len() == 1));
    }

    #[test]
    fn test_move_directory_into_content() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));
        write(root, "drafts/pies/apple.md", "title: Apple\ndate: D\n++++\nx");
        write(root, "drafts/pies/plum.md", "title: Plum\ndate: D\n++++\nx");
        fs::rename(root.join("drafts/pies"), root.join("content/pies")).unwrap();

        let outcome = handler
            .on_moved(Path::new("drafts/pies"), Path::new("content/pies"))
            .unwrap();
        assert!(matches!(outcome, Outcome::Moved { rendered, .. } if rendered.len() == 2));
        assert!(handler.site().cache().contains("content/pies/plum.md"));
    }

    #[test]
    fn test_temp_files_are_ignored() {
        let dir = fixture();
        let mut handler = ChangeHandler::new(stub_site(dir.path()));
        for name in ["content/.about.md.swp", "content/about.md~", "content/x.tmp"] {
            let outcome = handler.dispatch(&FsEvent::Created(PathBuf::from(name))).unwrap();
            assert_eq!(outcome, Outcome::Ignored, "{name}");
        }
    }

    #[test]
    fn test_save_by_rename_is_a_modification() {
        let dir = fixture();
        let root = dir.path();
        let mut handler = ChangeHandler::new(stub_site(root));
        write(root, "content/about.md", "title: Saved\ndate: D\n++++\nx");
        let outcome = handler
            .dispatch(&FsEvent::Moved {
                from: PathBuf::from("content/.about.md.tmp"),
                to: PathBuf::from("content/about.md"),
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Rendered(_)));
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("a/.hidden")));
        assert!(is_temp_file(Path::new("a/b.swp")));
        assert!(is_temp_file(Path::new("a/b.md~")));
        assert!(is_temp_file(Path::new("a/#b.md#")));
        assert!(!is_temp_file(Path::new("a/b.md")));
    }

    #[test]
    fn test_translate_notify_events() {
        let p = PathBuf::from("/site/content/a.md");
        let q = PathBuf::from("/site/content/b.md");

        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(p.clone());
        assert_eq!(translate(event), vec![FsEvent::Created(p.clone())]);

        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path(p.clone());
        assert_eq!(translate(event), vec![FsEvent::Deleted(p.clone())]);

        let event = Event::new(EventKind::Modify(ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(p.clone());
        assert_eq!(translate(event), vec![FsEvent::Modified(p.clone())]);

        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(p.clone())
            .add_path(q.clone());
        assert_eq!(translate(event), vec![FsEvent::Moved { from: p.clone(), to: q }]);

        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(p);
        assert!(translate(event).is_empty());
    }

    #[test]
    fn test_watcher_keeps_going_after_failures() {
        let dir = fixture();
        let root = dir.path();
        let site = stub_site(root);
        write(root, "content/bad.md", "not metadata\n++++\nbody");
        write(root, "content/about.md", "title: Changed\ndate: D\n++++\nx");

        let source = ChannelSource::with(vec![
            FsEvent::Modified(PathBuf::from("content/bad.md")),
            FsEvent::Modified(PathBuf::from("content/about.md")),
        ]);
        let mut watcher = Watcher::new(site, source);
        watcher.watch(&AtomicBool::new(false)).unwrap();

        assert!(read(root, "output/about.md").contains("Changed"));
        let site_root = watcher.handler().site().root().to_path_buf();
        assert_eq!(
            watcher.source.scheduled,
            vec![site_root.join("content"), site_root.join("layouts")]
        );
        assert!(watcher.source.stopped);
    }

    #[test]
    fn test_watcher_honors_shutdown() {
        let dir = fixture();
        let source = ChannelSource::with(vec![FsEvent::Created(PathBuf::from("content/a.md"))]);
        let mut watcher = Watcher::new(stub_site(dir.path()), source);
        watcher.watch(&AtomicBool::new(true)).unwrap();
        assert_eq!(watcher.source.queue.len(), 1);
        assert!(watcher.source.stopped);
    }
}
