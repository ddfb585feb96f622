//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build()
//!     │
//!     ├── clean_output()      (when [build] clean is set)
//!     │
//!     ├── get_pages()
//!     │       │
//!     │       └── Parse + render every content file → pagedata
//!     │           (templates see the previous page list)
//!     │
//!     ├── Render every page again → output/<target>
//!     │   (site.pages() now returns the complete list)
//!     │
//!     └── copy_static() ──► static/ → output/
//! ```

use crate::{
    cache::{CONTENT_DIR, PathCache, strip_dir},
    config::{MarkdownExtension, SiteConfig},
    debug,
    feed::{self, FeedInfo},
    init,
    log,
    logger::Logger,
    page::{OUTPUT_DIR, Page, key_to_path},
    query::PageQuery,
    render::{CommonMark, Jinja, MarkdownRenderer, SiteSnapshot, TemplateEngine},
};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// Directory copied verbatim into `output/`
pub const STATIC_DIR: &str = "static";

/// A site rooted at one directory, with its cache and renderers.
pub struct Site {
    root: PathBuf,
    cache: PathCache,
    markdown: Box<dyn MarkdownRenderer>,
    engine: Box<dyn TemplateEngine>,
    config: SiteConfig,
    pagedata: Arc<Vec<Page>>,
    logger: Logger,
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("pagedata", &self.pagedata)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl Site {
    /// Open the site at `root` with the default renderers.
    pub fn open(root: &Path, config: SiteConfig, logger: Logger) -> Result<Self> {
        Self::with_renderers(root, config, logger, Box::new(CommonMark), Box::new(Jinja))
    }

    /// Open the site at `root` with custom renderers.
    pub fn with_renderers(
        root: &Path,
        config: SiteConfig,
        logger: Logger,
        markdown: Box<dyn MarkdownRenderer>,
        engine: Box<dyn TemplateEngine>,
    ) -> Result<Self> {
        let root = normalize_path(root)?;
        let mut cache = PathCache::new(&root);
        debug!(logger; "cache"; "warming {}", root.display());
        cache.warm()?;

        Ok(Self {
            root,
            cache,
            markdown,
            engine,
            config,
            pagedata: Arc::new(Vec::new()),
            logger,
        })
    }

    /// Scaffold a new site at `root`, then open it.
    pub fn initialize(root: &Path, config: SiteConfig, logger: Logger) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create {}", root.display()))?;
        init::write_scaffold(root, &config, &logger)?;
        Self::open(root, config, logger)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut PathCache {
        &mut self.cache
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn markdown(&self) -> &dyn MarkdownRenderer {
        self.markdown.as_ref()
    }

    pub fn markdown_plugins(&self) -> &[MarkdownExtension] {
        &self.config.markdown.extensions
    }

    pub fn engine(&self) -> &dyn TemplateEngine {
        self.engine.as_ref()
    }

    /// The page list as of the last discovery, shared with templates.
    pub fn snapshot(&self) -> SiteSnapshot {
        SiteSnapshot::new(Arc::clone(&self.pagedata))
    }

    /// Parse and render every content file the cache knows about.
    pub fn get_pages(&mut self) -> Result<&[Page]> {
        let keys: Vec<String> = self
            .cache
            .files()
            .filter(|key| strip_dir(key, CONTENT_DIR).is_some())
            .map(str::to_owned)
            .collect();

        let mut pages = Vec::with_capacity(keys.len());
        for key in keys {
            let source = self.root.join(key_to_path(&key));
            if !source.is_file() {
                debug!(self.logger; "pages"; "skipping vanished {key}");
                continue;
            }
            let mut page = Page::parse_file(&source, self)?;
            page.render(self)?;
            pages.push(page);
        }

        self.pagedata = Arc::new(pages);
        Ok(self.pagedata.as_slice())
    }

    /// Build the whole site into `output/`.
    pub fn build(&mut self) -> Result<()> {
        if self.config.build.clean && self.clean_output()? {
            log!(self.logger; "build"; "cleaned {}", OUTPUT_DIR);
        }

        let count = self.get_pages()?.len();
        log!(self.logger; "build"; "found {count} pages");

        let output = self.output_dir();
        let mut pages = self.pagedata.as_ref().clone();
        for page in &mut pages {
            let filepath = page.filepath.clone();
            let target = output.join(page.get_target()?);
            let html = page.render(self)?;

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&target, html)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            debug!(self.logger; "build"; "{filepath} -> {}", target.display());
        }
        self.pagedata = Arc::new(pages);

        let copied = self.copy_static()?;
        log!(self.logger; "build"; "done: {count} pages, {copied} static files");
        Ok(())
    }

    /// Copy `static/` into `output/`, returning the number of files copied.
    pub fn copy_static(&self) -> Result<usize> {
        let source = self.root.join(STATIC_DIR);
        if !source.is_dir() {
            return Ok(0);
        }
        let output = self.output_dir();

        let mut copied = 0;
        for entry in WalkDir::new(&source).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&source) else {
                continue;
            };
            let dest = output.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &dest).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), dest.display())
            })?;
            copied += 1;
        }

        debug!(self.logger; "static"; "copied {copied} files");
        Ok(copied)
    }

    /// Sorted, deduplicated union of every page's tags.
    pub fn tags(&self) -> Vec<String> {
        self.snapshot().tags()
    }

    /// Select pages from the last discovery.
    pub fn pages(&self, query: &PageQuery) -> Result<Vec<&Page>> {
        Ok(query.apply(&self.pagedata)?)
    }

    /// Atom feed over the selected pages, rendered fresh.
    pub fn atom(&self, info: &FeedInfo, query: &PageQuery) -> Result<String> {
        let mut pages: Vec<Page> = self.pages(query)?.into_iter().cloned().collect();
        for page in &mut pages {
            page.render(self)?;
        }
        feed::atom(info, &pages)
    }

    /// Remove `output/`. Returns whether there was anything to remove.
    pub fn clean_output(&self) -> Result<bool> {
        let output = self.output_dir();
        if !output.exists() {
            debug!(self.logger; "build"; "nothing to clean at {}", output.display());
            return Ok(false);
        }
        fs::remove_dir_all(&output)
            .with_context(|| format!("Failed to remove {}", output.display()))?;
        Ok(true)
    }
}

/// Absolute form of `path`, resolving symlinks when it exists.
fn normalize_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Ok(canonical);
    }
    std::path::absolute(path).with_context(|| format!("Invalid site root {}", path.display()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{cache::Templates, render::RenderContext};
    use tempfile::TempDir;

    /// Wraps Markdown bodies in `<md>` so tests can see the renderer ran.
    pub(crate) struct StubMarkdown;

    impl MarkdownRenderer for StubMarkdown {
        fn render(&self, text: &str, _: &[MarkdownExtension]) -> String {
            format!("<md>{text}</md>")
        }
    }

    /// Renders `name|title|content|page count`.
    pub(crate) struct StubEngine;

    impl TemplateEngine for StubEngine {
        fn render(
            &self,
            name: &str,
            templates: Arc<Templates>,
            ctx: &RenderContext<'_>,
        ) -> Result<String> {
            anyhow::ensure!(templates.contains_key(name), "template `{name}` not found");
            Ok(format!(
                "{name}|{}|{}|{}",
                ctx.page.title.unwrap_or_default(),
                ctx.page.content.unwrap_or_default(),
                ctx.site.pages().len()
            ))
        }
    }

    pub(crate) fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(crate) fn stub_site(root: &Path) -> Site {
        Site::with_renderers(
            root,
            SiteConfig::default(),
            Logger::quiet(),
            Box::new(StubMarkdown),
            Box::new(StubEngine),
        )
        .unwrap()
    }

    pub(crate) fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "layouts/markdown.html", "{{ content }}");
        write(root, "content/index.html", "<h1>home</h1>");
        write(root, "content/about.md", "title: About\ndate: 2024-01-01\n++++\nHello");
        write(
            root,
            "content/articles/pie.md",
            "title: Pie\ndate: 2024-02-01\ntags: family baking\n++++\nApple",
        );
        write(
            root,
            "content/articles/cake.md",
            "title: Cake\ndate: 2024-03-01\ntags: family\n++++\nChocolate",
        );
        write(root, "static/css/style.css", "body {}");
        dir
    }

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    #[test]
    fn test_get_pages_sorted_and_rendered() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        let pages = site.get_pages().unwrap();

        let files: Vec<_> = pages.iter().map(|p| p.filepath.as_str()).collect();
        assert_eq!(files, vec!["about.md", "articles/cake.md", "articles/pie.md", "index.html"]);
        assert!(pages.iter().all(|p| p.rendered.is_some()));
        assert_eq!(pages[0].content.as_deref(), Some("<md>Hello</md>"));
    }

    #[test]
    fn test_get_pages_skips_vanished_files() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        fs::remove_file(dir.path().join("content/about.md")).unwrap();
        assert_eq!(site.get_pages().unwrap().len(), 3);
    }

    #[test]
    fn test_build_writes_clean_urls_and_static() {
        let dir = fixture();
        let root = dir.path();
        let mut site = stub_site(root);
        site.build().unwrap();

        assert_eq!(read(root, "output/about/index.html"), "markdown.html|About|<md>Hello</md>|4");
        assert_eq!(read(root, "output/index.html"), "index.html|||4");
        assert!(root.join("output/articles/pie/index.html").is_file());
        assert_eq!(read(root, "output/css/style.css"), "body {}");
    }

    #[test]
    fn test_build_is_idempotent() {
        let dir = fixture();
        let root = dir.path();
        let mut site = stub_site(root);
        site.build().unwrap();
        let first = read(root, "output/articles/cake/index.html");
        site.build().unwrap();
        assert_eq!(read(root, "output/articles/cake/index.html"), first);
        assert_eq!(site.pages(&PageQuery::new()).unwrap().len(), 4);
    }

    #[test]
    fn test_build_fails_on_missing_template() {
        let dir = fixture();
        write(dir.path(), "content/odd.md", "title: Odd\ndate: D\ntemplate: gone.html\n++++\nx");
        let mut site = stub_site(dir.path());
        assert!(site.build().is_err());
    }

    #[test]
    fn test_build_with_clean_removes_stale_output() {
        let dir = fixture();
        let root = dir.path();
        write(root, "output/stale.html", "old");
        let config = SiteConfig {
            build: crate::config::BuildConfig { clean: true },
            ..SiteConfig::default()
        };
        let mut site = Site::with_renderers(
            root,
            config,
            Logger::quiet(),
            Box::new(StubMarkdown),
            Box::new(StubEngine),
        )
        .unwrap();
        site.build().unwrap();
        assert!(!root.join("output/stale.html").exists());
        assert!(root.join("output/index.html").is_file());
    }

    #[test]
    fn test_tags_union() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        site.get_pages().unwrap();
        assert_eq!(site.tags(), vec!["baking", "family"]);
    }

    #[test]
    fn test_pages_filter_composition() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        site.get_pages().unwrap();

        let query = PageQuery::new()
            .path("articles")
            .tag("family")
            .order("-date")
            .limit(2);
        let titles: Vec<_> = site
            .pages(&query)
            .unwrap()
            .iter()
            .map(|p| p.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, vec!["Cake", "Pie"]);
    }

    #[test]
    fn test_pages_order_by_unset_date_fails() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        site.get_pages().unwrap();
        // index.html has no date
        assert!(site.pages(&PageQuery::new().order("date")).is_err());
    }

    #[test]
    fn test_atom_uses_fresh_content() {
        let dir = fixture();
        let mut site = stub_site(dir.path());
        site.get_pages().unwrap();
        let info = FeedInfo {
            title: "Bakery".into(),
            feed_url: "https://x.org/atom.xml".into(),
            site_url: "https://x.org".into(),
            author: "Ann".into(),
            ..FeedInfo::default()
        };
        let xml = site
            .atom(&info, &PageQuery::new().path("articles").order("-date"))
            .unwrap();
        assert!(xml.contains("https://x.org/articles/cake/"));
        assert!(xml.contains("&lt;md&gt;Chocolate&lt;/md&gt;"));
        assert!(!xml.contains("About"));
    }

    #[test]
    fn test_clean_output() {
        let dir = fixture();
        let site = stub_site(dir.path());
        assert!(!site.clean_output().unwrap());
        write(dir.path(), "output/x.html", "x");
        assert!(site.clean_output().unwrap());
        assert!(!dir.path().join("output").exists());
    }

    #[test]
    fn test_copy_static_without_directory() {
        let dir = TempDir::new().unwrap();
        let site = stub_site(dir.path());
        assert_eq!(site.copy_static().unwrap(), 0);
    }

    #[test]
    fn test_build_with_default_renderers() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "layouts/markdown.html", "<t>{{ title }}</t>{{ content }}");
        write(root, "content/a.md", "title: T\ndate: D\n++++\n*B* & <x>");

        let mut site = Site::open(root, SiteConfig::default(), Logger::quiet()).unwrap();
        site.build().unwrap();

        let pages = site.pages(&PageQuery::new()).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].title.as_deref(), Some("T"));
        assert_eq!(pages[0].date.as_deref(), Some("D"));
        assert!(pages[0].content.as_deref().unwrap().contains("<em>B</em>"));
        assert!(read(root, "output/a/index.html").starts_with("<t>T</t><p><em>B</em> &amp; <x></p>"));
    }

    #[test]
    fn test_template_feed_carries_rendered_markdown() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "layouts/markdown.html", "{{ content }}");
        write(root, "content/posts/a.md", "title: A\ndate: 2024-01-01\n++++\n*B*");
        write(
            root,
            "content/atom.xml",
            "{{ site.atom('Feed', 'https://x.org/atom.xml', '', 'https://x.org', 'Ann', path='posts') }}",
        );

        let mut site = Site::open(root, SiteConfig::default(), Logger::quiet()).unwrap();
        site.build().unwrap();

        let xml = read(root, "output/atom.xml");
        assert!(xml.contains("https://x.org/posts/a/"));
        assert!(xml.contains("&lt;em&gt;B&lt;/em&gt;"));
    }

    #[test]
    fn test_initialize_then_build() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("bakery");
        let mut site = Site::initialize(&root, SiteConfig::default(), Logger::quiet()).unwrap();
        site.build().unwrap();

        assert!(root.join(crate::config::CONFIG_FILE).is_file());
        assert!(root.join("output/index.html").is_file());
        assert!(root.join("output/atom.xml").is_file());
        assert!(root.join("output/css/style.css").is_file());
    }
}
