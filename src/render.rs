//! Markdown and template rendering.
//!
//! Both renderers sit behind traits so a [`Site`](crate::site::Site) can be
//! built with other implementations (tests use trivial stubs):
//!
//! - [`MarkdownRenderer`]: text + extension list → HTML ([`CommonMark`])
//! - [`TemplateEngine`]: template name + context → text ([`Jinja`])
//!
//! Templates see every page attribute at the top level plus a `site` object:
//!
//! ```jinja
//! {% for post in site.pages(path="articles", order="-date", limit=5) %}
//!   <a href="{{ post.url }}">{{ post.title }}</a>
//! {% endfor %}
//! {{ site.tags() | join(", ") }}
//! {{ site.atom("Bakery", "https://x.org/atom.xml", "", "https://x.org", "Ann", path="articles") }}
//! ```

use crate::{
    cache::Templates,
    config::MarkdownExtension,
    feed::{self, FeedInfo},
    highlight,
    page::Page,
    query::PageQuery,
};
use anyhow::{Context, Result};
use minijinja::{
    AutoEscape, Environment, Error, ErrorKind, State, Value, context,
    value::{Kwargs, Object, from_args},
};
use pulldown_cmark::{Options, Parser, html};
use serde::Serialize;
use std::{collections::BTreeSet, fmt, sync::Arc};

// ============================================================================
// Markdown
// ============================================================================

pub trait MarkdownRenderer {
    fn render(&self, text: &str, extensions: &[MarkdownExtension]) -> String;
}

/// CommonMark renderer backed by `pulldown-cmark`, with `syntect` code
/// highlighting when [`MarkdownExtension::Highlight`] is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl CommonMark {
    fn options(extensions: &[MarkdownExtension]) -> Options {
        extensions
            .iter()
            .fold(Options::empty(), |options, ext| options | Self::option(*ext))
    }

    const fn option(ext: MarkdownExtension) -> Options {
        match ext {
            MarkdownExtension::Tables => Options::ENABLE_TABLES,
            MarkdownExtension::Footnotes => Options::ENABLE_FOOTNOTES,
            MarkdownExtension::Strikethrough => Options::ENABLE_STRIKETHROUGH,
            MarkdownExtension::Tasklists => Options::ENABLE_TASKLISTS,
            MarkdownExtension::SmartPunctuation => Options::ENABLE_SMART_PUNCTUATION,
            MarkdownExtension::HeadingAttributes => Options::ENABLE_HEADING_ATTRIBUTES,
            // An event pass, not a parser option
            MarkdownExtension::Highlight => Options::empty(),
        }
    }
}

impl MarkdownRenderer for CommonMark {
    fn render(&self, text: &str, extensions: &[MarkdownExtension]) -> String {
        let parser = Parser::new_ext(text, Self::options(extensions));
        let mut out = String::with_capacity(text.len() * 3 / 2);
        if extensions.contains(&MarkdownExtension::Highlight) {
            html::push_html(&mut out, highlight::code_blocks(parser).into_iter());
        } else {
            html::push_html(&mut out, parser);
        }
        out
    }
}

// ============================================================================
// Context
// ============================================================================

/// Page attributes as templates see them.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext<'a> {
    pub filepath: &'a str,
    pub folder: &'a str,
    pub slug: &'a str,
    pub ext: &'a str,
    pub url: &'a str,
    pub tags: &'a [String],
    pub date: Option<&'a str>,
    pub title: Option<&'a str>,
    pub template: Option<&'a str>,
    pub body: &'a str,
    pub content: Option<&'a str>,
}

/// Read-only view of the site's pages, shared with templates.
///
/// Every page in it has been rendered (`content` is set for Markdown).
#[derive(Debug, Clone, Default)]
pub struct SiteSnapshot {
    pages: Arc<Vec<Page>>,
}

impl SiteSnapshot {
    pub fn new(pages: Arc<Vec<Page>>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Sorted union of all tags.
    pub fn tags(&self) -> Vec<String> {
        self.pages
            .iter()
            .flat_map(|page| page.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Everything a template render receives.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub page: PageContext<'a>,
    pub site: SiteSnapshot,
}

// ============================================================================
// Templates
// ============================================================================

pub trait TemplateEngine {
    /// Render template `name`, resolving it and anything it extends or
    /// includes against `templates`.
    fn render(&self, name: &str, templates: Arc<Templates>, ctx: &RenderContext<'_>)
    -> Result<String>;
}

/// Jinja templates via `minijinja`, without auto-escaping.
#[derive(Debug, Clone, Copy, Default)]
pub struct Jinja;

impl TemplateEngine for Jinja {
    fn render(
        &self,
        name: &str,
        templates: Arc<Templates>,
        ctx: &RenderContext<'_>,
    ) -> Result<String> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_loader(move |name| Ok(templates.get(name).cloned()));

        let template = env
            .get_template(name)
            .with_context(|| format!("Failed to load template `{name}`"))?;
        let site = Value::from_object(SiteObject {
            snapshot: ctx.site.clone(),
        });
        let rendered = template
            .render(context! { site => site, ..Value::from_serialize(&ctx.page) })
            .with_context(|| format!("Failed to expand template `{name}`"))?;
        Ok(rendered)
    }
}

/// The `site` value inside templates.
struct SiteObject {
    snapshot: SiteSnapshot,
}

impl fmt::Debug for SiteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteObject")
            .field("pages", &self.snapshot.pages().len())
            .finish()
    }
}

impl Object for SiteObject {
    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match method {
            "pages" => {
                let (kwargs,): (Kwargs,) = from_args(args)?;
                let query = query_from_kwargs(&kwargs)?;
                let pages = query.apply(self.snapshot.pages()).map_err(invalid)?;
                let pages: Vec<_> = pages.iter().map(|page| page.context()).collect();
                Ok(Value::from_serialize(&pages))
            }
            "tags" => {
                let () = from_args(args)?;
                Ok(Value::from_serialize(self.snapshot.tags()))
            }
            // Snapshot pages were rendered by `Site::get_pages` from their
            // current body, so `content` is already fresh for this build.
            "atom" => {
                let split = args.len().min(5);
                let (title, feed_url, subtitle, site_url, author): (
                    String,
                    String,
                    String,
                    String,
                    String,
                ) = from_args(&args[..split])?;
                let (kwargs,): (Kwargs,) = from_args(&args[split..])?;
                let query = query_from_kwargs(&kwargs)?;
                let info = FeedInfo {
                    title,
                    feed_url,
                    subtitle,
                    site_url,
                    author,
                };
                let pages: Vec<Page> = query
                    .apply(self.snapshot.pages())
                    .map_err(invalid)?
                    .into_iter()
                    .cloned()
                    .collect();
                feed::atom(&info, &pages).map(Value::from).map_err(invalid)
            }
            _ => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("site has no method `{method}`"),
            )),
        }
    }
}

fn query_from_kwargs(kwargs: &Kwargs) -> Result<PageQuery, Error> {
    let query = PageQuery {
        path: kwargs.get("path")?,
        tag: kwargs.get("tag")?,
        order: kwargs.get("order")?,
        limit: kwargs.get("limit")?,
    };
    kwargs.assert_all_used()?;
    Ok(query)
}

fn invalid(err: impl fmt::Display) -> Error {
    Error::new(ErrorKind::InvalidOperation, err.to_string())
}

// ============================================================================
// Tests
// ============================================================================
