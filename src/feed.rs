//! Atom feed generation.
//!
//! Every selected page becomes one entry:
//!
//! | Entry field           | Source                       |
//! |-----------------------|------------------------------|
//! | `title`               | page `title` (or filepath)   |
//! | `id`, `link`          | `site_url + page.url`        |
//! | `content` (html)      | rendered Markdown content    |
//! | `author`              | feed author                  |
//! | `published`/`updated` | page `date`, parsed          |
//!
//! The feed's own `updated` is the newest entry date.

use crate::{date, page::Page};
use anyhow::Result;
use atom_syndication::{Content, Entry, Feed, FixedDateTime, Link, Person, Text};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("`{0}` has no date; feed entries need one")]
    MissingDate(String),

    #[error("`{filepath}`: cannot parse date `{date}`")]
    InvalidDate { filepath: String, date: String },
}

/// Feed-level information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedInfo {
    pub title: String,
    /// Absolute URL of the feed document itself.
    pub feed_url: String,
    pub subtitle: String,
    /// Absolute site URL, prefixed to page URLs. No trailing slash.
    pub site_url: String,
    pub author: String,
}

/// Serialize `pages` (already rendered) as an Atom document.
pub fn atom(info: &FeedInfo, pages: &[Page]) -> Result<String> {
    let mut entries = Vec::with_capacity(pages.len());
    for page in pages {
        entries.push(entry(info, page)?);
    }

    let updated = entries
        .iter()
        .map(|entry| *entry.updated())
        .max()
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.fixed_offset());

    let mut feed = Feed::default();
    feed.set_title(info.title.as_str());
    feed.set_id(info.feed_url.as_str());
    feed.set_updated(updated);
    if !info.subtitle.is_empty() {
        feed.set_subtitle(Text::plain(info.subtitle.as_str()));
    }
    feed.set_links(vec![
        link(&info.feed_url, "self", "application/atom+xml"),
        link(&info.site_url, "alternate", "text/html"),
    ]);
    feed.set_authors(vec![person(&info.author)]);
    feed.set_entries(entries);

    let buf = feed.write_to(Vec::new())?;
    Ok(String::from_utf8(buf)?)
}

fn entry(info: &FeedInfo, page: &Page) -> Result<Entry, FeedError> {
    let published = page_date(page)?;
    let url = format!("{}{}", info.site_url, page.url);

    let mut content = Content::default();
    content.set_content_type("html".to_owned());
    content.set_value(page.content.clone().or_else(|| page.rendered.clone()));

    let mut entry = Entry::default();
    entry.set_title(page.title.as_deref().unwrap_or(&page.filepath));
    entry.set_id(url.as_str());
    entry.set_links(vec![link(&url, "alternate", "text/html")]);
    entry.set_authors(vec![person(&info.author)]);
    entry.set_content(content);
    entry.set_published(published);
    entry.set_updated(published);
    Ok(entry)
}

fn page_date(page: &Page) -> Result<FixedDateTime, FeedError> {
    let value = page
        .date
        .as_deref()
        .ok_or_else(|| FeedError::MissingDate(page.filepath.clone()))?;
    date::parse(value).ok_or_else(|| FeedError::InvalidDate {
        filepath: page.filepath.clone(),
        date: value.to_owned(),
    })
}

fn link(href: &str, rel: &str, mime_type: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link.set_mime_type(mime_type.to_owned());
    link
}

fn person(name: &str) -> Person {
    let mut person = Person::default();
    person.set_name(name);
    person
}
