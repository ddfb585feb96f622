//! Front matter parsing.
//!
//! A content file may start with a block of `key: value` (or `key = value`)
//! lines, separated from the body by a line containing [`DELIMITER`]:
//!
//! ```text
//! title: Chocolate cake
//! date: 2024-03-01
//! tags: baking family
//! ++++
//! Mix the flour...
//! ```
//!
//! The block is a flat table; only `tags` has structure (space separated).

use regex::Regex;
use std::{collections::BTreeMap, sync::LazyLock};
use thiserror::Error;

/// Separator between front matter and body
pub const DELIMITER: &str = "++++";

/// Metadata keys that must be present, warned about otherwise
pub const REQUIRED: &[&str] = &["date", "title"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("line {line}: expected `key: value` or `key = value`, found `{text}`")]
    Malformed { line: usize, text: String },
}

/// Parsed front matter table.
pub type Table = BTreeMap<String, String>;

/// Parse a front matter block into a flat table.
///
/// - blank lines and lines starting with `#` or `;` are skipped
/// - keys are trimmed and lowercased; the first `:` or `=` separates the value
/// - an indented line continues the previous value
/// - a repeated key keeps the last value
pub fn parse_table(text: &str) -> Result<Table, MetadataError> {
    static RE_ENTRY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?P<key>[^:=]*?)[ \t]*[:=][ \t]*(?P<value>.*)$").unwrap());

    let mut table = Table::new();
    let mut current: Option<String> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(['#', ';']) {
            continue;
        }

        if raw.starts_with([' ', '\t'])
            && let Some(value) = current.as_ref().and_then(|key| table.get_mut(key))
        {
            if !value.is_empty() {
                value.push('\n');
            }
            value.push_str(trimmed);
            continue;
        }

        let caps = RE_ENTRY
            .captures(trimmed)
            .filter(|caps| !caps["key"].trim().is_empty())
            .ok_or_else(|| MetadataError::Malformed {
                line: idx + 1,
                text: trimmed.to_owned(),
            })?;

        let key = caps["key"].trim().to_lowercase();
        table.insert(key.clone(), caps["value"].trim().to_owned());
        current = Some(key);
    }

    Ok(table)
}

/// Split a `tags` value on whitespace.
pub fn split_tags(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Structured view of the recognised metadata keys.
///
/// `None` means the key was absent; defaulting against the page's own
/// values happens in [`crate::page::Page::parse_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub tags: Vec<String>,
    pub date: Option<String>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub template: Option<String>,
}

impl Metadata {
    /// Pick the recognised keys out of a parsed table. Other keys are ignored.
    pub fn from_table(mut table: Table) -> Self {
        Self {
            tags: split_tags(table.get("tags").map(String::as_str)),
            date: table.remove("date"),
            title: table.remove("title"),
            slug: table.remove("slug"),
            template: table.remove("template"),
        }
    }

    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        parse_table(text).map(Self::from_table)
    }

    /// Required keys that are absent.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED
            .iter()
            .copied()
            .filter(|key| match *key {
                "date" => self.date.is_none(),
                "title" => self.title.is_none(),
                _ => false,
            })
            .collect()
    }
}
