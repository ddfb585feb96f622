//! Page filtering for listings and feeds.
//!
//! A [`PageQuery`] applies up to four steps, always in this order:
//!
//! 1. `path`: keep pages whose `filepath` starts with the prefix
//! 2. `tag`: keep pages carrying the tag
//! 3. `order`: stable sort by an attribute, `-` prefix for descending
//! 4. `limit`: keep the first N (values below 1 keep everything)

use crate::page::Page;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("cannot order pages by unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("cannot order by `{attr}`: `{filepath}` has no value for it")]
    Unorderable { attr: String, filepath: String },
}

/// Filter, order and truncate a set of pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub path: Option<String>,
    pub tag: Option<String>,
    pub order: Option<String>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, prefix: impl Into<String>) -> Self {
        self.path = Some(prefix.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Select from `pages`, which is never reordered itself.
    pub fn apply<'a>(&self, pages: &'a [Page]) -> Result<Vec<&'a Page>, QueryError> {
        let mut selected: Vec<&Page> = pages
            .iter()
            .filter(|p| self.path.as_deref().is_none_or(|prefix| p.filepath.starts_with(prefix)))
            .filter(|p| self.tag.as_deref().is_none_or(|tag| p.tags.iter().any(|t| t == tag)))
            .collect();

        if let Some(order) = self.order.as_deref() {
            selected = sort_by_attribute(selected, order)?;
        }

        if let Some(limit) = self.limit
            && limit > 0
        {
            selected.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(selected)
    }
}

/// Value of an orderable attribute, `None` when unset.
///
/// `tags` is a list and cannot be ordered by.
pub fn attribute<'a>(page: &'a Page, name: &str) -> Result<Option<&'a str>, QueryError> {
    let value = match name {
        "filepath" => Some(page.filepath.as_str()),
        "folder" => Some(page.folder.as_str()),
        "slug" => Some(page.slug.as_str()),
        "ext" => Some(page.ext.as_str()),
        "url" => Some(page.url.as_str()),
        "body" => Some(page.body.as_str()),
        "date" => page.date.as_deref(),
        "title" => page.title.as_deref(),
        "template" => page.template.as_deref(),
        _ => return Err(QueryError::UnknownAttribute(name.to_owned())),
    };
    Ok(value)
}

fn sort_by_attribute<'a>(pages: Vec<&'a Page>, order: &str) -> Result<Vec<&'a Page>, QueryError> {
    let (attr, descending) = match order.strip_prefix('-') {
        Some(attr) => (attr, true),
        None => (order, false),
    };

    let mut keyed = Vec::with_capacity(pages.len());
    for page in pages {
        let key = attribute(page, attr)?.ok_or_else(|| QueryError::Unorderable {
            attr: attr.to_owned(),
            filepath: page.filepath.clone(),
        })?;
        keyed.push((key, page));
    }

    // Equal keys keep their relative order in both directions
    keyed.sort_by(|(a, _), (b, _)| {
        let ord = a.cmp(b);
        if descending { ord.reverse() } else { ord }
    });

    Ok(keyed.into_iter().map(|(_, page)| page).collect())
}
