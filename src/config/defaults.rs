//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub mod markdown {
    use crate::config::MarkdownExtension;

    pub fn extensions() -> Vec<MarkdownExtension> {
        vec![
            MarkdownExtension::Tables,
            MarkdownExtension::Footnotes,
            MarkdownExtension::Strikethrough,
            MarkdownExtension::Tasklists,
            MarkdownExtension::Highlight,
        ]
    }
}

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8000
    }
}
