//! Syntax highlighting for fenced code blocks.
//!
//! Runs as a pass over `pulldown-cmark` events: the text of every code block
//! is collected and replaced by one HTML event holding `syntect` output with
//! inline styles. Blocks whose language is unknown are highlighted as plain
//! text, so they still get the themed `<pre>` wrapper.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use std::sync::LazyLock;
use syntect::{
    highlighting::{Theme, ThemeSet},
    html::highlighted_html_for_string,
    parsing::SyntaxSet,
};

/// Theme used for every block
pub const THEME: &str = "InspiredGitHub";

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEMES: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Highlight `code` as `lang`, falling back to an escaped `<pre><code>`.
pub fn highlight(code: &str, lang: Option<&str>) -> String {
    let syntax = lang
        .and_then(|token| SYNTAXES.find_syntax_by_token(token))
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());

    match theme() {
        Some(theme) => highlighted_html_for_string(code, &SYNTAXES, syntax, theme)
            .unwrap_or_else(|_| plain(code, lang)),
        None => plain(code, lang),
    }
}

/// Replace code blocks in an event stream with highlighted HTML.
pub fn code_blocks<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    // (language, collected text) while inside a block
    let mut block: Option<(Option<String>, String)> = None;

    for event in events {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_owned),
                    CodeBlockKind::Indented => None,
                };
                block = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = block.take() {
                    out.push(Event::Html(CowStr::from(highlight(&code, lang.as_deref()))));
                }
            }
            Event::Text(text) if block.is_some() => {
                if let Some((_, code)) = block.as_mut() {
                    code.push_str(&text);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn theme() -> Option<&'static Theme> {
    THEMES
        .themes
        .get(THEME)
        .or_else(|| THEMES.themes.values().next())
}

fn plain(code: &str, lang: Option<&str>) -> String {
    let class = lang
        .map(|l| format!(" class=\"language-{}\"", escape(l)))
        .unwrap_or_default();
    format!("<pre><code{class}>{}</code></pre>\n", escape(code))
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
