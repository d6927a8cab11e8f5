//! Follow-up prompt directives embedded in assistant replies.
//!
//! The chat endpoint may end a reply with a segment such as
//!
//! ```text
//! <question-buttons>[What did you build?]|[Which stack?]</question-buttons>
//! ```
//!
//! The segment is never shown as text.  Its `|`-separated items become
//! prompts the visitor can pick to ask that question next.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// Opening tag of a follow-up directive.
pub const DIRECTIVE_OPEN: &str = "<question-buttons>";

/// Closing tag of a follow-up directive.
pub const DIRECTIVE_CLOSE: &str = "</question-buttons>";

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("{DIRECTIVE_OPEN}([^<]+){DIRECTIVE_CLOSE}"))
        .expect("directive pattern should compile")
});

/// Display form of one message: visible text plus its follow-up prompts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedMessage {
    /// Text with every directive removed.
    pub content: String,
    /// One group of prompts per directive, in order of appearance.
    pub groups: Vec<Vec<String>>,
}

/// Removes every complete directive from `text`.
pub fn strip(text: &str) -> Cow<'_, str> {
    DIRECTIVE.replace_all(text, "")
}

/// Returns true if `text` carries at least one complete directive.
pub fn has_directive(text: &str) -> bool {
    DIRECTIVE.is_match(text)
}

/// Extracts one group of follow-up prompts per directive in `text`.
///
/// Items are split on `|`, trimmed, and lose one leading `[` and one
/// trailing `]`; empty items are skipped, and a directive left with no
/// items yields no group.
pub fn prompt_groups(text: &str) -> Vec<Vec<String>> {
    DIRECTIVE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|payload| {
            payload
                .as_str()
                .split('|')
                .map(parse_item)
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|group| !group.is_empty())
        .collect()
}

/// Every follow-up prompt in `text`, groups concatenated in order.
///
/// This is the numbering a visitor picks from.
pub fn prompts(text: &str) -> Vec<String> {
    prompt_groups(text).into_iter().flatten().collect()
}

/// Splits `text` into its visible content and prompt groups.
pub fn render(text: &str) -> RenderedMessage {
    RenderedMessage {
        content: strip(text).into_owned(),
        groups: prompt_groups(text),
    }
}

fn parse_item(item: &str) -> String {
    let item = item.trim();
    let item = item.strip_prefix('[').unwrap_or(item);
    let item = item.strip_suffix(']').unwrap_or(item);
    item.trim().to_string()
}
