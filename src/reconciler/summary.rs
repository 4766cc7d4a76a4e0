use std::sync::LazyLock;

use html_escape::decode_html_entities;
use regex::Regex;

pub const DEFAULT_SUMMARY_CHARS: usize = 150;

const ELLIPSIS: &str = "...";

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Plain-text summary of an HTML fragment: tags stripped, entities decoded,
/// whitespace collapsed, cut to `max_chars` characters plus an ellipsis.
pub fn summarize(content: &str, max_chars: usize) -> String {
    let stripped = TAG.replace_all(content, " ");
    let decoded = decode_html_entities(&stripped);
    let plain = decoded.split_whitespace().collect::<Vec<_>>().join(" ");

    match plain.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &plain[..cut], ELLIPSIS),
        None => plain,
    }
}
