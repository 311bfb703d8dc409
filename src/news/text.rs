//! Plain-text snippets from feed HTML

use std::sync::OnceLock;

use regex::Regex;

/// Longest snippet kept, in characters
pub const SNIPPET_CHARS: usize = 200;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).unwrap())
}

/// Strip tags, decode entities and collapse whitespace
pub fn html_to_text(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let text = regex(&SCRIPT, r"(?is)<script[^>]*>.*?</script>").replace_all(html, " ");
    let text = regex(&STYLE, r"(?is)<style[^>]*>.*?</style>").replace_all(&text, " ");
    let text = regex(&COMMENT, r"(?s)<!--.*?-->").replace_all(&text, " ");
    let text = regex(&TAG, r"<[^>]+>").replace_all(&text, " ");
    let text = html_escape::decode_html_entities(&text);

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut text to [`SNIPPET_CHARS`] characters, marking the cut with "..."
pub fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}

/// Snippet for a feed entry, `None` when nothing readable is left
pub fn snippet(html: &str) -> Option<String> {
    let text = html_to_text(html);
    if text.is_empty() {
        None
    } else {
        Some(truncate_snippet(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let html = "<p>Rust&nbsp;1.80 is <b>out</b> &amp; stable</p>\n<script>track()</script><!-- x -->";
        assert_eq!(html_to_text(html), "Rust 1.80 is out & stable");
    }

    #[test]
    fn test_truncate_snippet() {
        let long = "a".repeat(250);
        let snippet = truncate_snippet(&long);
        assert_eq!(snippet.len(), 203);
        assert!(snippet.ends_with("..."));

        assert_eq!(truncate_snippet("short"), "short");
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "é".repeat(201);
        let snippet = truncate_snippet(&text);
        assert_eq!(snippet.chars().count(), 203);
    }

    #[test]
    fn test_empty_snippet() {
        assert_eq!(snippet("<img src=\"x.png\">"), None);
    }
}
