//! Submission-shape detection.

use regex::Regex;
use std::sync::LazyLock;

// Letters and digits plus the separators common in technical terms.
static TOPIC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{N}\-\./\+#\s]+$").unwrap());

/// True for `http://` / `https://` strings.
pub fn is_url(s: &str) -> bool {
    let s = s.trim();
    s.starts_with("http://") || s.starts_with("https://")
}

/// Detects whether a message is a short topic suited to a web lookup.
///
/// Accepts strings like "kubernetes", "react hooks", "go 1.25". Rejects
/// questions, long sentences, and URLs.
pub fn is_short_topic(text: &str) -> bool {
    let text = text.trim();

    if text.len() < 2 || text.len() > 50 {
        return false;
    }

    if is_url(text) {
        return false;
    }

    // A question mark means a question, which should be a note.
    if text.contains('?') {
        return false;
    }

    let words = text.split_whitespace().count();
    if !(1..=3).contains(&words) {
        return false;
    }

    if !TOPIC_PATTERN.is_match(text) {
        return false;
    }

    text.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_word_topics() {
        assert!(is_short_topic("kubernetes"));
        assert!(is_short_topic("react hooks"));
        assert!(is_short_topic("go 1.25"));
        assert!(is_short_topic("c++"));
    }

    #[test]
    fn rejects_questions_urls_and_sentences() {
        assert!(!is_short_topic("how do I use kubernetes?"));
        assert!(!is_short_topic("https://x.y"));
        assert!(!is_short_topic("this is a much longer sentence about things"));
        assert!(!is_short_topic("a"));
        assert!(!is_short_topic("1.25"));
        assert!(!is_short_topic(""));
    }

    #[test]
    fn url_detection() {
        assert!(is_url("  https://example.com/post "));
        assert!(is_url("http://example.com"));
        assert!(!is_url("example.com"));
        assert!(!is_url("ftp://example.com"));
    }
}
