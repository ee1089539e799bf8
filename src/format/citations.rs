//! Citation extraction.
//!
//! Answers reference their sources with `[CITE: <url> | <title>]` tokens.
//! The tokens are a side channel: they are removed from the visible text and
//! returned as an ordered, de-duplicated list.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `[CITE: url | title]` on a single line, including the whitespace that
/// precedes it so the sentence does not end with a dangling space.
static CITE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\[CITE:[ \t]*([^|\]\n]+?)[ \t]*\|[ \t]*([^\]\n]+?)[ \t]*\]")
        .expect("Invalid citation regex")
});

/// A source referenced by an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
}

impl Citation {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Remove every citation token from `text`.
///
/// Returns the cleaned text and the citations in first-seen order. A URL is
/// listed once; the title of its first occurrence wins. A line that held
/// nothing but citations is removed along with its line break.
pub fn extract_citations(text: &str) -> (String, Vec<Citation>) {
    let mut citations: Vec<Citation> = Vec::new();

    for caps in CITE_REGEX.captures_iter(text) {
        let url = caps[1].trim();
        if citations.iter().any(|c| c.url == url) {
            continue;
        }
        citations.push(Citation::new(url, caps[2].trim()));
    }

    let cleaned = text
        .split('\n')
        .filter_map(|line| {
            if !CITE_REGEX.is_match(line) {
                return Some(line.to_string());
            }
            let stripped = CITE_REGEX.replace_all(line, "");
            (!stripped.trim().is_empty()).then(|| stripped.into_owned())
        })
        .collect::<Vec<_>>()
        .join("\n");
    (cleaned, citations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_keep_first_title_and_order() {
        let (text, citations) = extract_citations(
            "See [CITE: http://a|Doc A] and again [CITE: http://a|Doc A dup] and [CITE: http://b|Doc B]",
        );
        assert!(!text.contains("[CITE:"));
        assert_eq!(text, "See and again and");
        assert_eq!(
            citations,
            vec![Citation::new("http://a", "Doc A"), Citation::new("http://b", "Doc B")]
        );
    }

    #[test]
    fn test_whitespace_around_parts_is_trimmed() {
        let (text, citations) =
            extract_citations("Dibuka Mei [CITE:   https://smk.sch.id/daftar   |   Info PPDB  ].");
        assert_eq!(text, "Dibuka Mei.");
        assert_eq!(citations, vec![Citation::new("https://smk.sch.id/daftar", "Info PPDB")]);
    }

    #[test]
    fn test_malformed_tokens_stay_literal() {
        let input = "No title [CITE: http://a] and unclosed [CITE: http://b | B";
        let (text, citations) = extract_citations(input);
        assert_eq!(text, input);
        assert!(citations.is_empty());
    }

    #[test]
    fn test_citation_only_line_is_removed() {
        let (text, citations) = extract_citations("Hasil:\n[CITE: http://x|X]");
        assert_eq!(text, "Hasil:");
        assert_eq!(citations, vec![Citation::new("http://x", "X")]);

        let (text, _) = extract_citations("A\n  [CITE: u|t] [CITE: v|w]\nB\n\nC");
        assert_eq!(text, "A\nB\n\nC");
    }

    #[test]
    fn test_token_does_not_span_lines() {
        let input = "[CITE: http://a\n| A]";
        let (text, citations) = extract_citations(input);
        assert_eq!(text, input);
        assert!(citations.is_empty());
    }

    #[test]
    fn test_text_without_tokens_is_unchanged() {
        let (text, citations) = extract_citations("Plain answer.\nSecond line.");
        assert_eq!(text, "Plain answer.\nSecond line.");
        assert!(citations.is_empty());
    }
}
