//! Headings, emphasis and image tokens.
//!
//! These run on already escaped text, so captured content can be placed in
//! the output as is.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static HEADING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*$").expect("Invalid heading regex")
});

/// `***x***` is bold and italic at once; it must be taken before the bold
/// pass splits its stars.
static BOLD_ITALIC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*\*([^*\n]+?)\*\*\*").expect("Invalid bold italic regex")
});

static BOLD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("Invalid bold regex"));

/// Single-star emphasis. The content may not start with whitespace, which
/// keeps arithmetic like `2 * 3 * 4` literal.
static ITALIC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\s][^*\n]*?)\*").expect("Invalid italic regex"));

static IMAGE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[IMAGE:\s*([^\]]*?)\s*\]").expect("Invalid image regex"));

/// Headings first, then combined bold italic, then bold, then italic.
pub fn headings_and_emphasis(text: &str) -> String {
    let text = HEADING_REGEX.replace_all(text, |caps: &Captures<'_>| {
        let level = caps[1].len();
        format!("<h{level}>{}</h{level}>", &caps[2])
    });
    let text = BOLD_ITALIC_REGEX.replace_all(&text, "<strong><em>$1</em></strong>");
    let text = BOLD_REGEX.replace_all(&text, "<strong>$1</strong>");
    ITALIC_REGEX.replace_all(&text, "<em>$1</em>").into_owned()
}

/// Only web and site-relative URLs become images.
fn is_linkable(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/')
}

/// Turn each `[IMAGE: url]` into a clickable image.
pub fn images(text: &str) -> String {
    IMAGE_REGEX
        .replace_all(text, |caps: &Captures<'_>| {
            let url = &caps[1];
            if is_linkable(url) {
                format!(
                    "<a href=\"{url}\" target=\"_blank\" rel=\"noopener\"><img src=\"{url}\" alt=\"Related image\" loading=\"lazy\"></a>"
                )
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
