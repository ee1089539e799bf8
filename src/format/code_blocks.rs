//! Fenced code block protection.
//!
//! Code blocks are cut out of the text before any structural stage runs and
//! replaced with placeholder tokens built from private-use characters. Later
//! stages cannot match inside a placeholder, so code is restored exactly as
//! it was protected.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Opening fence with any info string, body, closing fence.
static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([^\n]*?)[ \t]*\n(.*?)```").expect("Invalid fence regex")
});

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("\u{E000}CODE(\\d+)\u{E001}").expect("Invalid placeholder regex")
});

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

/// A protected code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language tag, empty when the fence had none.
    pub language: String,
    /// Body without the trailing newline before the closing fence.
    pub code: String,
    /// The complete fenced source.
    pub raw: String,
}

fn placeholder(index: usize) -> String {
    format!("{OPEN}CODE{index}{CLOSE}")
}

/// Replace every complete fenced block with a placeholder.
///
/// Line endings are normalised to `\n` and sentinel characters already
/// present in the input are removed, so a forged placeholder can never be
/// restored. The language is the first word of the info string. An unclosed
/// fence does not match and stays in the text as literal characters.
pub fn protect(text: &str, blocks: &mut Vec<CodeBlock>) -> String {
    let text: String = text
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c != OPEN && *c != CLOSE)
        .collect();

    FENCE_REGEX
        .replace_all(&text, |caps: &Captures<'_>| {
            let index = blocks.len();
            blocks.push(CodeBlock {
                language: caps[1]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                code: caps[2].trim_end_matches('\n').to_string(),
                raw: caps[0].to_string(),
            });
            placeholder(index)
        })
        .into_owned()
}

/// Substitute each placeholder with `render(block)`.
pub fn restore(text: &str, blocks: &[CodeBlock], render: impl Fn(&CodeBlock) -> String) -> String {
    PLACEHOLDER_REGEX
        .replace_all(text, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| blocks.get(i))
                .map(&render)
                .unwrap_or_default()
        })
        .into_owned()
}

/// HTML for a block whose code is already escaped.
pub fn render_html(block: &CodeBlock) -> String {
    if block.language.is_empty() {
        format!(
            "<div class=\"code-block\"><pre><code>{}</code></pre></div>",
            block.code
        )
    } else {
        format!(
            "<div class=\"code-block\"><div class=\"code-lang\">{lang}</div><pre><code class=\"language-{lang}\">{code}</code></pre></div>",
            lang = block.language,
            code = block.code
        )
    }
}

/// The original fenced source.
pub fn render_raw(block: &CodeBlock) -> String {
    block.raw.clone()
}
