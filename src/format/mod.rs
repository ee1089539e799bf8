//! Answer formatting.
//!
//! Turns the raw answer text into safe HTML and pulls out its citations. The
//! work is an ordered list of [`Stage`]s applied to one [`PipelineState`]:
//!
//! ```text
//!   Escape ─▶ ProtectCode ─▶ Inline ─▶ Images ─▶ Tables ─▶ Lists
//!          ─▶ Citations ─▶ RestoreCode ─▶ LineBreaks
//! ```
//!
//! The order is load-bearing. Escaping comes first so nothing in the answer
//! can inject markup. Code is protected before any structural stage so that
//! markdown and citation tokens inside a fence stay literal. Citations are
//! extracted after tables and lists, while code is still protected.
//!
//! Every stage is total: malformed tokens are left as literal text.

mod blocks;
mod citations;
mod code_blocks;
mod inline;

pub use citations::{extract_citations, Citation};
pub use code_blocks::CodeBlock;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// One step of the formatting pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Escape,
    ProtectCode,
    Inline,
    Images,
    Tables,
    Lists,
    Citations,
    RestoreCode,
    LineBreaks,
}

/// Stages for HTML output, in the order they run.
pub const STAGES: [Stage; 9] = [
    Stage::Escape,
    Stage::ProtectCode,
    Stage::Inline,
    Stage::Images,
    Stage::Tables,
    Stage::Lists,
    Stage::Citations,
    Stage::RestoreCode,
    Stage::LineBreaks,
];

/// Stages for markdown output: only citations are removed.
pub const PLAIN_STAGES: [Stage; 3] = [Stage::ProtectCode, Stage::Citations, Stage::RestoreCode];

/// What the pipeline produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Html,
    Markdown,
}

/// Per-call working state. Dropped when the call returns.
#[derive(Debug)]
pub struct PipelineState {
    pub output: Output,
    pub text: String,
    pub code_blocks: Vec<CodeBlock>,
    pub citations: Vec<Citation>,
}

impl PipelineState {
    pub fn new(text: &str, output: Output) -> Self {
        Self {
            output,
            text: text.to_string(),
            code_blocks: Vec::new(),
            citations: Vec::new(),
        }
    }
}

impl Stage {
    pub fn apply(self, state: &mut PipelineState) {
        state.text = match self {
            Self::Escape => escape_html(&state.text),
            Self::ProtectCode => code_blocks::protect(&state.text, &mut state.code_blocks),
            Self::Inline => inline::headings_and_emphasis(&state.text),
            Self::Images => inline::images(&state.text),
            Self::Tables => blocks::tables(&state.text),
            Self::Lists => blocks::lists(&state.text),
            Self::Citations => {
                let (text, found) = extract_citations(&state.text);
                // Citations are data, not markup.
                state.citations = match state.output {
                    Output::Html => found
                        .into_iter()
                        .map(|c| Citation::new(unescape_html(&c.url), unescape_html(&c.title)))
                        .collect(),
                    Output::Markdown => found,
                };
                text
            }
            Self::RestoreCode => match state.output {
                Output::Html => {
                    code_blocks::restore(&state.text, &state.code_blocks, code_blocks::render_html)
                }
                Output::Markdown => {
                    code_blocks::restore(&state.text, &state.code_blocks, code_blocks::render_raw)
                }
            },
            Self::LineBreaks => blocks::line_breaks(&state.text),
        };
        trace!(stage = ?self, len = state.text.len(), "Formatter stage applied");
    }
}

/// Run `stages` over `raw`.
pub fn run_pipeline(raw: &str, stages: &[Stage], output: Output) -> PipelineState {
    let mut state = PipelineState::new(raw, output);
    for stage in stages {
        stage.apply(&mut state);
    }
    state
}

/// A formatted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedAnswer {
    pub html: String,
    pub citations: Vec<Citation>,
}

/// Format a raw answer as HTML.
pub fn format_answer(raw: &str) -> FormattedAnswer {
    let state = run_pipeline(raw, &STAGES, Output::Html);
    FormattedAnswer {
        html: state.text.trim().to_string(),
        citations: state.citations,
    }
}

/// Remove citation tokens outside code blocks, keeping the markdown.
pub fn strip_citations(raw: &str) -> (String, Vec<Citation>) {
    let state = run_pipeline(raw, &PLAIN_STAGES, Output::Markdown);
    (state.text.trim().to_string(), state.citations)
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn unescape_html(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Ordering Tests
    // =========================================================================

    #[test]
    fn test_stage_order() {
        let position = |stage: Stage| STAGES.iter().position(|s| *s == stage).unwrap();
        assert_eq!(position(Stage::Escape), 0);
        assert_eq!(position(Stage::ProtectCode), 1);
        assert!(position(Stage::Inline) < position(Stage::Images));
        assert!(position(Stage::Tables) < position(Stage::Lists));
        assert!(position(Stage::Lists) < position(Stage::Citations));
        assert!(position(Stage::Citations) < position(Stage::RestoreCode));
        assert_eq!(position(Stage::LineBreaks), STAGES.len() - 1);
    }

    // =========================================================================
    // Behaviour Tests
    // =========================================================================

    #[test]
    fn test_final_answer_with_single_citation() {
        let answer = format_answer("Hasil: [CITE: http://x|Sumber X]");
        assert_eq!(answer.html, "Hasil:");
        assert_eq!(answer.citations, vec![Citation::new("http://x", "Sumber X")]);
    }

    #[test]
    fn test_citations_deduplicated_by_url() {
        let answer = format_answer(
            "See [CITE: http://a|Doc A] and again [CITE: http://a|Doc A dup] and [CITE: http://b|Doc B]",
        );
        assert!(!answer.html.contains("[CITE:"));
        assert_eq!(
            answer.citations,
            vec![Citation::new("http://a", "Doc A"), Citation::new("http://b", "Doc B")]
        );
    }

    #[test]
    fn test_code_block_content_is_literal() {
        let raw = "Contoh:\n```md\n**not bold**\n- item\n1. first\n| a | b |\n|---|---|\n[CITE: x|y]\n```\nSelesai.";
        let answer = format_answer(raw);

        assert!(answer.citations.is_empty());
        assert!(!answer.html.contains("<strong>"));
        assert!(!answer.html.contains("<ul>"));
        assert!(!answer.html.contains("<ol"));
        assert!(!answer.html.contains("<table>"));
        assert!(answer.html.contains(
            "<pre><code class=\"language-md\">**not bold**\n- item\n1. first\n| a | b |\n|---|---|\n[CITE: x|y]</code></pre>"
        ));
        assert!(answer.html.starts_with("Contoh:<div class=\"code-block\">"));
        assert!(answer.html.ends_with("</div>Selesai."));
    }

    #[test]
    fn test_odd_fence_info_string_keeps_code_protected() {
        let answer = format_answer("```c&\n**a**\n```\ntext\n```\n[CITE: http://z|Z]\n```");

        assert!(answer.citations.is_empty());
        assert!(!answer.html.contains("<strong>"));
        assert!(answer.html.contains("<code class=\"language-c&amp;\">**a**</code>"));
        assert!(answer.html.contains("</div>text<div class=\"code-block\">"));
        assert!(answer.html.contains("<pre><code>[CITE: http://z|Z]</code></pre>"));
    }

    #[test]
    fn test_crlf_answer_keeps_code_protected() {
        let answer = format_answer("Kode:\r\n```md\r\n**x** [CITE: http://c|C]\r\n```\r\nok");

        assert!(answer.citations.is_empty());
        assert_eq!(
            answer.html,
            "Kode:<div class=\"code-block\"><div class=\"code-lang\">md</div>\
             <pre><code class=\"language-md\">**x** [CITE: http://c|C]</code></pre></div>ok"
        );
    }

    #[test]
    fn test_bold_italic_is_well_nested() {
        assert_eq!(format_answer("***penting***").html, "<strong><em>penting</em></strong>");
    }

    #[test]
    fn test_citation_on_own_line_leaves_no_break() {
        let answer = format_answer("Hasil:\n[CITE: http://x|Sumber X]");
        assert_eq!(answer.html, "Hasil:");
        assert_eq!(answer.citations, vec![Citation::new("http://x", "Sumber X")]);

        let answer = format_answer("Baris satu\n[CITE: http://x|X]\nBaris dua");
        assert_eq!(answer.html, "Baris satu<br>Baris dua");
    }

    #[test]
    fn test_table_guard_without_separator() {
        let answer = format_answer("| a | b |\n| c | d |");
        assert!(!answer.html.contains("<table>"));
        assert_eq!(answer.html, "| a | b |<br>| c | d |");
    }

    #[test]
    fn test_table_cell_citation_is_extracted() {
        let answer =
            format_answer("| Biaya | Info |\n| --- | --- |\n| Gratis | Lihat [CITE: http://x | Biaya PPDB] |");
        assert!(answer.html.contains("<td>Lihat</td>"));
        assert_eq!(answer.citations, vec![Citation::new("http://x", "Biaya PPDB")]);
    }

    #[test]
    fn test_markup_in_answer_is_escaped() {
        let answer = format_answer("<script>alert('x')</script> & **ok**");
        assert_eq!(
            answer.html,
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; <strong>ok</strong>"
        );
    }

    #[test]
    fn test_escaped_citation_fields_are_restored() {
        let answer = format_answer("x [CITE: http://a?b=1&c=2 | Tom's \"Guide\"]");
        assert_eq!(answer.citations, vec![Citation::new("http://a?b=1&c=2", "Tom's \"Guide\"")]);
    }

    #[test]
    fn test_unclosed_fence_stays_literal() {
        let answer = format_answer("```python\nprint(1)\n**tebal**");
        assert!(answer.html.starts_with("```python<br>print(1)<br>"));
        assert!(answer.html.contains("<strong>tebal</strong>"));
        assert!(!answer.html.contains("code-block"));
    }

    #[test]
    fn test_full_answer_layout() {
        let raw = "## Pendaftaran\nSyarat:\n\n1. KK\n2. Akta\n\nDokumen:\n- Rapor\n[IMAGE: https://x/a.png]";
        let answer = format_answer(raw);
        assert_eq!(
            answer.html,
            "<h2>Pendaftaran</h2>Syarat:<ol><li>KK</li><li>Akta</li></ol>Dokumen:\
             <ul><li>Rapor</li></ul><a href=\"https://x/a.png\" target=\"_blank\" rel=\"noopener\">\
             <img src=\"https://x/a.png\" alt=\"Related image\" loading=\"lazy\"></a>"
        );
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let raw = "# T\n**b** *i*\n```rs\nlet x = 1;\n```\n| h |\n|---|\n| c |\n- a\n[CITE: u|t] [CITE: v|w]";
        let first = format_answer(raw);
        for _ in 0..5 {
            assert_eq!(format_answer(raw), first);
        }
    }

    // =========================================================================
    // Plain Variant Tests
    // =========================================================================

    #[test]
    fn test_strip_citations_keeps_markdown_and_code() {
        let raw = "**Jawaban** [CITE: http://a|A]\n```\n[CITE: keep|me]\n```";
        let (text, citations) = strip_citations(raw);
        assert_eq!(text, "**Jawaban**\n```\n[CITE: keep|me]\n```");
        assert_eq!(citations, vec![Citation::new("http://a", "A")]);
    }
}
