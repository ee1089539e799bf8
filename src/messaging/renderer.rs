//! Terminal renderer for bus messages.
//!
//! Reasoning log entries are styled per [`LineStyle`]; answers are printed
//! as lightweight markdown with syntax-highlighted code blocks, followed by
//! their sources.

use std::io::{stdout, Write};

use crossterm::{
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    ExecutableCommand,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{as_24_bit_terminal_escaped, LinesWithEndings};
use tracing::warn;

use super::{
    AnswerMessage, BusError, Message, MessageLevel, MessageReceiver, ProcessMessage,
};
use crate::format::Citation;
use crate::session::SessionId;
use crate::stream::{LineStyle, RenderedThought};

/// Render style configuration.
#[derive(Debug, Clone)]
pub struct RenderStyle {
    pub info_color: Color,
    pub success_color: Color,
    pub warning_color: Color,
    pub error_color: Color,
    pub stage_color: Color,
    pub detail_color: Color,
    pub source_color: Color,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            info_color: Color::White,
            success_color: Color::Green,
            warning_color: Color::Yellow,
            error_color: Color::Red,
            stage_color: Color::Cyan,
            detail_color: Color::DarkGrey,
            source_color: Color::Blue,
        }
    }
}

/// Terminal renderer for messages.
pub struct TerminalRenderer {
    style: RenderStyle,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::with_style(RenderStyle::default())
    }

    pub fn with_style(style: RenderStyle) -> Self {
        Self {
            style,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        }
    }

    /// Render a message to stdout.
    pub fn render(&self, message: &Message) -> std::io::Result<()> {
        let mut out = stdout();
        self.render_to(&mut out, message)?;
        out.flush()
    }

    /// Render a message to `out`.
    pub fn render_to<W: Write>(&self, out: &mut W, message: &Message) -> std::io::Result<()> {
        match message {
            Message::Text(text) => self.render_text(out, text.level, &text.text),
            Message::Thought(thought) => self.render_thought(out, &thought.entry),
            Message::Answer(answer) => self.render_answer(out, answer),
            Message::Process(process) => self.render_process(out, process),
            Message::Divider => self.render_divider(out),
        }
    }

    /// Render everything currently queued on `receiver`.
    ///
    /// Session-scoped messages from any session other than `active` are
    /// dropped. Returns how many messages were rendered.
    pub fn drain(&self, receiver: &mut MessageReceiver, active: SessionId) -> std::io::Result<usize> {
        let mut out = stdout();
        let rendered = self.drain_to(&mut out, receiver, active)?;
        out.flush()?;
        Ok(rendered)
    }

    pub fn drain_to<W: Write>(
        &self,
        out: &mut W,
        receiver: &mut MessageReceiver,
        active: SessionId,
    ) -> std::io::Result<usize> {
        let mut rendered = 0;
        loop {
            match receiver.try_recv() {
                Ok(Some(message)) if message.is_current(active) => {
                    self.render_to(out, &message)?;
                    rendered += 1;
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(BusError::Closed) => break,
                Err(BusError::Lagged(n)) => warn!(skipped = n, "Renderer fell behind"),
            }
        }
        Ok(rendered)
    }

    fn level_color(&self, level: MessageLevel) -> Color {
        match level {
            MessageLevel::Info => self.style.info_color,
            MessageLevel::Success => self.style.success_color,
            MessageLevel::Warning => self.style.warning_color,
            MessageLevel::Error => self.style.error_color,
            MessageLevel::Debug => self.style.detail_color,
        }
    }

    fn render_text<W: Write>(&self, out: &mut W, level: MessageLevel, text: &str) -> std::io::Result<()> {
        let prefix = match level {
            MessageLevel::Success => "✓ ",
            MessageLevel::Warning => "⚠ ",
            MessageLevel::Error => "✗ ",
            _ => "",
        };

        out.execute(SetForegroundColor(self.level_color(level)))?
            .execute(Print(prefix))?
            .execute(Print(text))?
            .execute(Print("\n"))?
            .execute(ResetColor)?;
        Ok(())
    }

    /// Render one reasoning log entry.
    pub fn render_thought<W: Write>(&self, out: &mut W, entry: &RenderedThought) -> std::io::Result<()> {
        for line in &entry.lines {
            let (color, attribute, indent) = match line.style {
                LineStyle::Plain => (self.style.info_color, None, ""),
                LineStyle::Stage => (self.style.stage_color, Some(Attribute::Bold), ""),
                LineStyle::Detail => (self.style.detail_color, None, "  "),
                LineStyle::Found => (self.style.success_color, None, "  "),
                LineStyle::Quote => (self.style.detail_color, Some(Attribute::Italic), "    "),
                LineStyle::Document => (self.style.source_color, None, "  "),
                LineStyle::Context => (self.style.detail_color, None, "  │ "),
                LineStyle::Alert => (self.style.error_color, Some(Attribute::Bold), ""),
                LineStyle::Answer => (self.style.info_color, None, "  "),
            };

            out.execute(SetForegroundColor(color))?;
            if let Some(attribute) = attribute {
                out.execute(SetAttribute(attribute))?;
            }
            for (i, text) in line.text.lines().enumerate() {
                if i > 0 {
                    out.execute(Print("\n"))?;
                }
                out.execute(Print(indent))?.execute(Print(text))?;
            }
            out.execute(SetAttribute(Attribute::Reset))?
                .execute(ResetColor)?
                .execute(Print("\n"))?;
        }
        Ok(())
    }

    fn render_answer<W: Write>(&self, out: &mut W, answer: &AnswerMessage) -> std::io::Result<()> {
        out.execute(Print("\n"))?;
        match &answer.html {
            Some(html) => {
                out.execute(Print(html))?.execute(Print("\n"))?;
            }
            None => self.render_markdown(out, &answer.content)?,
        }
        self.render_citations(out, &answer.citations)
    }

    fn render_citations<W: Write>(&self, out: &mut W, citations: &[Citation]) -> std::io::Result<()> {
        if citations.is_empty() {
            return Ok(());
        }
        out.execute(SetForegroundColor(self.style.detail_color))?
            .execute(Print("\nSources:\n"))?
            .execute(ResetColor)?;
        for (i, citation) in citations.iter().enumerate() {
            out.execute(Print(format!("  [{}] ", i + 1)))?
                .execute(SetForegroundColor(self.style.source_color))?
                .execute(Print(&citation.title))?
                .execute(ResetColor)?
                .execute(SetForegroundColor(self.style.detail_color))?
                .execute(Print(format!(" {}\n", citation.url)))?
                .execute(ResetColor)?;
        }
        Ok(())
    }

    fn render_process<W: Write>(&self, out: &mut W, process: &ProcessMessage) -> std::io::Result<()> {
        out.execute(SetForegroundColor(self.style.detail_color))?
            .execute(Print(format!("[{}] ", process.process)))?
            .execute(SetForegroundColor(self.level_color(process.level)))?
            .execute(Print(&process.text))?
            .execute(ResetColor)?
            .execute(Print("\n"))?;
        Ok(())
    }

    fn render_divider<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.execute(SetForegroundColor(self.style.detail_color))?
            .execute(Print("─".repeat(60)))?
            .execute(ResetColor)?
            .execute(Print("\n"))?;
        Ok(())
    }

    /// Render markdown content with proper formatting.
    pub fn render_markdown<W: Write>(&self, out: &mut W, content: &str) -> std::io::Result<()> {
        let mut in_code_block = false;
        let mut code_lang = String::new();
        let mut code_buffer = String::new();

        for line in content.lines() {
            if let Some(rest) = line.trim_start().strip_prefix("```") {
                if in_code_block {
                    self.render_code_block(out, &code_lang, &code_buffer)?;
                    code_buffer.clear();
                    code_lang.clear();
                    in_code_block = false;
                } else {
                    in_code_block = true;
                    code_lang = rest.trim().to_string();
                }
            } else if in_code_block {
                code_buffer.push_str(line);
                code_buffer.push('\n');
            } else {
                self.render_markdown_line(out, line)?;
            }
        }

        // Unclosed fence: show what arrived.
        if in_code_block && !code_buffer.is_empty() {
            self.render_code_block(out, &code_lang, &code_buffer)?;
        }

        Ok(())
    }

    fn render_markdown_line<W: Write>(&self, out: &mut W, line: &str) -> std::io::Result<()> {
        let heading = line.trim_start_matches('#');
        if heading.len() < line.len() && line.len() - heading.len() <= 6 && heading.starts_with(' ') {
            out.execute(SetForegroundColor(self.style.stage_color))?
                .execute(SetAttribute(Attribute::Bold))?
                .execute(Print(heading.trim()))?
                .execute(SetAttribute(Attribute::Reset))?
                .execute(ResetColor)?
                .execute(Print("\n"))?;
            return Ok(());
        }

        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("- ") {
            out.execute(SetForegroundColor(Color::Yellow))?
                .execute(Print("  • "))?
                .execute(ResetColor)?;
            self.render_inline(out, rest)?;
            out.execute(Print("\n"))?;
            return Ok(());
        }

        let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            if let Some(rest) = trimmed[digits.len()..].strip_prefix(". ") {
                out.execute(SetForegroundColor(Color::Yellow))?
                    .execute(Print(format!("  {}. ", digits)))?
                    .execute(ResetColor)?;
                self.render_inline(out, rest)?;
                out.execute(Print("\n"))?;
                return Ok(());
            }
        }

        if trimmed.starts_with('|') && trimmed.contains("---") && !trimmed.contains(char::is_alphanumeric) {
            out.execute(SetForegroundColor(self.style.detail_color))?
                .execute(Print("─".repeat(40)))?
                .execute(ResetColor)?
                .execute(Print("\n"))?;
            return Ok(());
        }

        self.render_inline(out, line)?;
        out.execute(Print("\n"))?;
        Ok(())
    }

    /// Bold and italic spans; everything else is printed as is.
    fn render_inline<W: Write>(&self, out: &mut W, text: &str) -> std::io::Result<()> {
        let mut rest = text;
        while let Some(start) = rest.find('*') {
            out.execute(Print(&rest[..start]))?;
            let after = &rest[start..];
            let (marker, attribute) = if after.starts_with("**") {
                ("**", Attribute::Bold)
            } else {
                ("*", Attribute::Italic)
            };
            let inner = &after[marker.len()..];
            match inner.find(marker) {
                Some(end) if end > 0 => {
                    out.execute(SetAttribute(attribute))?
                        .execute(Print(&inner[..end]))?
                        .execute(SetAttribute(Attribute::Reset))?;
                    rest = &inner[end + marker.len()..];
                }
                _ => {
                    out.execute(Print(marker))?;
                    rest = inner;
                }
            }
        }
        out.execute(Print(rest))?;
        Ok(())
    }

    /// Render a code block with syntax highlighting.
    fn render_code_block<W: Write>(&self, out: &mut W, lang: &str, code: &str) -> std::io::Result<()> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get("base16-ocean.dark")
            .or_else(|| self.theme_set.themes.values().next());

        out.execute(SetForegroundColor(self.style.detail_color))?
            .execute(Print(format!(
                "┌── {}\n",
                if lang.is_empty() { "code" } else { lang }
            )))?
            .execute(ResetColor)?;

        let mut highlighter = theme.map(|theme| HighlightLines::new(syntax, theme));
        for line in LinesWithEndings::from(code) {
            out.execute(SetForegroundColor(self.style.detail_color))?
                .execute(Print("│ "))?
                .execute(ResetColor)?;

            let highlighted = highlighter
                .as_mut()
                .and_then(|h| h.highlight_line(line, &self.syntax_set).ok())
                .map(|ranges| as_24_bit_terminal_escaped(&ranges[..], false));
            match highlighted {
                Some(escaped) => write!(out, "{}", escaped)?,
                None => write!(out, "{}", line)?,
            }
        }

        out.execute(SetAttribute(Attribute::Reset))?
            .execute(ResetColor)?
            .execute(SetForegroundColor(self.style.detail_color))?
            .execute(Print("└──\n"))?
            .execute(ResetColor)?;
        Ok(())
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new()
    }
}
