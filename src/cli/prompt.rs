//! Reedline prompt, highlighter and completer.
//!
//! Type "/" then Tab to see commands. `/data ` then Tab lists the filters.

use std::borrow::Cow;
use std::path::PathBuf;

use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, Completer, Emacs, FileBackedHistory, Highlighter, KeyCode, KeyModifiers,
    MenuBuilder, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus, Reedline,
    ReedlineEvent, ReedlineMenu, Span, StyledText, Suggestion,
};
use tracing::warn;

use super::commands::{COMMANDS, DATA_FILTERS};
use crate::config::ChatMode;

/// Number of lines kept in the REPL history file.
const HISTORY_SIZE: usize = 500;

/// Completer for slash commands and their arguments.
#[derive(Clone, Default)]
pub struct DamayCompleter;

fn suggestion(value: &str, description: Option<&str>, span: Span, append_whitespace: bool) -> Suggestion {
    Suggestion {
        value: value.to_string(),
        description: description.map(str::to_string),
        extra: None,
        span,
        append_whitespace,
        style: None,
    }
}

impl Completer for DamayCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        if pos > line.len() {
            return Vec::new();
        }
        let input = &line[..pos];
        if !input.starts_with('/') {
            return Vec::new();
        }

        if !input.contains(' ') {
            let prefix = input.to_lowercase();
            return COMMANDS
                .iter()
                .filter(|(cmd, _)| cmd.starts_with(&prefix))
                .map(|(cmd, desc)| suggestion(cmd, Some(desc), Span::new(0, pos), true))
                .collect();
        }

        if let Some(arg) = input.strip_prefix("/data ") {
            let prefix = arg.trim_start().to_lowercase();
            let start = pos - arg.trim_start().len();
            return DATA_FILTERS
                .iter()
                .filter(|f| f.starts_with(&prefix))
                .map(|f| suggestion(f, None, Span::new(start, pos), false))
                .collect();
        }

        Vec::new()
    }
}

/// Prompt showing the chat mode and conversation length.
pub struct DamayPrompt {
    pub mode: ChatMode,
    pub turns: usize,
}

impl DamayPrompt {
    pub fn new(mode: ChatMode, turns: usize) -> Self {
        Self { mode, turns }
    }

    fn mode_label(&self) -> &'static str {
        match self.mode {
            ChatMode::Public => "public",
            ChatMode::Admin => "admin",
        }
    }
}

impl Prompt for DamayPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        let color = match self.mode {
            ChatMode::Public => "\x1b[2m",
            ChatMode::Admin => "\x1b[35m",
        };
        Cow::Owned(format!(
            "\x1b[1;33mdamay\x1b[0m {}[{} · {} turns]\x1b[0m",
            color,
            self.mode_label(),
            self.turns
        ))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed(" › ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("... ")
    }

    fn render_prompt_history_search_indicator(&self, hs: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match hs.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({}search: {}) ", prefix, hs.term))
    }
}

/// Highlights known slash commands.
#[derive(Clone)]
pub struct DamayHighlighter;

impl Highlighter for DamayHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();

        if line.starts_with('/') {
            let cmd_end = line.find(' ').unwrap_or(line.len());
            let cmd = &line[..cmd_end];
            let style = if COMMANDS.iter().any(|(c, _)| *c == cmd) {
                Style::new().fg(Color::Cyan).bold()
            } else {
                Style::new().fg(Color::Yellow)
            };
            styled.push((style, cmd.to_string()));
            if cmd_end < line.len() {
                styled.push((Style::default(), line[cmd_end..].to_string()));
            }
        } else {
            styled.push((Style::default(), line.to_string()));
        }

        styled
    }
}

/// Create the line editor with Tab completion and, when possible, a history
/// file.
pub fn create_reedline(history_path: Option<PathBuf>) -> Reedline {
    let completion_menu = Box::new(
        ColumnarMenu::default()
            .with_name("completion_menu")
            .with_columns(1)
            .with_column_padding(2)
            .with_text_style(Style::new().fg(Color::Default))
            .with_selected_text_style(Style::new().fg(Color::Black).on(Color::Cyan))
            .with_description_text_style(Style::new().fg(Color::DarkGray)),
    );

    let mut keybindings = reedline::default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".to_string()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(KeyModifiers::SHIFT, KeyCode::BackTab, ReedlineEvent::MenuPrevious);

    let mut editor = Reedline::create()
        .with_completer(Box::new(DamayCompleter))
        .with_menu(ReedlineMenu::EngineCompleter(completion_menu))
        .with_quick_completions(true)
        .with_partial_completions(true)
        .with_highlighter(Box::new(DamayHighlighter))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    if let Some(path) = history_path {
        match FileBackedHistory::with_file(HISTORY_SIZE, path.clone()) {
            Ok(history) => editor = editor.with_history(Box::new(history)),
            Err(e) => warn!(path = %path.display(), error = %e, "REPL history unavailable"),
        }
    }

    editor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(suggestions: Vec<Suggestion>) -> Vec<String> {
        suggestions.into_iter().map(|s| s.value).collect()
    }

    // =========================================================================
    // Completer Tests
    // =========================================================================

    #[test]
    fn test_complete_command_prefix() {
        let mut completer = DamayCompleter;
        let got = values(completer.complete("/re", 3));
        assert_eq!(got, vec!["/regen", "/reindex", "/remember"]);
    }

    #[test]
    fn test_complete_data_filter() {
        let mut completer = DamayCompleter;
        let got = completer.complete("/data m", 7);
        assert_eq!(values(got.clone()), vec!["manual", "memory"]);
        assert_eq!(got[0].span, Span::new(6, 7));
    }

    #[test]
    fn test_no_completion_for_questions() {
        let mut completer = DamayCompleter;
        assert!(completer.complete("kapan libur", 5).is_empty());
    }

    // =========================================================================
    // Prompt / Highlighter Tests
    // =========================================================================

    #[test]
    fn test_prompt_shows_mode_and_turns() {
        let prompt = DamayPrompt::new(ChatMode::Admin, 4);
        let left = prompt.render_prompt_left();
        assert!(left.contains("admin"));
        assert!(left.contains("4 turns"));
    }

    #[test]
    fn test_highlighter_splits_command_and_args() {
        let styled = DamayHighlighter.highlight("/data memory", 0);
        assert_eq!(styled.buffer.len(), 2);
        assert_eq!(styled.buffer[0].1, "/data");
        assert_eq!(styled.buffer[1].1, " memory");
    }
}
