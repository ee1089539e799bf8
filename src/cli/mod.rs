//! CLI components.

pub mod commands;
pub mod prompt;
pub mod repl;
pub mod runner;

pub use commands::{Command, CommandError, COMMANDS};
pub use prompt::{create_reedline, DamayCompleter, DamayHighlighter, DamayPrompt};
pub use repl::Repl;
pub use runner::{load_settings, run_interactive, run_single_prompt, save_settings, Overrides};
