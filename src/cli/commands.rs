//! Slash command parsing.

use thiserror::Error;

use crate::client::{DataFilter, ProcessKind};

/// All slash commands with descriptions.
pub const COMMANDS: &[(&str, &str)] = &[
    ("/data", "List knowledge items [all|scraped|manual|memory]"),
    ("/exit", "Exit"),
    ("/h", "Show help"),
    ("/help", "Show help"),
    ("/log", "Show the last reasoning trace"),
    ("/new", "New conversation"),
    ("/q", "Exit"),
    ("/quit", "Exit"),
    ("/regen", "Regenerate the last answer"),
    ("/reindex", "Rebuild the search index"),
    ("/remember", "Save the last question and answer to memory"),
    ("/scrape", "Scrape the school website"),
];

/// Arguments accepted by `/data`.
pub const DATA_FILTERS: &[&str] = &["all", "scraped", "manual", "memory"];

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    New,
    Regenerate,
    Remember,
    Process(ProcessKind),
    /// `None` keeps the current filter.
    Data(Option<DataFilter>),
    Log,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("{0}")]
    BadArgument(String),
}

impl Command {
    /// Parse a line starting with `/`.
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let body = input.trim().trim_start_matches('/');
        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (body, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "help" | "h" | "?" => Self::Help,
            "new" => Self::New,
            "regen" | "regenerate" => Self::Regenerate,
            "remember" => Self::Remember,
            "scrape" => Self::Process(ProcessKind::Scrape),
            "reindex" => Self::Process(ProcessKind::Reindex),
            "data" if args.is_empty() => Self::Data(None),
            "data" => Self::Data(Some(args.parse().map_err(CommandError::BadArgument)?)),
            "log" => Self::Log,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    /// Commands that talk to admin-only endpoints.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Self::Remember | Self::Process(_) | Self::Data(_) | Self::Log
        )
    }
}

/// Help text, without colours.
pub fn help_text() -> String {
    let mut text = String::from("Commands:\n");
    for (cmd, desc) in COMMANDS {
        if matches!(*cmd, "/h" | "/q" | "/exit") {
            continue;
        }
        text.push_str(&format!("  {:<12} {}\n", cmd, desc));
    }
    text.push_str("\nAdmin mode (--admin): /remember /scrape /reindex /data /log\n");
    text.push_str("Anything else is sent as a question.\n");
    text
}

pub fn show_help() {
    println!("\n\x1b[1mdamay\x1b[0m\n");
    print!("{}", help_text());
    println!();
}
