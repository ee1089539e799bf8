//! CLI runner for interactive and single-prompt modes.

use anyhow::Context;
use tracing::{debug, info};

use crate::cli::repl::Repl;
use crate::config::{ChatMode, ClientSettings, RenderMode, XdgDirs};

/// Settings given on the command line. They win over the config file and
/// the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub admin: bool,
    pub html: bool,
}

impl Overrides {
    pub fn apply(&self, mut settings: ClientSettings) -> ClientSettings {
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
        if self.admin {
            settings.mode = ChatMode::Admin;
        }
        if self.html {
            settings.render = RenderMode::Html;
        }
        settings
    }
}

/// Resolve settings: config file, then environment, then flags.
pub fn load_settings(dirs: &XdgDirs, overrides: &Overrides) -> anyhow::Result<ClientSettings> {
    let path = dirs.config_file();
    let settings = ClientSettings::load(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .apply_env(|key| std::env::var(key).ok());
    let settings = overrides.apply(settings);
    settings.validate()?;
    debug!(base_url = %settings.base_url, mode = ?settings.mode, render = ?settings.render, "Settings resolved");
    Ok(settings)
}

/// Write the effective settings to the config file.
pub fn save_settings(dirs: &XdgDirs, settings: &ClientSettings) -> anyhow::Result<()> {
    let path = dirs.config_file();
    settings
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Saved settings");
    println!("Saved settings to {}", path.display());
    Ok(())
}

/// Ask one question and exit.
pub async fn run_single_prompt(settings: ClientSettings, prompt: &str) -> anyhow::Result<()> {
    let mut repl = Repl::new(settings)?;
    repl.ask(prompt).await
}

/// Run in interactive mode.
pub async fn run_interactive(settings: ClientSettings) -> anyhow::Result<()> {
    print_banner(&settings);
    let mut repl = Repl::new(settings)?;
    repl.run().await
}

/// Print the welcome banner.
pub fn print_banner(settings: &ClientSettings) {
    println!();
    for line in banner_text_lines(settings) {
        println!("  {}", line);
    }
    println!();
}

/// Banner lines without colours.
pub fn banner_text_lines(settings: &ClientSettings) -> Vec<String> {
    let mode = match settings.mode {
        ChatMode::Public => "public",
        ChatMode::Admin => "admin",
    };
    vec![
        format!("damay v{}", get_version()),
        format!("Connected to {} ({} mode)", settings.base_url, mode),
        "Type /help for commands, or ask a question.".to_string(),
    ]
}

pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
