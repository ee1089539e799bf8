//! XDG Base Directory support.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "damay";

/// XDG directory paths for damay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XdgDirs {
    /// Config directory (~/.config/damay or XDG_CONFIG_HOME/damay)
    pub config: PathBuf,
    /// State directory (~/.local/state/damay or XDG_STATE_HOME/damay)
    pub state: PathBuf,
}

impl XdgDirs {
    /// Get XDG directories, respecting environment variables.
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::resolve(&home, |key| std::env::var(key).ok())
    }

    /// Resolve against `home` using `lookup` for the XDG variables.
    ///
    /// Empty values are ignored.
    pub fn resolve(home: &Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = |var: &str, fallback: &str| {
            lookup(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(fallback))
                .join(APP_DIR)
        };

        Self {
            config: base("XDG_CONFIG_HOME", ".config"),
            state: base("XDG_STATE_HOME", ".local/state"),
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.state] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Path of the settings file.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.json")
    }

    /// Path of the REPL line history.
    pub fn history_file(&self) -> PathBuf {
        self.state.join("history.txt")
    }
}

impl Default for XdgDirs {
    fn default() -> Self {
        Self::new()
    }
}
