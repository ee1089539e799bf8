//! Configuration management.

mod settings;
mod xdg;

pub use settings::{ChatMode, ClientSettings, ConfigError, RenderMode, BASE_URL_ENV};
pub use xdg::XdgDirs;
