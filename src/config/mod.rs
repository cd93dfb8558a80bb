//! Command-line parsing plus the persisted settings file.

mod settings;
#[cfg(test)]
mod tests;

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

pub use settings::{
    default_settings_path, ContextSettings, FileSettingsStore, Position, Settings, SettingsStore,
    ThemeSettings, API_KEY_ENV, DEFAULT_ACCENT_COLOR, DEFAULT_MODEL,
};
#[cfg(test)]
pub(crate) use settings::MemoryStore;

/// CLI options for asktty. Persistent preferences live in the settings file;
/// flags here only affect the current run.
#[derive(Debug, Parser, Clone)]
#[command(about = "asktty: ask a language model from your terminal", author, version)]
pub struct AppConfig {
    /// Settings file to load and save (defaults to ~/.config/asktty/config.json)
    #[arg(long = "config", env = "ASKTTY_CONFIG", value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    /// Model to use for this run (not saved)
    #[arg(long)]
    pub model: Option<String>,

    /// OpenAI-compatible base URL for this run (not saved)
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Print the resolved settings path and effective settings, then exit
    #[arg(long = "print-config", default_value_t = false)]
    pub print_config: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "ASKTTY_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "ASKTTY_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging prompt/answer snippets (debug log only)
    #[arg(long = "log-content", env = "ASKTTY_LOG_CONTENT", default_value_t = false)]
    pub log_content: bool,
}

impl AppConfig {
    /// Check CLI values and normalize overrides.
    pub fn validate(&mut self) -> Result<()> {
        if let Some(model) = self.model.as_mut() {
            let trimmed = model.trim();
            if trimmed.is_empty() {
                bail!("--model must not be empty");
            }
            *model = trimmed.to_string();
        }
        if let Some(url) = self.base_url.as_mut() {
            let trimmed = url.trim();
            if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                bail!("--base-url must start with http:// or https://, got {trimmed:?}");
            }
            *url = trimmed.trim_end_matches('/').to_string();
        }
        Ok(())
    }

    pub fn logging_enabled(&self) -> bool {
        self.logs && !self.no_logs
    }

    /// Settings file path after applying `--config`.
    pub fn settings_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => default_settings_path(),
        }
    }

    /// Apply one-run overrides on top of the loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.default_model = model.clone();
        }
        if let Some(url) = &self.base_url {
            settings.base_url = url.clone();
        }
    }
}
