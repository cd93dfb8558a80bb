//! Persisted user settings (`config.json`) and the store that writes them back.

use crate::buffer::DEFAULT_MAX_COMPACT_LINES;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ACCENT_COLOR: &str = "#FF6F61";
/// Environment variable that overrides the stored key for the active provider.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_PROVIDER: &str = "openai";
const SETTINGS_DIR: &str = "asktty";
const SETTINGS_FILE: &str = "config.json";

/// Where the box is anchored inside the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Top,
    Bottom,
}

impl Position {
    /// Anything other than `top` falls back to the bottom anchor.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("top") {
            Position::Top
        } else {
            Position::Bottom
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Position::Top => "top",
            Position::Bottom => "bottom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    pub accent_color: String,
    pub border_style: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            border_style: "rounded".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    pub include_cwd: bool,
    pub include_shell_history: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            include_cwd: true,
            include_shell_history: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: String,
    pub api_keys: BTreeMap<String, String>,
    pub base_url: String,
    pub default_model: String,
    pub available_models: Vec<String>,
    pub theme: ThemeSettings,
    pub context: ContextSettings,
    pub clear_screen: bool,
    pub position: String,
    pub custom_instructions: String,
    pub max_response_lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let mut api_keys = BTreeMap::new();
        api_keys.insert(DEFAULT_PROVIDER.to_string(), String::new());
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_keys,
            base_url: String::new(),
            default_model: DEFAULT_MODEL.to_string(),
            available_models: vec![
                "gpt-4o-mini".to_string(),
                "gpt-4o".to_string(),
                "gpt-4-turbo".to_string(),
            ],
            theme: ThemeSettings::default(),
            context: ContextSettings::default(),
            clear_screen: false,
            position: Position::Bottom.as_str().to_string(),
            custom_instructions: String::new(),
            max_response_lines: DEFAULT_MAX_COMPACT_LINES,
        }
    }
}

impl Settings {
    /// Load settings from `path`, creating its directory. A missing file yields
    /// defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        }
        let mut settings = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<Settings>(&raw)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => Settings::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings file {}", path.display()))
            }
        };
        settings.apply_env_key(std::env::var(API_KEY_ENV).ok());
        Ok(settings)
    }

    /// Override the active provider's key when the environment supplies one.
    pub fn apply_env_key(&mut self, value: Option<String>) {
        if let Some(key) = value.map(|key| key.trim().to_string()) {
            if !key.is_empty() {
                self.set_api_key(&key);
            }
        }
    }

    pub fn api_key(&self) -> &str {
        self.api_keys
            .get(&self.provider)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key().trim().is_empty()
    }

    pub fn set_api_key(&mut self, key: &str) {
        self.api_keys.insert(self.provider.clone(), key.to_string());
    }

    pub fn position(&self) -> Position {
        Position::parse(&self.position)
    }

    /// Pager threshold; zero (unset) falls back to the default.
    pub fn max_compact_lines(&self) -> usize {
        if self.max_response_lines == 0 {
            DEFAULT_MAX_COMPACT_LINES
        } else {
            self.max_response_lines
        }
    }

    /// Human-readable summary with the credential redacted.
    pub fn describe(&self) -> Vec<String> {
        let base_url = if self.base_url.is_empty() {
            "(default)"
        } else {
            self.base_url.as_str()
        };
        vec![
            format!("provider: {}", self.provider),
            format!(
                "api key: {}",
                if self.has_api_key() { "set" } else { "not set" }
            ),
            format!("base url: {base_url}"),
            format!("model: {}", self.default_model),
            format!("max response lines: {}", self.max_compact_lines()),
            format!("clear screen: {}", self.clear_screen),
            format!("position: {}", self.position().as_str()),
            format!("accent color: {}", self.theme.accent_color),
            format!("directory context: {}", self.context.include_cwd),
        ]
    }
}

/// `~/.config/asktty/config.json`.
pub fn default_settings_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("unable to locate home directory"))?;
    Ok(home.join(".config").join(SETTINGS_DIR).join(SETTINGS_FILE))
}

/// Durable sink for settings saved from the settings form.
pub trait SettingsStore {
    fn save(&self, settings: &Settings) -> Result<()>;
}

pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SettingsStore for FileSettingsStore {
    fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config directory {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(settings).context("failed to encode settings")?;
        let mut options = fs::OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            // The file carries an API key.
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // `mode` above only applies to a newly created file.
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict {}", self.path.display()))?;
        }
        file.write_all(json.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    pub(crate) saved: std::sync::Arc<std::sync::Mutex<Vec<Settings>>>,
    pub(crate) fail: bool,
}

#[cfg(test)]
impl SettingsStore for MemoryStore {
    fn save(&self, settings: &Settings) -> Result<()> {
        if self.fail {
            return Err(anyhow!("disk full"));
        }
        self.saved.lock().unwrap().push(settings.clone());
        Ok(())
    }
}
