//! Settings form: three collapsible groups of text fields and a save row.

use super::input::ComposeInput;
use super::text::ellipsize;
use crate::buffer::DEFAULT_MAX_COMPACT_LINES;
use crate::config::{Position, Settings, DEFAULT_ACCENT_COLOR};
use crossterm::event::{KeyCode, KeyEvent};

/// Smallest accepted pager threshold; anything lower falls back to the default.
pub const MIN_RESPONSE_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsGroup {
    Api,
    Prompt,
    Display,
}

impl SettingsGroup {
    pub fn label(self) -> &'static str {
        match self {
            SettingsGroup::Api => "API Configuration",
            SettingsGroup::Prompt => "Prompt & Context",
            SettingsGroup::Display => "Display",
        }
    }

    fn index(self) -> usize {
        match self {
            SettingsGroup::Api => 0,
            SettingsGroup::Prompt => 1,
            SettingsGroup::Display => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ApiKey,
    BaseUrl,
    Model,
    CustomInstructions,
    IncludeCwd,
    MaxResponseLines,
    ClearScreen,
    Position,
    AccentColor,
}

impl SettingsField {
    const COUNT: usize = 9;

    pub fn label(self) -> &'static str {
        match self {
            SettingsField::ApiKey => "API Key",
            SettingsField::BaseUrl => "Base URL (Groq, OpenRouter, Ollama...)",
            SettingsField::Model => "Default Model",
            SettingsField::CustomInstructions => "Custom Instructions",
            SettingsField::IncludeCwd => "Send Directory Context (yes/no)",
            SettingsField::MaxResponseLines => "Max Response Lines",
            SettingsField::ClearScreen => "Clear Screen (yes/no)",
            SettingsField::Position => "Position (top/bottom)",
            SettingsField::AccentColor => "Accent Color (hex)",
        }
    }

    pub fn hint(self) -> Option<&'static str> {
        match self {
            SettingsField::IncludeCwd => {
                Some("Sends your current working directory to the model for relevant answers")
            }
            SettingsField::MaxResponseLines => {
                Some("Lines shown before pager activates (default: 8)")
            }
            _ => None,
        }
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            SettingsField::ApiKey => "sk-...",
            SettingsField::BaseUrl => "leave empty for default OpenAI",
            SettingsField::Model => "gpt-4o-mini",
            SettingsField::CustomInstructions => "e.g. Always respond in Python, be extra brief...",
            SettingsField::IncludeCwd | SettingsField::ClearScreen => "yes/no",
            SettingsField::MaxResponseLines => "8",
            SettingsField::Position => "top/bottom",
            SettingsField::AccentColor => DEFAULT_ACCENT_COLOR,
        }
    }

    pub fn is_secret(self) -> bool {
        self == SettingsField::ApiKey
    }

    pub fn group(self) -> SettingsGroup {
        match self {
            SettingsField::ApiKey | SettingsField::BaseUrl | SettingsField::Model => {
                SettingsGroup::Api
            }
            SettingsField::CustomInstructions | SettingsField::IncludeCwd => SettingsGroup::Prompt,
            SettingsField::MaxResponseLines
            | SettingsField::ClearScreen
            | SettingsField::Position
            | SettingsField::AccentColor => SettingsGroup::Display,
        }
    }

    fn limit(self) -> usize {
        match self {
            SettingsField::ApiKey | SettingsField::BaseUrl => 256,
            SettingsField::Model => 100,
            SettingsField::CustomInstructions => 500,
            SettingsField::IncludeCwd | SettingsField::ClearScreen => 3,
            SettingsField::MaxResponseLines => 3,
            SettingsField::Position => 6,
            SettingsField::AccentColor => 7,
        }
    }

    fn index(self) -> usize {
        match self {
            SettingsField::ApiKey => 0,
            SettingsField::BaseUrl => 1,
            SettingsField::Model => 2,
            SettingsField::CustomInstructions => 3,
            SettingsField::IncludeCwd => 4,
            SettingsField::MaxResponseLines => 5,
            SettingsField::ClearScreen => 6,
            SettingsField::Position => 7,
            SettingsField::AccentColor => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsItem {
    Group(SettingsGroup),
    Field(SettingsField),
    Save,
}

pub const SETTINGS_ITEMS: &[SettingsItem] = &[
    SettingsItem::Group(SettingsGroup::Api),
    SettingsItem::Field(SettingsField::ApiKey),
    SettingsItem::Field(SettingsField::BaseUrl),
    SettingsItem::Field(SettingsField::Model),
    SettingsItem::Group(SettingsGroup::Prompt),
    SettingsItem::Field(SettingsField::CustomInstructions),
    SettingsItem::Field(SettingsField::IncludeCwd),
    SettingsItem::Group(SettingsGroup::Display),
    SettingsItem::Field(SettingsField::MaxResponseLines),
    SettingsItem::Field(SettingsField::ClearScreen),
    SettingsItem::Field(SettingsField::Position),
    SettingsItem::Field(SettingsField::AccentColor),
    SettingsItem::Save,
];

/// Normalized values produced by the save row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSubmission {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    pub custom_instructions: String,
    pub include_cwd: bool,
    pub max_response_lines: usize,
    pub clear_screen: bool,
    pub position: Position,
    pub accent_color: String,
}

impl SettingsSubmission {
    /// Copy the submitted values onto `settings`. An empty model or accent keeps
    /// the current value.
    pub fn apply_to(&self, settings: &mut Settings) {
        settings.set_api_key(&self.api_key);
        settings.base_url = self.base_url.clone();
        if !self.default_model.is_empty() {
            settings.default_model = self.default_model.clone();
        }
        settings.custom_instructions = self.custom_instructions.clone();
        settings.context.include_cwd = self.include_cwd;
        settings.max_response_lines = self.max_response_lines;
        settings.clear_screen = self.clear_screen;
        settings.position = self.position.as_str().to_string();
        if !self.accent_color.is_empty() {
            settings.theme.accent_color = self.accent_color.clone();
        }
    }
}

/// What the session should do after a key reached the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    None,
    Save(SettingsSubmission),
}

#[derive(Debug, Clone)]
pub struct SettingsForm {
    fields: Vec<ComposeInput>,
    expanded: [bool; 3],
    cursor: usize,
}

impl SettingsForm {
    /// Prefill every field from the current settings. Groups start collapsed.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut fields: Vec<ComposeInput> = (0..SettingsField::COUNT)
            .map(|_| ComposeInput::new())
            .collect();
        let mut fill = |field: SettingsField, value: &str| {
            let mut input = ComposeInput::with_limit(field.limit());
            input.set_text(value);
            fields[field.index()] = input;
        };
        fill(SettingsField::ApiKey, settings.api_key());
        fill(SettingsField::BaseUrl, &settings.base_url);
        fill(SettingsField::Model, &settings.default_model);
        fill(SettingsField::CustomInstructions, &settings.custom_instructions);
        fill(SettingsField::IncludeCwd, yes_no(settings.context.include_cwd));
        fill(
            SettingsField::MaxResponseLines,
            &settings.max_compact_lines().to_string(),
        );
        fill(SettingsField::ClearScreen, yes_no(settings.clear_screen));
        fill(SettingsField::Position, settings.position().as_str());
        let accent = if settings.theme.accent_color.trim().is_empty() {
            DEFAULT_ACCENT_COLOR
        } else {
            settings.theme.accent_color.as_str()
        };
        fill(SettingsField::AccentColor, accent);
        Self {
            fields,
            expanded: [false; 3],
            cursor: 0,
        }
    }

    /// Items currently on screen: group headers, fields of expanded groups, and
    /// the save row.
    pub fn visible_items(&self) -> Vec<SettingsItem> {
        SETTINGS_ITEMS
            .iter()
            .copied()
            .filter(|item| match item {
                SettingsItem::Field(field) => self.is_expanded(field.group()),
                _ => true,
            })
            .collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selected_item(&self) -> SettingsItem {
        self.visible_items()
            .get(self.cursor)
            .copied()
            .unwrap_or(SettingsItem::Save)
    }

    pub fn is_expanded(&self, group: SettingsGroup) -> bool {
        self.expanded[group.index()]
    }

    pub fn field(&self, field: SettingsField) -> &ComposeInput {
        &self.fields[field.index()]
    }

    fn field_mut(&mut self, field: SettingsField) -> &mut ComposeInput {
        &mut self.fields[field.index()]
    }

    pub fn move_down(&mut self) {
        let len = self.visible_items().len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor + 1) % len;
    }

    pub fn move_up(&mut self) {
        let len = self.visible_items().len();
        if len == 0 {
            return;
        }
        if self.cursor == 0 {
            self.cursor = len - 1;
        } else {
            self.cursor -= 1;
        }
    }

    pub fn toggle_group(&mut self, group: SettingsGroup) {
        let slot = &mut self.expanded[group.index()];
        *slot = !*slot;
        let len = self.visible_items().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> FormAction {
        match key.code {
            KeyCode::Tab | KeyCode::Down => self.move_down(),
            KeyCode::BackTab | KeyCode::Up => self.move_up(),
            KeyCode::Enter => match self.selected_item() {
                SettingsItem::Group(group) => self.toggle_group(group),
                SettingsItem::Save => return FormAction::Save(self.submission()),
                SettingsItem::Field(_) => self.move_down(),
            },
            _ => {
                if let SettingsItem::Field(field) = self.selected_item() {
                    self.field_mut(field).handle_key(key);
                }
            }
        }
        FormAction::None
    }

    /// One-line summary shown under a collapsed group header.
    pub fn group_summary(&self, group: SettingsGroup) -> String {
        match group {
            SettingsGroup::Api => {
                let url = self.value(SettingsField::BaseUrl);
                let url = if url.is_empty() { "openai" } else { url };
                format!("{} @ {}", self.value(SettingsField::Model), url)
            }
            SettingsGroup::Prompt => {
                let custom = self.value(SettingsField::CustomInstructions);
                let instructions = if custom.is_empty() {
                    "no custom instructions".to_string()
                } else {
                    format!("\"{}\"", ellipsize(custom, 30))
                };
                let context = if parse_yes(self.value(SettingsField::IncludeCwd)) {
                    "dir context on"
                } else {
                    "dir context off"
                };
                format!("{instructions} • {context}")
            }
            SettingsGroup::Display => format!(
                "{} lines • clear: {} • {} • {}",
                self.value(SettingsField::MaxResponseLines),
                yes_no(parse_yes(self.value(SettingsField::ClearScreen))),
                self.value(SettingsField::Position),
                self.value(SettingsField::AccentColor),
            ),
        }
    }

    /// Normalize every field into the values the session applies.
    pub fn submission(&self) -> SettingsSubmission {
        let max_response_lines = self
            .value(SettingsField::MaxResponseLines)
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|lines| *lines >= MIN_RESPONSE_LINES)
            .unwrap_or(DEFAULT_MAX_COMPACT_LINES);
        SettingsSubmission {
            api_key: self.value(SettingsField::ApiKey).trim().to_string(),
            base_url: self.value(SettingsField::BaseUrl).trim().to_string(),
            default_model: self.value(SettingsField::Model).trim().to_string(),
            custom_instructions: self
                .value(SettingsField::CustomInstructions)
                .trim()
                .to_string(),
            include_cwd: parse_yes(self.value(SettingsField::IncludeCwd)),
            max_response_lines,
            clear_screen: parse_yes(self.value(SettingsField::ClearScreen)),
            position: Position::parse(self.value(SettingsField::Position)),
            accent_color: self.value(SettingsField::AccentColor).trim().to_string(),
        }
    }

    fn value(&self, field: SettingsField) -> &str {
        self.field(field).text()
    }
}

fn parse_yes(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true"
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
