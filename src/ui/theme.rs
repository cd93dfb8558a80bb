//! Colors and border choice derived from the user's theme settings.

use crate::config::{ThemeSettings, DEFAULT_ACCENT_COLOR};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::BorderType;

const DIM: Color = Color::Rgb(0x66, 0x66, 0x66);
const HINT: Color = Color::Rgb(0x55, 0x55, 0x55);
const TEXT: Color = Color::Rgb(0xFF, 0xFF, 0xFF);
const ERROR: Color = Color::Rgb(0xFF, 0x44, 0x44);

/// Styles used by `draw`. Built by the render loop from the session's
/// settings on every frame and passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub accent: Color,
    pub border_type: BorderType,
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_accent(DEFAULT_ACCENT_COLOR)
    }
}

impl Theme {
    /// Parse `#RRGGBB` or `RRGGBB`; anything else uses the default accent.
    pub fn from_accent(hex: &str) -> Self {
        let accent = parse_hex(hex)
            .or_else(|| parse_hex(DEFAULT_ACCENT_COLOR))
            .map(|(r, g, b)| Color::Rgb(r, g, b))
            .unwrap_or(Color::LightRed);
        Self {
            accent,
            border_type: BorderType::Rounded,
        }
    }

    pub fn from_settings(theme: &ThemeSettings) -> Self {
        Self {
            border_type: border_type(&theme.border_style),
            ..Self::from_accent(&theme.accent_color)
        }
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn text(&self) -> Style {
        Style::default().fg(TEXT)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(DIM)
    }

    pub fn hint(&self) -> Style {
        Style::default().fg(HINT)
    }

    pub fn prompt(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn spinner(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn selected(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(ERROR).add_modifier(Modifier::BOLD)
    }

    pub fn status(&self) -> Style {
        Style::default().fg(DIM).add_modifier(Modifier::ITALIC)
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn border_type(name: &str) -> BorderType {
    match name.trim().to_ascii_lowercase().as_str() {
        "plain" | "single" => BorderType::Plain,
        "double" => BorderType::Double,
        "thick" | "heavy" => BorderType::Thick,
        _ => BorderType::Rounded,
    }
}
