//! Single-line editor used for the query prompt and the settings fields.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Maximum characters accepted in the query prompt.
pub const COMPOSE_MAX_CHARS: usize = 2_000;

/// Editable text with a character cursor and an optional completion hint.
///
/// The cursor counts characters, not bytes. The hint is display-only; every
/// edit clears it.
#[derive(Debug, Clone)]
pub struct ComposeInput {
    text: String,
    cursor: usize,
    hint: Option<String>,
    limit: usize,
}

impl Default for ComposeInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ComposeInput {
    pub fn new() -> Self {
        Self::with_limit(COMPOSE_MAX_CHARS)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            hint: None,
            limit,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn set_hint(&mut self, hint: Option<String>) {
        self.hint = hint.filter(|hint| !hint.is_empty());
    }

    /// Replace the contents, truncated to the limit, with the cursor at the end.
    pub fn set_text(&mut self, text: &str) {
        self.text = text.chars().take(self.limit).collect();
        self.cursor = self.char_len();
        self.hint = None;
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.hint = None;
    }

    /// Text before and after the cursor, for rendering the caret between them.
    pub fn split_at_cursor(&self) -> (&str, &str) {
        self.text.split_at(self.byte_index(self.cursor))
    }

    /// Insert at the cursor. Returns false once the limit is reached.
    pub fn insert(&mut self, ch: char) -> bool {
        self.hint = None;
        if self.char_len() >= self.limit {
            return false;
        }
        let at = self.byte_index(self.cursor);
        self.text.insert(at, ch);
        self.cursor += 1;
        true
    }

    pub fn backspace(&mut self) {
        self.hint = None;
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_index(self.cursor - 1);
        self.text.remove(at);
        self.cursor -= 1;
    }

    pub fn delete(&mut self) {
        self.hint = None;
        if self.cursor >= self.char_len() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.text.remove(at);
    }

    pub fn move_left(&mut self) {
        self.hint = None;
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.hint = None;
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn move_home(&mut self) {
        self.hint = None;
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.hint = None;
        self.cursor = self.char_len();
    }

    /// Remove everything before the cursor (Ctrl+U).
    pub fn clear_to_start(&mut self) {
        self.hint = None;
        let at = self.byte_index(self.cursor);
        self.text.replace_range(..at, "");
        self.cursor = 0;
    }

    /// Apply a line-editing key. Returns whether the key was consumed.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('u') if ctrl => self.clear_to_start(),
            KeyCode::Char('a') if ctrl => self.move_home(),
            KeyCode::Char('e') if ctrl => self.move_end(),
            KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => return false,
            KeyCode::Char(ch) => {
                self.insert(ch);
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            _ => return false,
        }
        true
    }

    /// The text with every character replaced, for secret fields.
    pub fn masked(&self) -> String {
        "•".repeat(self.char_len())
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len())
    }
}
