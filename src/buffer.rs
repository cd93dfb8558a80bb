//! Accumulated answer text plus the pager viewport over it.
//!
//! The buffer never stores a line count of its own; every query re-derives it
//! from `text`, so appends can never leave the two out of sync.
//!
//! Overflow is decided on logical lines. Scrolling works on display rows: the
//! logical lines hard-wrapped at the pager's content width, once that width is
//! known.

use crate::ui::text::wrap_text;

/// Default number of lines shown before the pager takes over.
pub const DEFAULT_MAX_COMPACT_LINES: usize = 8;

/// Streamed answer text and the scroll state used when it is paged.
#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    text: String,
    max_compact_lines: usize,
    visible_height: usize,
    wrap_width: Option<usize>,
    scroll_offset: usize,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_COMPACT_LINES)
    }
}

impl ResponseBuffer {
    pub fn new(max_compact_lines: usize) -> Self {
        Self {
            text: String::new(),
            max_compact_lines,
            visible_height: max_compact_lines.max(1),
            wrap_width: None,
            scroll_offset: 0,
        }
    }

    /// Append a streamed fragment. Content only grows until `clear`.
    pub fn append(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text.push_str(chunk);
        self.clamp_offset();
    }

    /// Replace the whole buffer with static content (help text, for example).
    pub fn set_text(&mut self, text: &str) {
        self.clear();
        self.append(text);
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.scroll_offset = 0;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of logical lines: zero for an empty buffer, otherwise line breaks + 1.
    pub fn line_count(&self) -> usize {
        if self.text.is_empty() {
            return 0;
        }
        self.text.matches('\n').count() + 1
    }

    pub fn overflows(&self, threshold: usize) -> bool {
        self.line_count() > threshold
    }

    /// Overflow against the injected threshold; decides pager entry.
    pub fn is_overflowing(&self) -> bool {
        self.overflows(self.max_compact_lines)
    }

    pub fn max_compact_lines(&self) -> usize {
        self.max_compact_lines
    }

    pub fn set_max_compact_lines(&mut self, lines: usize) {
        self.max_compact_lines = lines;
    }

    pub fn visible_height(&self) -> usize {
        self.visible_height
    }

    pub fn set_visible_height(&mut self, height: usize) {
        self.visible_height = height.max(1);
        self.clamp_offset();
    }

    /// Width the pager wraps at. Unset means one display row per logical line.
    pub fn set_wrap_width(&mut self, width: usize) {
        self.wrap_width = Some(width.max(1));
        self.clamp_offset();
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// The text as the pager lays it out.
    pub fn display_rows(&self) -> Vec<String> {
        if self.text.is_empty() {
            return Vec::new();
        }
        match self.wrap_width {
            Some(width) => wrap_text(&self.text, width),
            None => self.text.split('\n').map(str::to_string).collect(),
        }
    }

    /// Largest offset that still fills the viewport.
    pub fn max_offset(&self) -> usize {
        self.display_rows().len().saturating_sub(self.visible_height)
    }

    pub fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(1).min(self.max_offset());
    }

    pub fn page_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(self.visible_height);
    }

    pub fn page_down(&mut self) {
        self.scroll_offset = self
            .scroll_offset
            .saturating_add(self.visible_height)
            .min(self.max_offset());
    }

    pub fn to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn to_bottom(&mut self) {
        self.scroll_offset = self.max_offset();
    }

    pub fn at_top(&self) -> bool {
        self.scroll_offset == 0
    }

    pub fn at_bottom(&self) -> bool {
        self.scroll_offset >= self.max_offset()
    }

    /// Display rows inside `[scroll_offset, scroll_offset + visible_height)`.
    pub fn visible_lines(&self) -> Vec<String> {
        self.display_rows()
            .into_iter()
            .skip(self.scroll_offset)
            .take(self.visible_height)
            .collect()
    }

    /// Short position label for the pager status line.
    pub fn scroll_position(&self) -> String {
        if self.at_top() {
            return "TOP".into();
        }
        if self.at_bottom() {
            return "END".into();
        }
        let total = self.max_offset();
        if total == 0 {
            return "100%".into();
        }
        format!("{}%", self.scroll_offset * 100 / total)
    }

    fn clamp_offset(&mut self) {
        let max = self.max_offset();
        if self.scroll_offset > max {
            self.scroll_offset = max;
        }
    }
}
