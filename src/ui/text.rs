//! Column-aware string helpers for laying text out in terminal cells.
//!
//! Everything here measures with `unicode-width`, so wide glyphs take two
//! columns and combining marks take none.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const TAB_WIDTH: usize = 4;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Hard-wrap one line at `width` columns. Always yields at least one row.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for ch in line.chars() {
        if ch == '\t' {
            for _ in 0..TAB_WIDTH {
                push_wrapped(&mut rows, &mut current, &mut used, ' ', 1, width);
            }
            continue;
        }
        if ch.is_control() {
            continue;
        }
        push_wrapped(&mut rows, &mut current, &mut used, ch, char_width(ch), width);
    }
    rows.push(current);
    rows
}

fn push_wrapped(
    rows: &mut Vec<String>,
    current: &mut String,
    used: &mut usize,
    ch: char,
    ch_width: usize,
    width: usize,
) {
    if *used + ch_width > width && *used > 0 {
        rows.push(std::mem::take(current));
        *used = 0;
    }
    current.push(ch);
    *used += ch_width;
}

/// Hard-wrap multi-line text; `\n` always starts a new row.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    text.split('\n')
        .flat_map(|line| wrap_line(line.trim_end_matches('\r'), width))
        .collect()
}

/// Longest prefix that fits in `width` columns.
pub fn truncate_to_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in s.char_indices() {
        let w = char_width(ch);
        if used + w > width {
            return &s[..idx];
        }
        used += w;
    }
    s
}

/// Longest suffix that fits in `width` columns; keeps the caret end of a long
/// prompt on screen.
pub fn tail_to_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in s.char_indices().rev() {
        let w = char_width(ch);
        if used + w > width {
            return &s[idx + ch.len_utf8()..];
        }
        used += w;
    }
    s
}

/// Cut to `max_chars` characters, marking the cut with `...`.
pub fn ellipsize(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_line_splits_on_columns() {
        assert_eq!(wrap_line("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(wrap_line("", 3), vec![""]);
    }

    #[test]
    fn wide_glyphs_never_split_across_rows() {
        // Each CJK glyph is two columns wide.
        assert_eq!(wrap_line("日本語", 3), vec!["日", "本", "語"]);
        assert_eq!(wrap_line("a日本", 4), vec!["a日", "本"]);
    }

    #[test]
    fn wrap_text_keeps_blank_lines() {
        assert_eq!(wrap_text("ab\n\ncd", 10), vec!["ab", "", "cd"]);
        assert_eq!(wrap_text("tab\there", 20), vec!["tab    here"]);
    }

    #[test]
    fn truncate_and_tail_respect_width() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("日本", 3), "日");
        assert_eq!(tail_to_width("hello", 3), "llo");
        assert_eq!(tail_to_width("日本", 3), "本");
        assert_eq!(tail_to_width("hi", 10), "hi");
    }

    #[test]
    fn ellipsize_marks_truncation() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("abcdefghij", 6), "abc...");
        assert_eq!(display_width("日本"), 4);
    }
}
