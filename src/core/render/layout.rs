//! Text layout helpers
//! Glyph-width based line wrapping, UTF-8 safe cutting and the teleprompter
//! visible/next split, plus the fixed-width formatting used for plain text.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use log::{info, warn};
use serde::Deserialize;
use tokio::fs;

use crate::core::bluetooth::constants::{
    MAX_DISPLAY_LINES, MAX_LINE_LENGTH, TELEPROMPTER_BREAK_LOOKBACK, TELEPROMPTER_BYTE_BUDGET,
    TELEPROMPTER_NEXT_PADDING,
};

/// Width used for characters missing from the table
pub const DEFAULT_GLYPH_WIDTH: u32 = 5;
/// Width used for the space when the table has none
pub const DEFAULT_SPACE_WIDTH: u32 = 2;

const BUILTIN_FONT: &str = include_str!("../../../assets/g1_fonts.json");

#[derive(Debug, Deserialize)]
struct FontFile {
    glyphs: Vec<GlyphEntry>,
}

#[derive(Debug, Deserialize)]
struct GlyphEntry {
    #[serde(rename = "char")]
    character: String,
    width: u32,
}

/// Pixel width of each character on the glasses display.
#[derive(Debug, Clone, Default)]
pub struct GlyphWidthTable {
    widths: HashMap<char, u32>,
}

impl GlyphWidthTable {
    /// Parses a `{"glyphs": [{"char": "a", "width": 5}, ...]}` document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let font: FontFile = serde_json::from_str(json)?;
        let widths = font
            .glyphs
            .into_iter()
            .filter_map(|glyph| {
                let mut chars = glyph.character.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some((c, glyph.width)),
                    _ => None,
                }
            })
            .collect();
        Ok(Self { widths })
    }

    /// The table shipped with the crate
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_FONT).unwrap_or_else(|e| {
            warn!("Built-in glyph table is unreadable ({}), using default widths", e);
            Self::default()
        })
    }

    /// Loads a table from disk.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).await?;
        let table = Self::from_json(&json)?;
        info!("Loaded {} glyph widths from {:?}", table.len(), path);
        Ok(table)
    }

    /// The table at `path` when given and readable, the built-in one otherwise.
    pub async fn load_or_builtin(path: Option<&Path>) -> Self {
        match path {
            Some(path) => match Self::load(path).await {
                Ok(table) => table,
                Err(e) => {
                    warn!("Failed to load glyph table from {:?}: {}, using built-in", path, e);
                    Self::builtin()
                }
            },
            None => Self::builtin(),
        }
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn char_width(&self, c: char) -> u32 {
        match self.widths.get(&c) {
            Some(width) => *width,
            None if c == ' ' => DEFAULT_SPACE_WIDTH,
            None => DEFAULT_GLYPH_WIDTH,
        }
    }

    pub fn text_width(&self, text: &str) -> u32 {
        text.chars().map(|c| self.char_width(c)).sum()
    }

    /// Greedy word wrap to `max_width` pixels. Words are separated by single
    /// spaces; a word wider than a line gets a line of its own.
    pub fn add_line_breaks(&self, text: &str, max_width: u32) -> String {
        let space_width = self.char_width(' ');
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_width = 0u32;

        for word in text.split(' ') {
            let word_width = self.text_width(word);
            if current.is_empty() {
                current.push_str(word);
                current_width = word_width;
            } else if current_width + space_width + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space_width + word_width;
            } else {
                lines.push(std::mem::take(&mut current));
                current.push_str(word);
                current_width = word_width;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines.join("\n")
    }
}

/// Largest byte index `<= byte_limit` that lies on a character boundary.
pub fn find_safe_cut_position(text: &str, byte_limit: usize) -> usize {
    for (index, c) in text.char_indices() {
        if index + c.len_utf8() > byte_limit {
            return index;
        }
    }
    text.len()
}

/// Moves `max_pos` back by at most 40 characters to a readable break:
/// after sentence punctuation and a space, else after a newline, else after a space.
/// Returns `max_pos` when none of these occur in the window.
pub fn find_readable_break_point(text: &str, max_pos: usize) -> usize {
    let max_pos = max_pos.min(text.len());
    if !text.is_char_boundary(max_pos) {
        return max_pos;
    }

    let candidates: Vec<usize> = std::iter::once(max_pos)
        .chain(text[..max_pos].char_indices().rev().map(|(index, _)| index))
        .take(TELEPROMPTER_BREAK_LOOKBACK + 1)
        .filter(|pos| *pos > 0)
        .collect();

    let before = |pos: usize| {
        let mut chars = text[..pos].chars().rev();
        (chars.next(), chars.next())
    };

    let after_sentence = candidates.iter().find(|pos| {
        matches!(before(**pos), (Some(' '), Some(p)) if ".:;,!?".contains(p))
    });
    let after_newline = || candidates.iter().find(|pos| before(**pos).0 == Some('\n'));
    let after_space = || candidates.iter().find(|pos| before(**pos).0 == Some(' '));

    after_sentence
        .or_else(after_newline)
        .or_else(after_space)
        .copied()
        .unwrap_or(max_pos)
}

/// Visible and upcoming text of one teleprompter screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeleprompterSplit {
    pub visible: String,
    pub next: String,
}

/// Splits `text` into at most 112 visible bytes and the rest, the rest
/// followed by a newline and eight spaces.
///
/// Whitespace directly after the break stays visible as long as it fits the
/// budget, so `visible` plus the unpadded rest is always the input with its
/// trailing whitespace removed.
pub fn split_text_for_teleprompter(text: &str) -> TeleprompterSplit {
    let safe = find_safe_cut_position(text, TELEPROMPTER_BYTE_BUDGET);
    let cut = find_readable_break_point(text, safe);
    let gap = &text[cut..safe];
    let cut = cut + gap.len() - gap.trim_start().len();

    let (visible, remaining) = text.split_at(cut);
    TeleprompterSplit {
        visible: visible.to_string(),
        next: format!("{}{}", remaining.trim_end(), TELEPROMPTER_NEXT_PADDING),
    }
}

/// Greedy wrap at 60 characters per line.
pub fn split_text_into_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ') {
        if current.chars().count() + word.chars().count() < MAX_LINE_LENGTH {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Wrapped text limited to the five lines the display shows.
pub fn format_text_for_display(text: &str) -> String {
    split_text_into_lines(text)
        .into_iter()
        .take(MAX_DISPLAY_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> GlyphWidthTable {
        GlyphWidthTable::from_json(
            r#"{"glyphs":[{"char":"a","width":10},{"char":" ","width":4},{"char":"bad","width":1}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_widths_fall_back_to_defaults() {
        let glyphs = table();
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs.char_width('a'), 10);
        assert_eq!(glyphs.char_width(' '), 4);
        assert_eq!(glyphs.char_width('z'), DEFAULT_GLYPH_WIDTH);
        assert_eq!(GlyphWidthTable::default().char_width(' '), DEFAULT_SPACE_WIDTH);
    }

    #[test]
    fn test_builtin_table_loads() {
        let glyphs = GlyphWidthTable::builtin();
        assert!(!glyphs.is_empty());
        assert_eq!(glyphs.char_width('i'), 1);
    }

    #[test]
    fn test_add_line_breaks() {
        let glyphs = table();
        // "aa" = 20, "aa aa" = 44
        assert_eq!(glyphs.add_line_breaks("aa aa aa", 44), "aa aa\naa");
        assert_eq!(glyphs.add_line_breaks("aaaaaaa", 30), "aaaaaaa");
        assert_eq!(glyphs.add_line_breaks("", 30), "");
    }

    #[test]
    fn test_safe_cut_never_splits_code_points() {
        assert_eq!(find_safe_cut_position("abc", 112), 3);
        assert_eq!(find_safe_cut_position("aé", 2), 1);
        assert_eq!(find_safe_cut_position("€€", 5), 3);
        assert_eq!(find_safe_cut_position("😀😀", 7), 4);
        let text = "x😀é€".repeat(40);
        for limit in 0..=text.len() {
            let cut = find_safe_cut_position(&text, limit);
            assert!(text.is_char_boundary(cut));
            assert!(cut <= limit);
        }
    }

    #[test]
    fn test_break_prefers_sentence_end() {
        let text = "One. two three";
        assert_eq!(find_readable_break_point(text, text.len()), 5);
    }

    #[test]
    fn test_break_falls_back_to_newline_then_space() {
        let text = "one\ntwo three";
        assert_eq!(find_readable_break_point(text, text.len()), 4);
        let text = "one two";
        assert_eq!(find_readable_break_point(text, text.len()), 4);
        let text = "abcdef";
        assert_eq!(find_readable_break_point(text, 4), 4);
    }

    #[test]
    fn test_break_lookback_is_bounded() {
        let text = format!("a {}", "b".repeat(60));
        assert_eq!(find_readable_break_point(&text, text.len()), text.len());
    }

    #[test]
    fn test_split_reconstructs_short_text() {
        let text = "Hello there, general audience";
        let split = split_text_for_teleprompter(text);
        assert!(split.next.ends_with(TELEPROMPTER_NEXT_PADDING));
        let next = split.next.trim_end();
        assert_eq!(format!("{}{}", split.visible, next), text);
    }

    #[test]
    fn test_split_keeps_whitespace_after_break() {
        let split = split_text_for_teleprompter("Hi.  there");
        assert_eq!(split.visible, "Hi.  ");
        assert_eq!(split.next, format!("there{}", TELEPROMPTER_NEXT_PADDING));

        let split = split_text_for_teleprompter("a\n  b");
        assert_eq!(split.visible, "a\n  ");
        assert_eq!(split.next, format!("b{}", TELEPROMPTER_NEXT_PADDING));
    }

    #[test]
    fn test_split_respects_byte_budget() {
        let text = "Grüße aus München und überall 😀 ".repeat(10);
        let split = split_text_for_teleprompter(&text);
        assert!(split.visible.len() <= 112);
        assert!(!split.visible.is_empty());
    }

    #[test]
    fn test_format_text_for_display() {
        let words = vec!["word"; 100].join(" ");
        let formatted = format_text_for_display(&words);
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|line| line.chars().count() <= 60));
        assert_eq!(format_text_for_display("short"), "short");
    }
}
