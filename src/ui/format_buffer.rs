//! Multi-line editor used for cell values that don't fit inline.
//!
//! The buffer is a list of lines plus a running-offset table:
//! `running_offsets[i]` is the character offset at which line `i` starts in
//! the joined text, and `running_offsets[i + 1] = running_offsets[i] +
//! len(line_i) + 1`, i.e. line `i` (with its separator) ends exactly where
//! line `i + 1` begins. The final entry is the sentinel one past the virtual
//! trailing separator, so it always equals `chars(text) + 1`.
//!
//! Every mutation patches the affected line and shifts only the offsets
//! after it. Offsets and columns count Unicode scalar values, not bytes.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_JSON_INDENT: usize = 4;
pub const DEFAULT_TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorDirection {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
}

#[derive(Debug, Clone)]
pub struct FormatBuffer {
    lines: Vec<String>,
    running_offsets: Vec<usize>,
    cursor_line: usize,
    cursor_col: usize,
    /// First line shown in the viewport
    scroll: usize,
    viewport_height: usize,
    tab_width: usize,
}

impl FormatBuffer {
    /// Open `raw` for editing. JSON objects and arrays are pretty-printed
    /// with `json_indent` spaces; anything else is kept verbatim.
    pub fn enter(raw: &str, json_indent: usize, tab_width: usize) -> Self {
        let text = pretty_json(raw, json_indent).unwrap_or_else(|| raw.to_string());
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let running_offsets = compute_offsets(&lines);
        debug!(target: "format", "Entered format mode with {} lines", lines.len());

        Self {
            lines,
            running_offsets,
            cursor_line: 0,
            cursor_col: 0,
            scroll: 0,
            viewport_height: 1,
            tab_width,
        }
    }

    /// Empty buffer, used for `:new` and `:sql`
    pub fn empty(tab_width: usize) -> Self {
        Self::enter("", DEFAULT_JSON_INDENT, tab_width)
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn running_offsets(&self) -> &[usize] {
        &self.running_offsets
    }

    /// (line, column) of the cursor in the buffer
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_line, self.cursor_col)
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
        self.ensure_cursor_visible();
    }

    /// Lines currently inside the viewport
    pub fn visible_lines(&self) -> &[String] {
        let end = (self.scroll + self.viewport_height).min(self.lines.len());
        &self.lines[self.scroll.min(end)..end]
    }

    /// Cursor position relative to the viewport's top-left corner
    pub fn cursor_on_screen(&self) -> (usize, usize) {
        (self.cursor_line - self.scroll, self.cursor_col)
    }

    /// Character offset of the cursor in the joined text
    pub fn cursor_offset(&self) -> usize {
        self.running_offsets[self.cursor_line] + self.cursor_col
    }

    pub fn move_cursor(&mut self, direction: CursorDirection) {
        match direction {
            CursorDirection::Left => {
                if self.cursor_col > 0 {
                    self.cursor_col -= 1;
                } else if self.cursor_line > 0 {
                    self.cursor_line -= 1;
                    self.cursor_col = self.line_len(self.cursor_line);
                }
            }
            CursorDirection::Right => {
                if self.cursor_col < self.line_len(self.cursor_line) {
                    self.cursor_col += 1;
                } else if self.cursor_line + 1 < self.lines.len() {
                    self.cursor_line += 1;
                    self.cursor_col = 0;
                }
            }
            CursorDirection::Up => {
                if self.cursor_line > 0 {
                    self.cursor_line -= 1;
                    self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_line));
                }
            }
            CursorDirection::Down => {
                if self.cursor_line + 1 < self.lines.len() {
                    self.cursor_line += 1;
                    self.cursor_col = self.cursor_col.min(self.line_len(self.cursor_line));
                }
            }
            CursorDirection::Home => self.cursor_col = 0,
            CursorDirection::End => self.cursor_col = self.line_len(self.cursor_line),
        }
        self.ensure_cursor_visible();
    }

    pub fn insert_char(&mut self, c: char) {
        if c == '\n' {
            self.insert_newline();
            return;
        }
        let mut buf = [0u8; 4];
        self.insert_in_line(c.encode_utf8(&mut buf));
    }

    pub fn insert_tab(&mut self) {
        let spaces = " ".repeat(self.tab_width);
        self.insert_in_line(&spaces);
    }

    /// Split the current line at the cursor
    pub fn insert_newline(&mut self) {
        let line = self.cursor_line;
        let at = byte_index(&self.lines[line], self.cursor_col);
        let tail = self.lines[line].split_off(at);
        self.lines.insert(line + 1, tail);

        let start = self.running_offsets[line] + self.cursor_col + 1;
        self.running_offsets.insert(line + 1, start);
        self.shift_offsets_after(line + 1, 1);

        self.cursor_line += 1;
        self.cursor_col = 0;
        self.ensure_cursor_visible();
    }

    /// Remove the character left of the cursor, or join this line onto the
    /// previous one when the cursor is at column 0
    pub fn backspace(&mut self) {
        if self.cursor_col > 0 {
            let line = self.cursor_line;
            let at = byte_index(&self.lines[line], self.cursor_col - 1);
            self.lines[line].remove(at);
            self.shift_offsets_after(line, -1);
            self.cursor_col -= 1;
        } else if self.cursor_line > 0 {
            let previous_len = self.line_len(self.cursor_line - 1);
            self.join_with_next(self.cursor_line - 1);
            self.cursor_line -= 1;
            self.cursor_col = previous_len;
        }
        self.ensure_cursor_visible();
    }

    /// Remove the character under the cursor, or pull the next line up when
    /// the cursor is at the end of its line
    pub fn delete(&mut self) {
        let line = self.cursor_line;
        if self.cursor_col < self.line_len(line) {
            let at = byte_index(&self.lines[line], self.cursor_col);
            self.lines[line].remove(at);
            self.shift_offsets_after(line, -1);
        } else if line + 1 < self.lines.len() {
            self.join_with_next(line);
        }
    }

    /// Leave format mode. A committed buffer that holds valid JSON is
    /// minified so no pretty-print whitespace reaches the cell.
    pub fn exit(self, commit: bool) -> Option<String> {
        if !commit {
            debug!(target: "format", "Format buffer discarded");
            return None;
        }
        Some(minify_if_json(&self.text()))
    }

    /// Offsets recomputed from scratch agree with the maintained table
    pub fn check_invariants(&self) -> bool {
        let text = self.text();
        let fresh: Vec<String> = text.split('\n').map(str::to_string).collect();
        fresh == self.lines
            && compute_offsets(&fresh) == self.running_offsets
            && self.running_offsets.last() == Some(&(text.chars().count() + 1))
            && self.cursor_line < self.lines.len()
            && self.cursor_col <= self.line_len(self.cursor_line)
    }

    fn insert_in_line(&mut self, s: &str) {
        let line = self.cursor_line;
        let at = byte_index(&self.lines[line], self.cursor_col);
        self.lines[line].insert_str(at, s);
        let inserted = s.chars().count();
        self.shift_offsets_after(line, inserted as isize);
        self.cursor_col += inserted;
    }

    /// Append line `line + 1` to line `line`, removing the separator
    fn join_with_next(&mut self, line: usize) {
        let next = self.lines.remove(line + 1);
        self.lines[line].push_str(&next);
        self.running_offsets.remove(line + 1);
        self.shift_offsets_after(line, -1);
    }

    /// Shift every offset strictly after line `line` by `delta`
    fn shift_offsets_after(&mut self, line: usize, delta: isize) {
        for offset in &mut self.running_offsets[line + 1..] {
            *offset = offset.saturating_add_signed(delta);
        }
    }

    fn line_len(&self, line: usize) -> usize {
        self.lines.get(line).map_or(0, |l| l.chars().count())
    }

    fn ensure_cursor_visible(&mut self) {
        if self.cursor_line < self.scroll {
            self.scroll = self.cursor_line;
        } else if self.cursor_line >= self.scroll + self.viewport_height {
            self.scroll = self.cursor_line + 1 - self.viewport_height;
        }
    }
}

fn compute_offsets(lines: &[String]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    let mut total = 0;
    offsets.push(total);
    for line in lines {
        total += line.chars().count() + 1;
        offsets.push(total);
    }
    offsets
}

fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map_or(line.len(), |(idx, _)| idx)
}

/// JSON object or array parsed from `raw`; scalars don't count as JSON here
fn parse_json_document(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

pub fn pretty_json(raw: &str, indent: usize) -> Option<String> {
    let value = parse_json_document(raw)?;
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut serializer).ok()?;
    String::from_utf8(out).ok()
}

/// Compact form of `text` when it is a JSON document, otherwise `text`
/// unchanged. Whitespace inside string literals is preserved.
pub fn minify_if_json(text: &str) -> String {
    parse_json_document(text)
        .and_then(|value| serde_json::to_string(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(raw: &str) -> FormatBuffer {
        FormatBuffer::enter(raw, DEFAULT_JSON_INDENT, DEFAULT_TAB_WIDTH)
    }

    #[test]
    fn test_json_object_is_pretty_printed() {
        let buf = buffer(r#"{"a":1,"b":2}"#);
        assert_eq!(buf.lines(), &["{", r#"    "a": 1,"#, r#"    "b": 2"#, "}"]);
        assert_eq!(buf.running_offsets(), &[0, 2, 14, 25, 27]);

        let text: Vec<char> = buf.text().chars().collect();
        for i in 1..buf.line_count() {
            let start = buf.running_offsets()[i];
            assert_eq!(text[start - 1], '\n');
            let previous_end = buf.running_offsets()[i - 1] + buf.lines()[i - 1].chars().count();
            assert_eq!(previous_end + 1, start);
        }
        assert!(buf.check_invariants());
    }

    #[test]
    fn test_plain_text_kept_verbatim() {
        let buf = buffer("hello\nworld");
        assert_eq!(buf.lines(), &["hello", "world"]);
        assert_eq!(buf.running_offsets(), &[0, 6, 12]);

        let scalar = buffer("42");
        assert_eq!(scalar.lines(), &["42"]);
        assert_eq!(scalar.exit(true).as_deref(), Some("42"));
    }

    #[test]
    fn test_empty_buffer_has_one_editable_line() {
        let mut buf = FormatBuffer::empty(DEFAULT_TAB_WIDTH);
        assert_eq!(buf.running_offsets(), &[0, 1]);
        buf.insert_char('x');
        assert_eq!(buf.text(), "x");
        assert_eq!(buf.running_offsets(), &[0, 2]);
    }

    #[test]
    fn test_insert_shifts_later_offsets() {
        let mut buf = buffer("ab\ncd\nef");
        buf.move_cursor(CursorDirection::Down);
        buf.move_cursor(CursorDirection::Right);
        buf.insert_char('X');
        assert_eq!(buf.text(), "ab\ncXd\nef");
        assert_eq!(buf.running_offsets(), &[0, 3, 7, 10]);
        assert_eq!(buf.cursor(), (1, 2));

        buf.insert_tab();
        assert_eq!(buf.lines()[1], "cX    d");
        assert_eq!(buf.running_offsets(), &[0, 3, 11, 14]);
        assert!(buf.check_invariants());
    }

    #[test]
    fn test_newline_splits_line() {
        let mut buf = buffer("abcd");
        buf.move_cursor(CursorDirection::Right);
        buf.move_cursor(CursorDirection::Right);
        buf.insert_newline();
        assert_eq!(buf.lines(), &["ab", "cd"]);
        assert_eq!(buf.running_offsets(), &[0, 3, 6]);
        assert_eq!(buf.cursor(), (1, 0));
        assert_eq!(buf.cursor_offset(), 3);
    }

    #[test]
    fn test_backspace_merges_lines_at_column_zero() {
        let mut buf = buffer("ab\ncd");
        buf.move_cursor(CursorDirection::Down);
        buf.backspace();
        assert_eq!(buf.lines(), &["abcd"]);
        assert_eq!(buf.cursor(), (0, 2));
        assert_eq!(buf.running_offsets(), &[0, 5]);

        buf.backspace();
        assert_eq!(buf.text(), "acd");
        assert_eq!(buf.cursor(), (0, 1));

        buf.move_cursor(CursorDirection::Home);
        buf.backspace();
        assert_eq!(buf.text(), "acd");
        assert!(buf.check_invariants());
    }

    #[test]
    fn test_delete_joins_next_line_at_end() {
        let mut buf = buffer("ab\ncd");
        buf.move_cursor(CursorDirection::End);
        buf.delete();
        assert_eq!(buf.text(), "abcd");
        assert_eq!(buf.cursor(), (0, 2));
        buf.delete();
        assert_eq!(buf.text(), "abd");
        buf.move_cursor(CursorDirection::End);
        buf.delete();
        assert_eq!(buf.text(), "abd");
        buf.move_cursor(CursorDirection::Home);
        buf.delete();
        assert_eq!(buf.text(), "bd");
        assert!(buf.check_invariants());
    }

    #[test]
    fn test_horizontal_moves_roll_over_lines() {
        let mut buf = buffer("ab\ncd");
        buf.move_cursor(CursorDirection::End);
        buf.move_cursor(CursorDirection::Right);
        assert_eq!(buf.cursor(), (1, 0));
        buf.move_cursor(CursorDirection::Left);
        assert_eq!(buf.cursor(), (0, 2));
        buf.move_cursor(CursorDirection::Up);
        assert_eq!(buf.cursor(), (0, 2));
    }

    #[test]
    fn test_vertical_moves_clamp_column() {
        let mut buf = buffer("long line\nx\nanother");
        buf.move_cursor(CursorDirection::End);
        buf.move_cursor(CursorDirection::Down);
        assert_eq!(buf.cursor(), (1, 1));
        buf.move_cursor(CursorDirection::Down);
        assert_eq!(buf.cursor(), (2, 1));
    }

    #[test]
    fn test_cursor_scrolls_viewport() {
        let mut buf = buffer("0\n1\n2\n3\n4\n5");
        buf.set_viewport_height(3);
        assert_eq!(buf.visible_lines(), &["0", "1", "2"]);
        for _ in 0..4 {
            buf.move_cursor(CursorDirection::Down);
        }
        assert_eq!(buf.scroll(), 2);
        assert_eq!(buf.visible_lines(), &["2", "3", "4"]);
        assert_eq!(buf.cursor_on_screen(), (2, 0));

        for _ in 0..4 {
            buf.move_cursor(CursorDirection::Left);
        }
        assert_eq!(buf.cursor(), (2, 0));
        assert_eq!(buf.scroll(), 2);
        buf.move_cursor(CursorDirection::Left);
        assert_eq!(buf.cursor(), (1, 1));
        assert_eq!(buf.scroll(), 1);
    }

    #[test]
    fn test_multibyte_characters_count_once() {
        let mut buf = buffer("héllo\nwörld");
        assert_eq!(buf.running_offsets(), &[0, 6, 12]);
        buf.move_cursor(CursorDirection::Right);
        buf.move_cursor(CursorDirection::Right);
        buf.insert_char('ß');
        assert_eq!(buf.lines()[0], "héßllo");
        buf.backspace();
        buf.backspace();
        assert_eq!(buf.lines()[0], "hllo");
        assert!(buf.check_invariants());
    }

    #[test]
    fn test_offsets_hold_for_mixed_edit_sequence() {
        let mut buf = buffer(r#"{"name":"a b","tags":[1,2]}"#);
        buf.set_viewport_height(4);

        // Small LCG so the sequence is varied but reproducible
        let mut seed: u64 = 0x2545_f491;
        for step in 0..500 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            match (seed >> 33) % 9 {
                0 => buf.insert_char('z'),
                1 => buf.insert_char('é'),
                2 => buf.insert_newline(),
                3 => buf.insert_tab(),
                4 | 5 => buf.backspace(),
                6 => buf.delete(),
                7 => buf.move_cursor(CursorDirection::Up),
                _ => buf.move_cursor(CursorDirection::Right),
            }
            assert!(buf.check_invariants(), "offsets diverged at step {}", step);
            assert!(buf.cursor_line >= buf.scroll && buf.cursor_line < buf.scroll + 4);
        }
    }

    #[test]
    fn test_commit_minifies_json() {
        let buf = buffer(r#"{"a":1,"b":2}"#);
        assert_eq!(buf.exit(true).as_deref(), Some(r#"{"a":1,"b":2}"#));

        let mut edited = buffer(r#"{"msg":"two  spaces","n":[1,2]}"#);
        edited.move_cursor(CursorDirection::Down);
        edited.insert_tab();
        assert_eq!(
            edited.exit(true).as_deref(),
            Some(r#"{"msg":"two  spaces","n":[1,2]}"#)
        );
    }

    #[test]
    fn test_json_round_trip_is_structurally_equal() {
        let docs = [
            r#"{"b":[1,2,{"c":null}],"a":"x y"}"#,
            r#"[true, false, 1.5, "s"]"#,
            r#"  {"nested": {"deep": {"deeper": []}}}  "#,
        ];
        for doc in docs {
            let pretty = pretty_json(doc, DEFAULT_JSON_INDENT).unwrap();
            let minified = minify_if_json(&pretty);
            let original: Value = serde_json::from_str(doc).unwrap();
            let round_tripped: Value = serde_json::from_str(&minified).unwrap();
            assert_eq!(original, round_tripped);
            assert!(!minified.contains('\n'));
        }
    }

    #[test]
    fn test_cancel_discards() {
        let mut buf = buffer("keep");
        buf.insert_char('!');
        assert_eq!(buf.exit(false), None);
    }

    #[test]
    fn test_invalid_json_is_not_touched() {
        let raw = "{not json,\n  at all}";
        let buf = buffer(raw);
        assert_eq!(buf.line_count(), 2);
        assert_eq!(buf.exit(true).as_deref(), Some(raw));
    }
}
