//! Editor pane
//!
//! The open document as a vector of lines plus a cursor. Files are read as
//! UTF-8, silently dropping bytes that do not decode, and written back
//! verbatim on save.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{byte_index, FileAccessError, PaneEffect};
use crate::ui::keymapper::{Key, KeyEvent};

/// Cursor position in characters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPos {
    pub row: usize,
    pub col: usize,
}

impl CursorPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// An in-memory document and the file backing it
#[derive(Debug, Clone)]
pub struct EditorDocument {
    path: Option<PathBuf>,
    /// Never empty; a trailing newline shows up as a final empty line
    lines: Vec<String>,
    /// Content as of the last load or save
    saved: String,
}

impl Default for EditorDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl EditorDocument {
    /// A scratch document with no backing file
    pub fn empty() -> Self {
        Self {
            path: None,
            lines: vec![String::new()],
            saved: String::new(),
        }
    }

    /// Read a file
    pub fn open(path: &Path) -> Result<Self, FileAccessError> {
        let bytes = fs::read(path).map_err(|source| FileAccessError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let text = decode_dropping_invalid(&bytes);
        let mut doc = Self::empty();
        doc.path = Some(path.to_path_buf());
        doc.set_text(&text);
        doc.saved = text;
        Ok(doc)
    }

    /// Write to the backing file. Returns false when there is none.
    pub fn save(&mut self) -> Result<bool, FileAccessError> {
        let Some(path) = self.path.clone() else {
            return Ok(false);
        };
        let text = self.text();
        fs::write(&path, &text).map_err(|source| FileAccessError::Save {
            path: path.clone(),
            source,
        })?;
        info!("saved {} ({} bytes)", path.display(), text.len());
        self.saved = text;
        Ok(true)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn set_text(&mut self, text: &str) {
        self.lines = text.split('\n').map(str::to_string).collect();
    }

    pub fn is_dirty(&self) -> bool {
        self.text() != self.saved
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Length of a line in characters (0 past the end)
    pub fn line_len(&self, row: usize) -> usize {
        self.lines.get(row).map(|l| l.chars().count()).unwrap_or(0)
    }

    /// Clamp a position to the document
    pub fn clamp(&self, pos: CursorPos) -> CursorPos {
        let row = pos.row.min(self.lines.len() - 1);
        CursorPos::new(row, pos.col.min(self.line_len(row)))
    }

    fn insert_str(&mut self, pos: CursorPos, s: &str) {
        let line = &mut self.lines[pos.row];
        let at = byte_index(line, pos.col);
        line.insert_str(at, s);
    }

    fn split_line(&mut self, pos: CursorPos) {
        let line = &mut self.lines[pos.row];
        let at = byte_index(line, pos.col);
        let rest = line.split_off(at);
        self.lines.insert(pos.row + 1, rest);
    }

    /// Remove the character at `pos`, joining with the next line at end of line
    fn remove_at(&mut self, pos: CursorPos) -> bool {
        if pos.col < self.line_len(pos.row) {
            let line = &mut self.lines[pos.row];
            let at = byte_index(line, pos.col);
            line.remove(at);
            true
        } else if pos.row + 1 < self.lines.len() {
            let next = self.lines.remove(pos.row + 1);
            self.lines[pos.row].push_str(&next);
            true
        } else {
            false
        }
    }
}

/// Decode UTF-8, skipping any byte sequences that are not valid
fn decode_dropping_invalid(mut bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    loop {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                out.push_str(s);
                return out;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // valid_up_to guarantees this prefix decodes
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                let skip = e.error_len().unwrap_or(rest.len());
                bytes = &rest[skip..];
            }
        }
    }
}

/// The editor pane: a document, its cursor and the visible window
pub struct EditorPane {
    doc: EditorDocument,
    cursor: CursorPos,
    /// First visible row
    scroll_top: usize,
    viewport_rows: usize,
    tab_width: usize,
}

impl EditorPane {
    pub fn new(tab_width: usize) -> Self {
        Self {
            doc: EditorDocument::empty(),
            cursor: CursorPos::default(),
            scroll_top: 0,
            viewport_rows: 1,
            tab_width: tab_width.max(1),
        }
    }

    /// Replace the document and reset the cursor
    pub fn load(&mut self, doc: EditorDocument) {
        self.doc = doc;
        self.cursor = CursorPos::default();
        self.scroll_top = 0;
    }

    pub fn save(&mut self) -> Result<bool, FileAccessError> {
        self.doc.save()
    }

    pub fn document(&self) -> &EditorDocument {
        &self.doc
    }

    #[cfg(test)]
    pub fn document_mut(&mut self) -> &mut EditorDocument {
        &mut self.doc
    }

    pub fn cursor(&self) -> CursorPos {
        self.cursor
    }

    /// Move the cursor, clamped to the document
    pub fn set_cursor(&mut self, pos: CursorPos) {
        self.cursor = self.doc.clamp(pos);
        self.adjust_scroll();
    }

    pub fn tab_width(&self) -> usize {
        self.tab_width
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport_rows = rows.max(1);
        self.adjust_scroll();
    }

    fn adjust_scroll(&mut self) {
        if self.cursor.row < self.scroll_top {
            self.scroll_top = self.cursor.row;
        } else if self.cursor.row >= self.scroll_top + self.viewport_rows {
            self.scroll_top = self.cursor.row + 1 - self.viewport_rows;
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> PaneEffect {
        if let Some(ch) = event.printable() {
            self.doc.insert_str(self.cursor, ch.encode_utf8(&mut [0u8; 4]));
            self.cursor.col += 1;
            return PaneEffect::Redraw;
        }

        let ctrl = event.has_ctrl();
        let c = self.cursor;
        match event.key {
            Key::Enter => {
                self.doc.split_line(c);
                self.cursor = CursorPos::new(c.row + 1, 0);
            }
            Key::Tab => {
                let spaces = " ".repeat(self.tab_width);
                self.doc.insert_str(c, &spaces);
                self.cursor.col += self.tab_width;
            }
            Key::Backspace => {
                if c.col > 0 {
                    self.cursor.col -= 1;
                    self.doc.remove_at(self.cursor);
                } else if c.row > 0 {
                    let prev = CursorPos::new(c.row - 1, self.doc.line_len(c.row - 1));
                    self.doc.remove_at(prev);
                    self.cursor = prev;
                } else {
                    return PaneEffect::Ignored;
                }
            }
            Key::Delete => {
                if !self.doc.remove_at(c) {
                    return PaneEffect::Ignored;
                }
            }
            Key::Left => {
                if c.col > 0 {
                    self.cursor.col -= 1;
                } else if c.row > 0 {
                    self.cursor = CursorPos::new(c.row - 1, self.doc.line_len(c.row - 1));
                }
            }
            Key::Right => {
                if c.col < self.doc.line_len(c.row) {
                    self.cursor.col += 1;
                } else if c.row + 1 < self.doc.line_count() {
                    self.cursor = CursorPos::new(c.row + 1, 0);
                }
            }
            Key::Up => self.cursor = self.doc.clamp(CursorPos::new(c.row.saturating_sub(1), c.col)),
            Key::Down => self.cursor = self.doc.clamp(CursorPos::new(c.row + 1, c.col)),
            Key::Home if ctrl => self.cursor = CursorPos::default(),
            Key::End if ctrl => {
                let last = self.doc.line_count() - 1;
                self.cursor = CursorPos::new(last, self.doc.line_len(last));
            }
            Key::Home => self.cursor.col = 0,
            Key::End => self.cursor.col = self.doc.line_len(c.row),
            Key::PageUp => {
                let row = c.row.saturating_sub(self.viewport_rows);
                self.cursor = self.doc.clamp(CursorPos::new(row, c.col));
            }
            Key::PageDown => {
                self.cursor = self.doc.clamp(CursorPos::new(c.row + self.viewport_rows, c.col));
            }
            _ => return PaneEffect::Ignored,
        }

        self.adjust_scroll();
        PaneEffect::Redraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::keymapper::Modifiers;

    fn press(pane: &mut EditorPane, key: Key) {
        pane.handle_key(&KeyEvent::plain(key));
    }

    fn type_str(pane: &mut EditorPane, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                press(pane, Key::Enter);
            } else {
                press(pane, Key::Char(ch));
            }
        }
    }

    fn pane_with(text: &str) -> EditorPane {
        let mut pane = EditorPane::new(4);
        pane.document_mut().set_text(text);
        pane
    }

    #[test]
    fn test_open_edit_save_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "hello\nworld\n").unwrap();

        let mut pane = EditorPane::new(4);
        pane.load(EditorDocument::open(&path).unwrap());
        assert!(!pane.document().is_dirty());
        assert_eq!(pane.document().lines(), &["hello", "world", ""]);

        press(&mut pane, Key::End);
        type_str(&mut pane, ", there");
        assert!(pane.document().is_dirty());
        assert!(pane.save().unwrap());
        assert!(!pane.document().is_dirty());

        let reopened = EditorDocument::open(&path).unwrap();
        assert_eq!(reopened.text(), "hello, there\nworld\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello, there\nworld\n");
    }

    #[test]
    fn test_save_without_path_is_noop() {
        let mut pane = pane_with("scratch");
        assert!(!pane.save().unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = EditorDocument::open(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, FileAccessError::Open { .. }));
    }

    #[test]
    fn test_undecodable_bytes_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mixed.txt");
        fs::write(&path, b"ab\xff\xfecd\xe2\x82").unwrap();
        let doc = EditorDocument::open(&path).unwrap();
        assert_eq!(doc.text(), "abcd");
    }

    #[test]
    fn test_enter_and_backspace_join_lines() {
        let mut pane = pane_with("abcd");
        pane.set_cursor(CursorPos::new(0, 2));
        press(&mut pane, Key::Enter);
        assert_eq!(pane.document().lines(), &["ab", "cd"]);
        assert_eq!(pane.cursor(), CursorPos::new(1, 0));

        press(&mut pane, Key::Backspace);
        assert_eq!(pane.document().lines(), &["abcd"]);
        assert_eq!(pane.cursor(), CursorPos::new(0, 2));

        press(&mut pane, Key::End);
        press(&mut pane, Key::Delete);
        assert_eq!(pane.document().text(), "abcd");
    }

    #[test]
    fn test_delete_joins_next_line() {
        let mut pane = pane_with("ab\ncd");
        pane.set_cursor(CursorPos::new(0, 2));
        press(&mut pane, Key::Delete);
        assert_eq!(pane.document().text(), "abcd");
    }

    #[test]
    fn test_vertical_motion_clamps_column() {
        let mut pane = pane_with("a long line\nab\nanother long one");
        pane.set_cursor(CursorPos::new(0, 8));
        press(&mut pane, Key::Down);
        assert_eq!(pane.cursor(), CursorPos::new(1, 2));
        press(&mut pane, Key::Down);
        assert_eq!(pane.cursor(), CursorPos::new(2, 2));
        press(&mut pane, Key::Down);
        assert_eq!(pane.cursor(), CursorPos::new(2, 2));

        pane.handle_key(&KeyEvent::new(Key::Home, Modifiers::CTRL));
        assert_eq!(pane.cursor(), CursorPos::new(0, 0));
        press(&mut pane, Key::Left);
        assert_eq!(pane.cursor(), CursorPos::new(0, 0));
    }

    #[test]
    fn test_multibyte_editing() {
        let mut pane = pane_with("héllo");
        pane.set_cursor(CursorPos::new(0, 2));
        press(&mut pane, Key::Backspace);
        type_str(&mut pane, "ë");
        assert_eq!(pane.document().text(), "hëllo");
    }

    #[test]
    fn test_tab_inserts_spaces() {
        let mut pane = pane_with("x");
        press(&mut pane, Key::Tab);
        assert_eq!(pane.document().text(), "    x");
        assert_eq!(pane.cursor(), CursorPos::new(0, 4));
    }

    #[test]
    fn test_set_cursor_clamps() {
        let mut pane = pane_with("one\ntwo");
        pane.set_cursor(CursorPos::new(10, 10));
        assert_eq!(pane.cursor(), CursorPos::new(1, 3));
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let text: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        let mut pane = pane_with(&text.join("\n"));
        pane.set_viewport(10);
        pane.set_cursor(CursorPos::new(25, 0));
        assert_eq!(pane.scroll_top(), 16);
        press(&mut pane, Key::PageUp);
        assert_eq!(pane.cursor().row, 15);
        assert_eq!(pane.scroll_top(), 15);
    }
}
