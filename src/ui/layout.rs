//! Screen layout
//!
//! Fixed arrangement: directory tree on the left, editor top right,
//! terminal bottom right and a one-row status line at the bottom.
//!
//! ```text
//! ┌─ dir ─┐┌─ editor ─────────────┐
//! │       ││                      │
//! │       │└──────────────────────┘
//! │       │┌─ terminal ───────────┐
//! │       ││                      │
//! └───────┘└──────────────────────┘
//!  status
//! ```

/// A screen rectangle in cells
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// The area inside a one-cell border
    pub fn inner(&self) -> Rect {
        Rect::new(
            self.x + 1,
            self.y + 1,
            self.width.saturating_sub(2),
            self.height.saturating_sub(2),
        )
    }
}

/// Narrowest the directory column gets when there is room for it
const MIN_DIRECTORY_WIDTH: u16 = 16;
/// Shortest the terminal pane gets when there is room for it
const MIN_TERMINAL_HEIGHT: u16 = 5;

/// Rectangles for each pane
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub cols: u16,
    pub rows: u16,
    pub directory: Rect,
    pub editor: Rect,
    pub terminal: Rect,
    pub status: Rect,
}

impl Layout {
    pub fn compute(cols: u16, rows: u16) -> Self {
        let body_rows = rows.saturating_sub(1);

        // Directory: a quarter of the width
        let dir_width = (cols / 4).max(MIN_DIRECTORY_WIDTH).min(cols / 2);
        let right_width = cols - dir_width;

        // Terminal: 30% of the height below the editor
        let term_height = (body_rows * 3 / 10).max(MIN_TERMINAL_HEIGHT).min(body_rows / 2);
        let editor_height = body_rows - term_height;

        Self {
            cols,
            rows,
            directory: Rect::new(0, 0, dir_width, body_rows),
            editor: Rect::new(dir_width, 0, right_width, editor_height),
            terminal: Rect::new(dir_width, editor_height, right_width, term_height),
            status: Rect::new(0, body_rows, cols, rows.min(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_standard_size() {
        let layout = Layout::compute(120, 41);
        assert_eq!(layout.directory, Rect::new(0, 0, 30, 40));
        assert_eq!(layout.editor, Rect::new(30, 0, 90, 28));
        assert_eq!(layout.terminal, Rect::new(30, 28, 90, 12));
        assert_eq!(layout.status, Rect::new(0, 40, 120, 1));
    }

    #[test]
    fn test_panes_tile_the_body() {
        for (cols, rows) in [(80, 24), (20, 6), (200, 60), (1, 1)] {
            let l = Layout::compute(cols, rows);
            assert_eq!(l.directory.width + l.editor.width, cols);
            assert_eq!(l.editor.width, l.terminal.width);
            assert_eq!(l.editor.height + l.terminal.height, l.directory.height);
            assert_eq!(l.terminal.y + l.terminal.height, l.status.y);
        }
    }

    #[test]
    fn test_tiny_terminal_does_not_underflow() {
        let layout = Layout::compute(0, 0);
        assert_eq!(layout.status.height, 0);
        assert_eq!(layout.editor.inner().width, 0);
        assert_eq!(layout.terminal.inner().height, 0);
    }
}
