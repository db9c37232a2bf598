//! Screen renderer.
//!
//! Draws the coordinator's three panes, their borders and the status line.
//! Every frame rewrites each pane row in full, padded to the pane width, so
//! no diffing is needed.
//!
//! ```text
//! begin_frame()  → start sync, disable autowrap, hide cursor
//!     ↓
//! panes          → borders, directory, editor, terminal, status
//!     ↓
//! end_frame()    → place cursor for the active pane, end sync, flush
//! ```

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use unicode_width::UnicodeWidthChar;

use super::layout::{Layout, Rect};
use crate::focus::{Coordinator, Mode};

/// Tab stop used for shell output
const TERMINAL_TAB_WIDTH: usize = 8;

const ACTIVE_BORDER: Color = Color::Cyan;
const INACTIVE_BORDER: Color = Color::DarkGrey;

fn begin_frame<W: Write>(out: &mut W) -> io::Result<()> {
    write!(out, "\x1b[?2026h")?; // Begin synchronized update
    write!(out, "\x1b[?7l")?; // Disable autowrap
    queue!(out, Hide)?;
    Ok(())
}

fn end_frame<W: Write>(out: &mut W, cursor: Option<(u16, u16)>) -> io::Result<()> {
    if let Some((x, y)) = cursor {
        queue!(out, MoveTo(x, y), Show)?;
    }
    write!(out, "\x1b[?7h")?; // Enable autowrap
    write!(out, "\x1b[?2026l")?; // End synchronized update
    out.flush()
}

/// Border characters
struct BorderChars {
    top_left: char,
    top_right: char,
    bottom_left: char,
    bottom_right: char,
    horizontal: char,
    vertical: char,
}

impl BorderChars {
    fn single() -> Self {
        Self {
            top_left: '┌',
            top_right: '┐',
            bottom_left: '└',
            bottom_right: '┘',
            horizontal: '─',
            vertical: '│',
        }
    }
}

/// Display width of `text` with tabs expanded to `tab_width` stops
pub fn display_width(text: &str, tab_width: usize) -> usize {
    text.chars().fold(0, |col, ch| col + char_width(ch, col, tab_width))
}

fn char_width(ch: char, col: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        let tab = tab_width.max(1);
        tab - col % tab
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(0)
    }
}

/// Lay `text` out in exactly `width` columns: tabs expanded, control
/// characters dropped, truncated or padded with spaces
pub fn fit_width(text: &str, width: usize, tab_width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut col = 0;
    for ch in text.chars() {
        let w = char_width(ch, col, tab_width);
        if col + w > width {
            break;
        }
        if ch == '\t' {
            out.extend(std::iter::repeat(' ').take(w));
        } else if w > 0 {
            out.push(ch);
        } else if !ch.is_control() {
            // zero-width combining mark
            out.push(ch);
        }
        col += w;
    }
    out.extend(std::iter::repeat(' ').take(width - col));
    out
}

/// Full-screen renderer
pub struct Renderer {
    initialized: bool,
    /// Clear the whole screen before the next frame
    needs_clear: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            needs_clear: true,
        }
    }

    /// Enter raw mode and the alternate screen
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        // From here on cleanup has something to undo
        self.initialized = true;

        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen, Clear(ClearType::All))?;
        stdout.flush()?;
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }

        let mut stdout = io::stdout();

        // Restore terminal state (in case of abnormal exit)
        write!(stdout, "\x1b[?7h")?;
        write!(stdout, "\x1b[?2026l")?;
        stdout.flush()?;

        execute!(stdout, Show, ResetColor, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        self.initialized = false;
        Ok(())
    }

    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }

    /// Force a full clear on the next frame (after a resize)
    pub fn invalidate(&mut self) {
        self.needs_clear = true;
    }

    pub fn render(&mut self, coordinator: &Coordinator, layout: &Layout) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = io::BufWriter::with_capacity(65536, stdout.lock());

        begin_frame(&mut out)?;
        if self.needs_clear {
            queue!(out, Clear(ClearType::All))?;
            self.needs_clear = false;
        }
        let result = self.draw(&mut out, coordinator, layout);
        let cursor = result.as_ref().ok().copied().flatten();
        end_frame(&mut out, cursor)?;
        result.map(|_| ())
    }

    /// Draw everything; returns where the cursor belongs
    fn draw<W: Write>(
        &self,
        out: &mut W,
        coordinator: &Coordinator,
        layout: &Layout,
    ) -> io::Result<Option<(u16, u16)>> {
        let mode = coordinator.mode();

        let dir_title = format!(" {} ", coordinator.directory().root().display());
        self.render_border(out, layout.directory, &dir_title, mode == Mode::Browsing)?;
        self.render_directory(out, coordinator, layout.directory.inner())?;

        let doc = coordinator.editor().document();
        let editor_title = match doc.path() {
            Some(path) if doc.is_dirty() => format!(" {} [+] ", path.display()),
            Some(path) => format!(" {} ", path.display()),
            None => " [scratch] ".to_string(),
        };
        self.render_border(out, layout.editor, &editor_title, mode == Mode::Editing)?;
        let editor_cursor = self.render_editor(out, coordinator, layout.editor.inner())?;

        let term_title = format!(" {} ", coordinator.terminal().title());
        self.render_border(out, layout.terminal, &term_title, mode == Mode::Terminal)?;
        let term_cursor = self.render_terminal(out, coordinator, layout.terminal.inner())?;

        self.render_status_bar(out, coordinator, layout.status)?;

        Ok(match mode {
            Mode::Browsing => None,
            Mode::Editing => editor_cursor,
            Mode::Terminal => term_cursor,
        })
    }

    fn render_border<W: Write>(&self, out: &mut W, rect: Rect, title: &str, active: bool) -> io::Result<()> {
        if rect.width < 2 || rect.height < 2 {
            return Ok(());
        }
        let chars = BorderChars::single();
        let color = if active { ACTIVE_BORDER } else { INACTIVE_BORDER };
        queue!(out, SetForegroundColor(color))?;

        // Top border with the title centred
        let title_space = (rect.width as usize).saturating_sub(4);
        let title: String = fit_width(title, title_space.min(display_width(title, 1)), 1);
        let remaining = (rect.width as usize).saturating_sub(2 + display_width(&title, 1));
        let left_pad = remaining / 2;
        let right_pad = remaining - left_pad;

        queue!(out, MoveTo(rect.x, rect.y))?;
        write!(out, "{}", chars.top_left)?;
        for _ in 0..left_pad {
            write!(out, "{}", chars.horizontal)?;
        }
        if active {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        write!(out, "{}", title)?;
        if active {
            queue!(out, SetAttribute(Attribute::NormalIntensity))?;
        }
        for _ in 0..right_pad {
            write!(out, "{}", chars.horizontal)?;
        }
        write!(out, "{}", chars.top_right)?;

        // Side borders
        for row in 1..rect.height - 1 {
            queue!(out, MoveTo(rect.x, rect.y + row))?;
            write!(out, "{}", chars.vertical)?;
            queue!(out, MoveTo(rect.x + rect.width - 1, rect.y + row))?;
            write!(out, "{}", chars.vertical)?;
        }

        // Bottom border
        queue!(out, MoveTo(rect.x, rect.y + rect.height - 1))?;
        write!(out, "{}", chars.bottom_left)?;
        for _ in 0..rect.width - 2 {
            write!(out, "{}", chars.horizontal)?;
        }
        write!(out, "{}", chars.bottom_right)?;

        queue!(out, ResetColor)?;
        Ok(())
    }

    fn render_directory<W: Write>(&self, out: &mut W, coordinator: &Coordinator, area: Rect) -> io::Result<()> {
        let dir = coordinator.directory();
        let width = area.width as usize;
        let mut rows = dir.entries().iter().enumerate().skip(dir.scroll_offset());

        for row in 0..area.height {
            queue!(out, MoveTo(area.x, area.y + row))?;
            let Some((index, entry)) = rows.next() else {
                write!(out, "{}", " ".repeat(width))?;
                continue;
            };

            let icon = match (entry.is_dir, dir.is_expanded(&entry.path)) {
                (true, true) => "▼ ",
                (true, false) => "▶ ",
                (false, _) => "  ",
            };
            let label = format!("{}{}{}", "  ".repeat(entry.depth), icon, entry.name);
            let selected = index == dir.selected();
            if selected {
                queue!(out, SetAttribute(Attribute::Reverse))?;
            } else if entry.is_dir {
                queue!(out, SetForegroundColor(Color::Blue))?;
            }
            write!(out, "{}", fit_width(&label, width, 1))?;
            queue!(out, SetAttribute(Attribute::Reset), ResetColor)?;
        }
        Ok(())
    }

    fn render_editor<W: Write>(
        &self,
        out: &mut W,
        coordinator: &Coordinator,
        area: Rect,
    ) -> io::Result<Option<(u16, u16)>> {
        let editor = coordinator.editor();
        let tab = editor.tab_width();
        let width = area.width as usize;
        let lines = editor.document().lines();
        let top = editor.scroll_top();

        for row in 0..area.height {
            queue!(out, MoveTo(area.x, area.y + row))?;
            let line = lines.get(top + row as usize).map(String::as_str).unwrap_or("");
            write!(out, "{}", fit_width(line, width, tab))?;
        }

        let cursor = editor.cursor();
        let Some(screen_row) = cursor.row.checked_sub(top) else {
            return Ok(None);
        };
        if screen_row >= area.height as usize || width == 0 {
            return Ok(None);
        }
        let line = &lines[cursor.row];
        let prefix: String = line.chars().take(cursor.col).collect();
        let col = display_width(&prefix, tab).min(width - 1);
        Ok(Some((area.x + col as u16, area.y + screen_row as u16)))
    }

    fn render_terminal<W: Write>(
        &self,
        out: &mut W,
        coordinator: &Coordinator,
        area: Rect,
    ) -> io::Result<Option<(u16, u16)>> {
        let width = area.width as usize;
        let height = area.height as usize;
        let text = coordinator.terminal().render();
        let lines: Vec<&str> = text.split('\n').collect();
        let visible = &lines[lines.len().saturating_sub(height)..];

        for row in 0..area.height {
            queue!(out, MoveTo(area.x, area.y + row))?;
            let line = visible.get(row as usize).copied().unwrap_or("");
            write!(out, "{}", fit_width(line, width, TERMINAL_TAB_WIDTH))?;
        }

        if visible.is_empty() || width == 0 {
            return Ok(None);
        }
        // The pending input line is always last
        let buffer = coordinator.terminal().buffer();
        let typed: String = buffer.input().chars().take(buffer.cursor()).collect();
        let before = format!("{}{}", buffer.partial(), typed);
        let col = display_width(&before, TERMINAL_TAB_WIDTH).min(width - 1);
        let row = visible.len() - 1;
        Ok(Some((area.x + col as u16, area.y + row as u16)))
    }

    fn render_status_bar<W: Write>(&self, out: &mut W, coordinator: &Coordinator, area: Rect) -> io::Result<()> {
        if area.height == 0 {
            return Ok(());
        }
        queue!(out, MoveTo(area.x, area.y), SetAttribute(Attribute::Reverse))?;
        write!(out, "{}", fit_width(&coordinator.status(), area.width as usize, 1))?;
        queue!(out, SetAttribute(Attribute::Reset))?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
