//! Directory pane
//!
//! A flattened, depth-first view of the working directory tree. Expanded
//! directories list their children immediately below themselves, nested
//! expansions included.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{FileAccessError, PaneEffect};
use crate::ui::keymapper::{Key, KeyEvent};

/// One row of the flattened listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    /// Nesting level below the root
    pub depth: usize,
    pub is_dir: bool,
}

/// List a directory sorted by name
fn list_dir(dir: &Path, depth: usize, show_hidden: bool) -> Result<Vec<DirEntry>, FileAccessError> {
    let read = fs::read_dir(dir).map_err(|source| FileAccessError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries: Vec<DirEntry> = read
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let path = entry.path();
            DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: path.is_dir(),
                depth,
                path,
            }
        })
        .filter(|entry| show_hidden || !entry.name.starts_with('.'))
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Directory tree pane
pub struct DirectoryPane {
    root: PathBuf,
    expanded: HashSet<PathBuf>,
    entries: Vec<DirEntry>,
    selected: usize,
    scroll_offset: usize,
    viewport_rows: usize,
    show_hidden: bool,
}

impl DirectoryPane {
    pub fn new(root: impl Into<PathBuf>, show_hidden: bool) -> Self {
        let mut pane = Self {
            root: root.into(),
            expanded: HashSet::new(),
            entries: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            viewport_rows: 1,
            show_hidden,
        };
        pane.refresh();
        pane
    }

    /// Re-read the tree from disk, keeping the expanded set
    pub fn refresh(&mut self) {
        let mut entries = Vec::new();
        self.flatten_into(&self.root, 0, &mut entries);
        self.entries = entries;
        self.clamp_selection();
    }

    fn flatten_into(&self, dir: &Path, depth: usize, out: &mut Vec<DirEntry>) {
        let children = match list_dir(dir, depth, self.show_hidden) {
            Ok(children) => children,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        for child in children {
            let descend = child.is_dir && self.expanded.contains(&child.path);
            let path = child.path.clone();
            out.push(child);
            if descend {
                self.flatten_into(&path, depth + 1, out);
            }
        }
    }

    /// Expand or collapse a directory
    pub fn toggle(&mut self, path: &Path) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_path_buf());
        }
        self.refresh();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expanded.contains(path)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_entry(&self) -> Option<&DirEntry> {
        self.entries.get(self.selected)
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
        self.clamp_selection();
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn set_viewport(&mut self, rows: usize) {
        self.viewport_rows = rows.max(1);
        self.adjust_scroll();
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
        self.adjust_scroll();
    }

    fn adjust_scroll(&mut self) {
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + self.viewport_rows {
            self.scroll_offset = self.selected + 1 - self.viewport_rows;
        }
    }

    /// Toggle the selected directory, or ask for the selected file to be opened
    fn activate(&mut self) -> PaneEffect {
        let Some(entry) = self.selected_entry() else {
            return PaneEffect::Ignored;
        };
        if entry.is_dir {
            let path = entry.path.clone();
            self.toggle(&path);
            PaneEffect::Redraw
        } else {
            PaneEffect::OpenFile(entry.path.clone())
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> PaneEffect {
        if event.has_ctrl() {
            return PaneEffect::Ignored;
        }
        match event.key {
            Key::Up => self.select(self.selected.saturating_sub(1)),
            Key::Down => self.select(self.selected + 1),
            Key::Home => self.select(0),
            Key::End => self.select(usize::MAX),
            Key::PageUp => self.select(self.selected.saturating_sub(self.viewport_rows)),
            Key::PageDown => self.select(self.selected + self.viewport_rows),
            Key::Enter | Key::Char(' ') => return self.activate(),
            Key::Char('r') | Key::F(5) => self.refresh(),
            _ => return PaneEffect::Ignored,
        }
        PaneEffect::Redraw
    }
}
