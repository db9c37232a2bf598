//! The three panes the focus coordinator switches between.
//!
//! - **directory**: expandable tree of the working directory
//! - **editor**: the open document and its cursor
//! - **terminal**: shell output log plus the line being typed
//!
//! Panes never reach into each other. A pane's key handler returns a
//! [`PaneEffect`] and the coordinator acts on it.

pub mod directory;
pub mod editor;
pub mod terminal;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use directory::DirectoryPane;
pub use editor::{CursorPos, EditorDocument, EditorPane};
pub use terminal::TerminalPane;

/// What a pane asks of the coordinator after handling a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneEffect {
    /// Key was not used
    Ignored,
    /// State changed; redraw
    Redraw,
    /// Load this file into the editor and start editing it
    OpenFile(PathBuf),
}

/// Listing, opening or saving failed
#[derive(Error, Debug)]
pub enum FileAccessError {
    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Byte offset of the `index`-th character, or the string length past the end
pub(crate) fn byte_index(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(i, _)| i).unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_index() {
        assert_eq!(byte_index("abc", 0), 0);
        assert_eq!(byte_index("abc", 2), 2);
        assert_eq!(byte_index("abc", 3), 3);
        assert_eq!(byte_index("abc", 10), 3);
        assert_eq!(byte_index("héllo", 2), 3);
    }
}
