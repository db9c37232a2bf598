//! Focus coordinator
//!
//! Owns the three panes and the focus state. Every key goes through
//! [`Coordinator::handle_key`]: global commands are recognised first and the
//! rest is routed to exactly one pane.
//!
//! ```text
//!            F1                F2                F3
//!   any ──────────▶ Browsing  ──────▶ Editing ◀────── Terminal
//!                      │  ▲   cursor restored  │  ▲
//!        open file ────┘  └──── cursor saved ──┘  └── (F3 from anywhere)
//! ```

use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::pty::ShellCommand;
use crate::core::session::{Shell, ShellSession};
use crate::panes::{CursorPos, DirectoryPane, EditorDocument, EditorPane, PaneEffect, TerminalPane};
use crate::ui::keymapper::{Command, KeyEvent, KeyMapper};
use crate::ui::layout::Layout;

/// Which pane receives keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Browsing,
    Editing,
    Terminal,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::Browsing => "BROWSE",
            Mode::Editing => "EDIT",
            Mode::Terminal => "TERMINAL",
        }
    }
}

/// Focus state. The non-editing states carry the editor cursor as it was
/// when editing was last left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FocusState {
    Browsing { saved_cursor: CursorPos },
    Editing,
    Terminal { saved_cursor: CursorPos },
}

impl FocusState {
    pub fn mode(&self) -> Mode {
        match self {
            FocusState::Browsing { .. } => Mode::Browsing,
            FocusState::Editing => Mode::Editing,
            FocusState::Terminal { .. } => Mode::Terminal,
        }
    }
}

/// Whether the main loop keeps going
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Coordinator {
    directory: DirectoryPane,
    editor: EditorPane,
    terminal: TerminalPane,
    focus: FocusState,
    message: Option<String>,
    shell_exit_noted: bool,
}

impl Coordinator {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            directory: DirectoryPane::new(root, config.directory.show_hidden),
            editor: EditorPane::new(config.editor.tab_width),
            terminal: TerminalPane::new(config.terminal.scrollback_lines),
            focus: FocusState::Browsing {
                saved_cursor: CursorPos::default(),
            },
            message: None,
            shell_exit_noted: false,
        }
    }

    /// Start the shell in the directory being browsed.
    ///
    /// A failure leaves the terminal pane without a shell; the rest of the
    /// application keeps working.
    pub fn start_shell(&mut self, shell: &ShellCommand, cols: u16, rows: u16) {
        let cwd = self.directory.root().to_path_buf();
        match ShellSession::start(shell, &cwd, cols, rows) {
            Ok(session) => {
                info!("shell started: {}", shell.program);
                self.attach_shell(Box::new(session), shell.display_name());
            }
            Err(e) => {
                error!("failed to start shell: {}", e);
                self.terminal.spawn_failed(&e);
                self.message = Some(format!("Shell unavailable: {}", e));
            }
        }
    }

    pub fn attach_shell(&mut self, shell: Box<dyn Shell>, title: &str) {
        self.terminal.attach(shell, title);
        self.shell_exit_noted = false;
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    pub fn mode(&self) -> Mode {
        self.focus.mode()
    }

    pub fn directory(&self) -> &DirectoryPane {
        &self.directory
    }

    pub fn editor(&self) -> &EditorPane {
        &self.editor
    }

    #[cfg(test)]
    pub fn editor_mut(&mut self) -> &mut EditorPane {
        &mut self.editor
    }

    pub fn terminal(&self) -> &TerminalPane {
        &self.terminal
    }

    /// Route one key press
    pub fn handle_key(&mut self, event: &KeyEvent) -> Flow {
        if let Some(command) = KeyMapper::command(event) {
            return self.run_command(command);
        }

        let effect = match self.focus {
            FocusState::Browsing { .. } => self.directory.handle_key(event),
            FocusState::Editing => self.editor.handle_key(event),
            FocusState::Terminal { .. } => self.terminal.handle_key(event),
        };

        if let PaneEffect::OpenFile(path) = effect {
            self.open_file(&path);
        }
        Flow::Continue
    }

    fn run_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Browse => self.switch_to(Mode::Browsing),
            Command::Edit => self.switch_to(Mode::Editing),
            Command::Terminal => self.switch_to(Mode::Terminal),
            Command::Save => self.save(),
            Command::Quit => {
                self.shutdown();
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    /// Move focus, saving the editor cursor when leaving the editor and
    /// restoring it (clamped) when coming back
    pub fn switch_to(&mut self, mode: Mode) {
        let saved_cursor = match self.focus {
            FocusState::Editing => self.editor.cursor(),
            FocusState::Browsing { saved_cursor } | FocusState::Terminal { saved_cursor } => {
                saved_cursor
            }
        };

        self.focus = match mode {
            Mode::Browsing => FocusState::Browsing { saved_cursor },
            Mode::Terminal => FocusState::Terminal { saved_cursor },
            Mode::Editing => {
                if self.focus != FocusState::Editing {
                    self.editor.set_cursor(saved_cursor);
                }
                FocusState::Editing
            }
        };
    }

    /// Load a file and start editing it at the top
    pub fn open_file(&mut self, path: &Path) {
        match EditorDocument::open(path) {
            Ok(doc) => {
                info!("opened {}", path.display());
                self.editor.load(doc);
                self.focus = FocusState::Editing;
                self.message = Some(format!("Opened {}", path.display()));
            }
            Err(e) => {
                warn!("{}", e);
                self.message = Some(e.to_string());
            }
        }
    }

    /// Save the document. Only acts while editing.
    pub fn save(&mut self) {
        if self.focus != FocusState::Editing {
            return;
        }
        match self.editor.save() {
            Ok(true) => {
                let path = self
                    .editor
                    .document()
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.message = Some(format!("Saved {}", path));
            }
            Ok(false) => self.message = Some("No file to save".to_string()),
            Err(e) => {
                error!("{}", e);
                self.message = Some(e.to_string());
            }
        }
    }

    /// Drain shell output; true when the terminal pane changed
    pub fn tick(&mut self) -> bool {
        let changed = self.terminal.poll_output();
        if !self.shell_exit_noted && self.terminal.has_shell() && !self.terminal.is_alive() {
            self.shell_exit_noted = true;
            self.message = Some("Shell exited".to_string());
            return true;
        }
        changed
    }

    /// Propagate pane sizes after a terminal resize
    pub fn resize(&mut self, layout: &Layout) {
        let dir = layout.directory.inner();
        let editor = layout.editor.inner();
        let term = layout.terminal.inner();
        self.directory.set_viewport(dir.height as usize);
        self.editor.set_viewport(editor.height as usize);
        self.terminal.resize(term.width.max(1), term.height.max(1));
    }

    /// Stop the shell and its reader
    pub fn shutdown(&mut self) {
        self.terminal.shutdown();
    }

    /// Status line text
    pub fn status(&self) -> String {
        let file = match self.editor.document().path() {
            Some(path) => {
                let dirty = if self.editor.document().is_dirty() { " [+]" } else { "" };
                format!("{}{}", path.display(), dirty)
            }
            None => "[scratch]".to_string(),
        };
        let mut status = format!(" {} | {}", self.mode().label(), file);
        if let Some(message) = &self.message {
            status.push_str(" | ");
            status.push_str(message);
        }
        status.push_str(" | F1 Browse  F2 Edit  F3 Terminal  ^S Save  ^Q Quit");
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panes::terminal::tests::fake_shell;
    use crate::panes::terminal::PROCESS_TERMINATED;
    use crate::ui::keymapper::{Key, Modifiers};
    use std::fs;

    fn coordinator(root: &Path) -> Coordinator {
        Coordinator::new(root, &Config::default())
    }

    fn key(k: Key) -> KeyEvent {
        KeyEvent::plain(k)
    }

    fn type_str(c: &mut Coordinator, text: &str) {
        for ch in text.chars() {
            c.handle_key(&key(Key::Char(ch)));
        }
    }

    #[test]
    fn test_starts_browsing() {
        let dir = tempfile::tempdir().unwrap();
        let c = coordinator(dir.path());
        assert_eq!(c.mode(), Mode::Browsing);
    }

    #[test]
    fn test_transitions_are_total() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        let modes = [Mode::Browsing, Mode::Editing, Mode::Terminal];
        for from in modes {
            for to in modes {
                c.switch_to(from);
                assert_eq!(c.mode(), from);
                c.switch_to(to);
                assert_eq!(c.mode(), to);
            }
        }
    }

    #[test]
    fn test_mode_keys_never_reach_panes() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        c.switch_to(Mode::Editing);
        c.handle_key(&KeyEvent::ctrl('3'));
        assert_eq!(c.mode(), Mode::Terminal);
        c.handle_key(&key(Key::F(2)));
        assert_eq!(c.mode(), Mode::Editing);
        assert_eq!(c.editor().document().text(), "");
        c.handle_key(&key(Key::F(1)));
        assert_eq!(c.mode(), Mode::Browsing);
    }

    #[test]
    fn test_editor_cursor_saved_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        c.switch_to(Mode::Editing);
        type_str(&mut c, "first line");
        c.handle_key(&key(Key::Enter));
        type_str(&mut c, "second");
        let before = c.editor().cursor();
        assert_eq!(before, CursorPos::new(1, 6));

        c.handle_key(&key(Key::F(3)));
        assert_eq!(
            c.focus(),
            FocusState::Terminal {
                saved_cursor: before
            }
        );
        c.handle_key(&key(Key::F(1)));
        assert_eq!(
            c.focus(),
            FocusState::Browsing {
                saved_cursor: before
            }
        );
        c.handle_key(&key(Key::F(2)));
        assert_eq!(c.editor().cursor(), before);
    }

    #[test]
    fn test_restored_cursor_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        c.switch_to(Mode::Editing);
        type_str(&mut c, "abc");
        c.handle_key(&key(Key::Enter));
        type_str(&mut c, "defgh");
        c.switch_to(Mode::Browsing);

        c.editor_mut().document_mut().set_text("xy");
        c.switch_to(Mode::Editing);
        assert_eq!(c.editor().cursor(), CursorPos::new(0, 2));
    }

    #[test]
    fn test_open_edit_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "one\n").unwrap();

        let mut c = coordinator(dir.path());
        c.switch_to(Mode::Editing);
        c.handle_key(&key(Key::Down));
        c.switch_to(Mode::Browsing);

        c.handle_key(&key(Key::Enter));
        assert_eq!(c.mode(), Mode::Editing);
        assert_eq!(c.editor().cursor(), CursorPos::new(0, 0));

        c.handle_key(&KeyEvent::new(Key::End, Modifiers::empty()));
        type_str(&mut c, " two");
        assert!(c.status().contains("[+]"));
        c.handle_key(&KeyEvent::ctrl('s'));
        assert!(!c.editor().document().is_dirty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "one two\n");
        assert!(c.status().contains("Saved"));
    }

    #[test]
    fn test_save_outside_editing_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "keep").unwrap();

        let mut c = coordinator(dir.path());
        c.open_file(&path);
        type_str(&mut c, "X");
        c.switch_to(Mode::Terminal);
        c.handle_key(&KeyEvent::ctrl('s'));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
        assert!(c.editor().document().is_dirty());
    }

    #[test]
    fn test_open_failure_keeps_browsing() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        c.open_file(&dir.path().join("missing.txt"));
        assert_eq!(c.mode(), Mode::Browsing);
        assert!(c.status().contains("cannot open"));
    }

    #[test]
    fn test_terminal_keys_reach_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        let (shell, state) = fake_shell();
        c.attach_shell(shell, "fake");

        c.handle_key(&key(Key::F(3)));
        type_str(&mut c, "ls");
        c.handle_key(&key(Key::Enter));
        assert_eq!(state.borrow().written, b"ls\n");

        state.borrow_mut().pending.push(b"a.txt\r\n".to_vec());
        assert!(c.tick());
        assert!(!c.tick());
        assert_eq!(c.terminal().buffer().lines().last(), Some("a.txt"));
    }

    #[test]
    fn test_shell_exit_shows_in_status() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        let (shell, state) = fake_shell();
        c.attach_shell(shell, "fake");
        assert!(!c.tick());

        state.borrow_mut().dead = true;
        assert!(c.tick());
        assert!(c.status().contains("Shell exited"));
        assert!(!c.tick());
    }

    #[test]
    fn test_quit_shuts_down_shell() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        let (shell, _state) = fake_shell();
        c.attach_shell(shell, "fake");
        assert!(c.terminal().has_shell());

        assert_eq!(c.handle_key(&KeyEvent::ctrl('q')), Flow::Quit);
        assert!(!c.terminal().has_shell());

        c.switch_to(Mode::Terminal);
        type_str(&mut c, "pwd");
        c.handle_key(&key(Key::Enter));
        assert_eq!(c.terminal().buffer().lines().last(), Some(PROCESS_TERMINATED));
    }

    #[test]
    fn test_start_shell_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        let missing = ShellCommand::new("/nonexistent/lazyedit-shell", Vec::new());
        c.start_shell(&missing, 80, 24);
        assert!(!c.terminal().has_shell());
        assert!(c.status().contains("Shell unavailable"));
        assert!(c
            .terminal()
            .buffer()
            .lines()
            .any(|l| l.starts_with("[Failed to start shell:")));
    }

    #[test]
    fn test_resize_sets_viewports() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = coordinator(dir.path());
        c.resize(&Layout::compute(120, 41));
        c.switch_to(Mode::Editing);
        for _ in 0..40 {
            c.handle_key(&key(Key::Enter));
        }
        // editor inner height is 26
        assert_eq!(c.editor().scroll_top(), 40 + 1 - 26);
    }
}
