//! Terminal pane
//!
//! A line-oriented view of the shell: completed output lines, the partial
//! line the shell is still writing (usually the prompt), and the command
//! line being typed. The typed line is edited locally and only sent to the
//! shell on Enter.

use std::collections::VecDeque;

use tracing::{info, warn};

use super::{byte_index, PaneEffect};
use crate::core::filter::{OutputFilter, TextSink};
use crate::core::pty::SpawnError;
use crate::core::session::Shell;
use crate::ui::keymapper::{Key, KeyEvent};

/// Default number of completed lines kept
pub const DEFAULT_SCROLLBACK: usize = 500;

/// Appended when input cannot be delivered to the shell
pub const PROCESS_TERMINATED: &str = "[Process terminated]";

/// Output log plus the pending input line
pub struct TerminalBuffer {
    /// Completed lines, oldest first
    lines: VecDeque<String>,
    /// Output received after the last newline
    partial: String,
    /// Line being typed
    input: String,
    /// Cursor in characters, 0..=input length
    cursor: usize,
    max_lines: usize,
}

impl Default for TerminalBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLLBACK)
    }
}

impl TerminalBuffer {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            partial: String::new(),
            input: String::new(),
            cursor: 0,
            max_lines,
        }
    }

    /// Append a completed line, evicting the oldest past the cap
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    pub fn insert_char(&mut self, ch: char) {
        let at = byte_index(&self.input, self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    /// Remove the character before the cursor
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let at = byte_index(&self.input, self.cursor);
        self.input.remove(at);
        true
    }

    /// Remove the character under the cursor
    pub fn delete(&mut self) -> bool {
        if self.cursor >= self.input_len() {
            return false;
        }
        let at = byte_index(&self.input, self.cursor);
        self.input.remove(at);
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input_len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.input_len();
    }

    /// Move the prompt and typed line into the log; returns the typed command
    pub fn submit(&mut self) -> String {
        let command = std::mem::take(&mut self.input);
        let prompt = std::mem::take(&mut self.partial);
        self.cursor = 0;
        self.push_line(format!("{}{}", prompt, command));
        command
    }

    /// Retained lines, then the partial output line followed by the input
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&self.partial);
        out.push_str(&self.input);
        out
    }
}

impl TextSink for TerminalBuffer {
    fn put_char(&mut self, ch: char) {
        self.partial.push(ch);
    }

    fn newline(&mut self) {
        let line = std::mem::take(&mut self.partial);
        self.push_line(line);
    }

    fn carriage_return(&mut self) {
        self.partial.clear();
    }

    fn backspace(&mut self) {
        self.partial.pop();
    }
}

/// The terminal pane: buffer plus the shell feeding it
pub struct TerminalPane {
    buffer: TerminalBuffer,
    filter: OutputFilter,
    shell: Option<Box<dyn Shell>>,
    title: String,
    exit_reported: bool,
}

impl TerminalPane {
    pub fn new(scrollback: usize) -> Self {
        Self {
            buffer: TerminalBuffer::new(scrollback),
            filter: OutputFilter::new(),
            shell: None,
            title: "Terminal".to_string(),
            exit_reported: false,
        }
    }

    /// Attach a running shell
    pub fn attach(&mut self, shell: Box<dyn Shell>, title: impl Into<String>) {
        self.shell = Some(shell);
        self.title = title.into();
        self.exit_reported = false;
    }

    /// Record that no shell could be started; the pane stays usable
    pub fn spawn_failed(&mut self, err: &SpawnError) {
        self.shell = None;
        self.buffer.push_line(format!("[Failed to start shell: {}]", err));
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn buffer(&self) -> &TerminalBuffer {
        &self.buffer
    }

    pub fn has_shell(&self) -> bool {
        self.shell.is_some()
    }

    pub fn is_alive(&mut self) -> bool {
        self.shell.as_mut().map(|s| s.is_alive()).unwrap_or(false)
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> PaneEffect {
        if let Some(ch) = event.printable() {
            self.buffer.insert_char(ch);
            return PaneEffect::Redraw;
        }

        if event.has_ctrl() {
            return match event.key {
                Key::Char('c') | Key::Char('C') => {
                    if let Some(shell) = self.shell.as_mut() {
                        shell.interrupt();
                    }
                    PaneEffect::Redraw
                }
                _ => PaneEffect::Ignored,
            };
        }

        match event.key {
            Key::Enter => {
                self.submit();
                PaneEffect::Redraw
            }
            Key::Backspace => {
                self.buffer.backspace();
                PaneEffect::Redraw
            }
            Key::Delete => {
                self.buffer.delete();
                PaneEffect::Redraw
            }
            Key::Left => {
                self.buffer.move_left();
                PaneEffect::Redraw
            }
            Key::Right => {
                self.buffer.move_right();
                PaneEffect::Redraw
            }
            Key::Home => {
                self.buffer.home();
                PaneEffect::Redraw
            }
            Key::End => {
                self.buffer.end();
                PaneEffect::Redraw
            }
            _ => PaneEffect::Ignored,
        }
    }

    fn submit(&mut self) {
        let command = self.buffer.submit();
        let delivered = match self.shell.as_mut() {
            Some(shell) => match shell.write(format!("{}\n", command).as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    warn!("command not delivered: {}", e);
                    false
                }
            },
            None => false,
        };
        if !delivered {
            self.buffer.push_line(PROCESS_TERMINATED);
        }
    }

    /// Merge output chunks into the log in the order given
    pub fn on_output_available<I, T>(&mut self, chunks: I)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for chunk in chunks {
            self.filter.feed(chunk.as_ref(), &mut self.buffer);
        }
    }

    /// Drain the shell's queue; true when anything arrived
    pub fn poll_output(&mut self) -> bool {
        let Some(shell) = self.shell.as_mut() else {
            return false;
        };
        let chunks = shell.drain();
        let alive = shell.is_alive();
        let changed = !chunks.is_empty();
        self.on_output_available(chunks);

        if !alive && !self.exit_reported {
            self.exit_reported = true;
            info!("shell exited");
        }
        changed
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if let Some(shell) = self.shell.as_mut() {
            shell.resize(cols, rows);
        }
    }

    /// Drop the shell, which kills it and joins its reader
    pub fn shutdown(&mut self) {
        if self.shell.take().is_some() {
            info!("terminal pane shut down");
        }
    }

    pub fn render(&self) -> String {
        self.buffer.render()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::pty::WriteError;
    use crate::core::queue::Chunk;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared view of what a fake shell saw
    #[derive(Default)]
    pub(crate) struct FakeState {
        pub written: Vec<u8>,
        pub pending: Vec<Chunk>,
        pub interrupts: usize,
        pub dead: bool,
    }

    /// Shell double driven by the test through `FakeState`
    pub(crate) struct FakeShell(pub Rc<RefCell<FakeState>>);

    impl Shell for FakeShell {
        fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
            let mut state = self.0.borrow_mut();
            if state.dead {
                return Err(WriteError::Exited);
            }
            state.written.extend_from_slice(data);
            Ok(())
        }

        fn interrupt(&mut self) {
            self.0.borrow_mut().interrupts += 1;
        }

        fn drain(&mut self) -> Vec<Chunk> {
            std::mem::take(&mut self.0.borrow_mut().pending)
        }

        fn is_alive(&mut self) -> bool {
            !self.0.borrow().dead
        }
    }

    pub(crate) fn fake_shell() -> (Box<dyn Shell>, Rc<RefCell<FakeState>>) {
        let state = Rc::new(RefCell::new(FakeState::default()));
        (Box::new(FakeShell(state.clone())), state)
    }

    fn type_str(pane: &mut TerminalPane, text: &str) {
        for ch in text.chars() {
            pane.handle_key(&KeyEvent::plain(Key::Char(ch)));
        }
    }

    #[test]
    fn test_retention_cap_scenario() {
        let mut buffer = TerminalBuffer::new(3);
        for line in ["1", "2", "3", "4"] {
            buffer.push_line(line);
        }
        assert_eq!(buffer.lines().collect::<Vec<_>>(), vec!["2", "3", "4"]);
    }

    #[test]
    fn test_retention_keeps_most_recent() {
        let mut pane = TerminalPane::new(10);
        let output: String = (0..25).map(|i| format!("line{}\n", i)).collect();
        pane.on_output_available([output.as_bytes()]);

        let lines: Vec<_> = pane.buffer().lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines.first(), Some(&"line15"));
        assert_eq!(lines.last(), Some(&"line24"));
    }

    #[test]
    fn test_output_order_preserved() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        pane.on_output_available(["a\n", "b\n"]);
        pane.on_output_available(["c\n"]);
        assert!(pane.render().ends_with("a\nb\nc\n"));
    }

    #[test]
    fn test_echo_hi_in_sub_chunks() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        let (shell, state) = fake_shell();
        pane.attach(shell, "sh");

        type_str(&mut pane, "echo hi");
        pane.handle_key(&KeyEvent::plain(Key::Enter));
        assert_eq!(state.borrow().written, b"echo hi\n");

        state.borrow_mut().pending = vec![b"h".to_vec(), b"i".to_vec(), b"\r".to_vec(), b"\n".to_vec()];
        assert!(pane.poll_output());

        let lines: Vec<_> = pane.buffer().lines().collect();
        assert_eq!(lines, vec!["echo hi", "hi"]);
        assert!(!pane.poll_output());
    }

    #[test]
    fn test_enter_prefixes_prompt() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        let (shell, _state) = fake_shell();
        pane.attach(shell, "sh");
        pane.on_output_available(["$ "]);
        type_str(&mut pane, "ls");
        assert_eq!(pane.render(), "$ ls");

        pane.handle_key(&KeyEvent::plain(Key::Enter));
        assert_eq!(pane.buffer().lines().collect::<Vec<_>>(), vec!["$ ls"]);
        assert_eq!(pane.buffer().input(), "");
        assert_eq!(pane.buffer().cursor(), 0);
    }

    #[test]
    fn test_line_editing() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        type_str(&mut pane, "helo");
        pane.handle_key(&KeyEvent::plain(Key::Left));
        type_str(&mut pane, "l");
        assert_eq!(pane.buffer().input(), "hello");
        assert_eq!(pane.buffer().cursor(), 4);

        pane.handle_key(&KeyEvent::plain(Key::Home));
        pane.handle_key(&KeyEvent::plain(Key::Delete));
        assert_eq!(pane.buffer().input(), "ello");

        pane.handle_key(&KeyEvent::plain(Key::End));
        pane.handle_key(&KeyEvent::plain(Key::Backspace));
        assert_eq!(pane.buffer().input(), "ell");
        assert_eq!(pane.buffer().cursor(), 3);

        pane.handle_key(&KeyEvent::plain(Key::Home));
        assert!(!pane.buffer.backspace());
        pane.handle_key(&KeyEvent::plain(Key::End));
        assert!(!pane.buffer.delete());
    }

    #[test]
    fn test_dead_shell_reports_terminated() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        let (shell, state) = fake_shell();
        pane.attach(shell, "sh");
        state.borrow_mut().dead = true;

        type_str(&mut pane, "ls");
        assert_eq!(pane.handle_key(&KeyEvent::plain(Key::Enter)), PaneEffect::Redraw);
        assert_eq!(
            pane.buffer().lines().collect::<Vec<_>>(),
            vec!["ls", PROCESS_TERMINATED]
        );
    }

    #[test]
    fn test_no_shell_reports_terminated() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        pane.spawn_failed(&SpawnError::ShellNotFound("zsh".to_string()));
        type_str(&mut pane, "pwd");
        pane.handle_key(&KeyEvent::plain(Key::Enter));

        let lines: Vec<_> = pane.buffer().lines().collect();
        assert_eq!(lines[0], "[Failed to start shell: shell not found: zsh]");
        assert_eq!(lines[2], PROCESS_TERMINATED);
    }

    #[test]
    fn test_ctrl_c_interrupts() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        let (shell, state) = fake_shell();
        pane.attach(shell, "sh");
        type_str(&mut pane, "sleep");
        pane.handle_key(&KeyEvent::ctrl('c'));
        assert_eq!(state.borrow().interrupts, 1);
        assert_eq!(pane.buffer().input(), "sleep");
    }

    #[test]
    fn test_shutdown_drops_shell() {
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        let (shell, _state) = fake_shell();
        pane.attach(shell, "sh");
        assert!(pane.is_alive());
        pane.shutdown();
        assert!(!pane.has_shell());
        assert!(!pane.is_alive());
    }

    /// Spawns a real /bin/sh; skipped where no PTY can be allocated
    #[test]
    #[cfg(unix)]
    fn test_submitted_command_shown_once() {
        use crate::core::pty::ShellCommand;
        use crate::core::session::tests::sh_has_line_editing;
        use crate::core::session::ShellSession;
        use std::time::{Duration, Instant};

        if sh_has_line_editing() {
            return;
        }
        let shell = ShellCommand::new("/bin/sh", Vec::new());
        let session = match ShellSession::start(&shell, &std::env::temp_dir(), 80, 24) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("skipping: {}", e);
                return;
            }
        };
        let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
        pane.attach(Box::new(session), "sh");

        // Let the prompt arrive first
        let deadline = Instant::now() + Duration::from_secs(10);
        while pane.buffer().partial().is_empty() && Instant::now() < deadline {
            pane.poll_output();
            std::thread::sleep(Duration::from_millis(20));
        }

        type_str(&mut pane, "echo lazy-$((6*7))");
        pane.handle_key(&KeyEvent::plain(Key::Enter));
        while !pane.buffer().lines().any(|l| l.ends_with("lazy-42")) && Instant::now() < deadline {
            pane.poll_output();
            std::thread::sleep(Duration::from_millis(20));
        }

        let lines: Vec<_> = pane.buffer().lines().collect();
        assert!(lines.iter().any(|l| l.ends_with("lazy-42")), "{:?}", lines);
        let shown = lines.iter().filter(|l| l.contains("echo lazy-$((6*7))")).count();
        assert_eq!(shown, 1, "{:?}", lines);
        pane.shutdown();
    }

    fn motion() -> impl Strategy<Value = Key> {
        prop_oneof![
            Just(Key::Left),
            Just(Key::Right),
            Just(Key::Home),
            Just(Key::End),
            Just(Key::Backspace),
            Just(Key::Delete),
        ]
    }

    proptest! {
        #[test]
        fn test_cursor_stays_in_bounds(text in "[a-zé ]{0,12}", keys in prop::collection::vec(motion(), 0..40)) {
            let mut pane = TerminalPane::new(DEFAULT_SCROLLBACK);
            type_str(&mut pane, &text);
            for key in keys {
                pane.handle_key(&KeyEvent::plain(key));
                let len = pane.buffer().input().chars().count();
                prop_assert!(pane.buffer().cursor() <= len);
            }
        }
    }
}
