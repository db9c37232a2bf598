//! Key mapping for pane input
//!
//! Converts crossterm key events into the editor's own key type and
//! recognises the global commands (mode switches, save, quit) that the
//! focus coordinator intercepts before any pane sees the key.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent as CtKeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// A key, independent of the terminal backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Tab,
    Esc,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
}

/// A key press with modifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub mods: Modifiers,
}

impl KeyEvent {
    pub const fn new(key: Key, mods: Modifiers) -> Self {
        Self { key, mods }
    }

    pub const fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    pub const fn ctrl(ch: char) -> Self {
        Self::new(Key::Char(ch), Modifiers::CTRL)
    }

    /// The character to insert, if this is ordinary text input
    pub fn printable(&self) -> Option<char> {
        match self.key {
            Key::Char(ch)
                if !ch.is_control() && !self.mods.intersects(Modifiers::CTRL | Modifiers::ALT) =>
            {
                Some(ch)
            }
            _ => None,
        }
    }

    pub fn has_ctrl(&self) -> bool {
        self.mods.contains(Modifiers::CTRL)
    }
}

/// Global commands handled by the focus coordinator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Browse,
    Edit,
    Terminal,
    Save,
    Quit,
}

/// Key mapper for converting key events
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent, dropping keys no pane understands
    pub fn map(event: &CtKeyEvent) -> Option<KeyEvent> {
        let mut mods = Modifiers::from(event.modifiers);

        let key = match event.code {
            KeyCode::Char(ch) => Key::Char(ch),
            KeyCode::Enter => Key::Enter,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Delete => Key::Delete,
            KeyCode::Tab => Key::Tab,
            KeyCode::BackTab => {
                mods |= Modifiers::SHIFT;
                Key::Tab
            }
            KeyCode::Esc => Key::Esc,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::F(n) => Key::F(n),
            _ => return None,
        };

        Some(KeyEvent::new(key, mods))
    }

    /// Recognise a global command.
    ///
    /// Ctrl+digit is only reported by terminals with extended keyboard
    /// protocols, so each mode switch also has a function key.
    pub fn command(event: &KeyEvent) -> Option<Command> {
        match event.key {
            Key::F(1) => Some(Command::Browse),
            Key::F(2) => Some(Command::Edit),
            Key::F(3) => Some(Command::Terminal),
            Key::Char(ch) if event.has_ctrl() && !event.mods.contains(Modifiers::ALT) => {
                match ch.to_ascii_lowercase() {
                    '1' => Some(Command::Browse),
                    '2' => Some(Command::Edit),
                    '3' => Some(Command::Terminal),
                    's' => Some(Command::Save),
                    'q' => Some(Command::Quit),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
