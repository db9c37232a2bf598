//! Configuration for lazyedit.
//!
//! Settings are read from `~/.lazyedit/config.toml`. Every key is optional;
//! missing keys keep their defaults.
//!
//! ```toml
//! # Shell for the terminal pane (default: $SHELL, or %COMSPEC% on Windows)
//! shell = "/bin/zsh"
//! shell_args = ["-i"]
//!
//! # Input poll / output drain period in milliseconds
//! poll_interval_ms = 100
//!
//! [terminal]
//! scrollback_lines = 500
//!
//! [directory]
//! show_hidden = true
//!
//! [editor]
//! tab_width = 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::pty::ShellCommand;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command
    pub shell: Option<String>,
    /// Extra shell arguments
    pub shell_args: Vec<String>,
    /// Input poll / output drain period
    pub poll_interval_ms: u64,
    /// Terminal pane settings
    pub terminal: TerminalConfig,
    /// Directory pane settings
    pub directory: DirectoryConfig,
    /// Editor pane settings
    pub editor: EditorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            shell_args: Vec::new(),
            poll_interval_ms: 100,
            terminal: TerminalConfig::default(),
            directory: DirectoryConfig::default(),
            editor: EditorConfig::default(),
        }
    }
}

/// Terminal pane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Completed lines kept before the oldest are evicted
    pub scrollback_lines: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: 500,
        }
    }
}

/// Directory pane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub show_hidden: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { show_hidden: true }
    }
}

/// Editor pane configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub tab_width: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

impl Config {
    /// Load configuration from `~/.lazyedit/config.toml`
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// The shell to run: configured, or the platform default
    pub fn shell_command(&self) -> ShellCommand {
        match &self.shell {
            Some(program) if !program.trim().is_empty() => {
                ShellCommand::new(program.clone(), self.shell_args.clone())
            }
            _ => {
                let mut shell = ShellCommand::platform_default();
                shell.args = self.shell_args.clone();
                shell
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.clamp(10, 1000))
    }
}

/// Directory holding config and log files
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".lazyedit"))
}

fn config_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
