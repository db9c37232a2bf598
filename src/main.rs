//! lazyedit - a terminal file browser, editor and shell in one screen
//!
//! Three panes share the screen: a directory tree on the left, a text
//! editor above and an interactive shell below. One pane has the keyboard
//! at a time; global keys move focus between them.
//!
//! # Quick Start
//!
//! ```text
//! lazyedit                # Browse the current directory
//! lazyedit ~/project      # Browse another directory
//! lazyedit -s /bin/zsh    # Use a specific shell
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | F1 / Ctrl+1 | Browse files |
//! | F2 / Ctrl+2 | Edit |
//! | F3 / Ctrl+3 | Terminal |
//! | Ctrl+S | Save (while editing) |
//! | Ctrl+Q | Quit |

mod config;
mod core;
mod focus;
mod panes;
mod ui;

use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::core::pty::ShellCommand;
use crate::focus::{Coordinator, Flow};
use crate::ui::{KeyMapper, Layout, Renderer};

/// Command line arguments
#[derive(Debug, Default, PartialEq)]
struct Args {
    /// Shell given with -s/--shell
    shell: Option<String>,
    /// Directory to browse
    root: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("lazyedit {}", VERSION);
}

fn print_help() {
    eprintln!("lazyedit {} - file browser, editor and shell in one terminal", VERSION);
    eprintln!();
    eprintln!("Usage: lazyedit [OPTIONS] [DIR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [DIR]                 Directory to browse (default: current directory)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -s, --shell <CMD>     Shell for the terminal pane");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Keys:");
    eprintln!("  F1 / Ctrl+1           Browse files");
    eprintln!("  F2 / Ctrl+2           Edit the open file");
    eprintln!("  F3 / Ctrl+3           Terminal");
    eprintln!("  Ctrl+S                Save (while editing)");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!();
    eprintln!("Browsing:");
    eprintln!("  Up/Down, PgUp/PgDn    Move selection");
    eprintln!("  Enter / Space         Expand folder or open file");
    eprintln!("  r / F5                Reload the tree");
    eprintln!();
    eprintln!("Terminal:");
    eprintln!("  Enter                 Send the line to the shell");
    eprintln!("  Ctrl+C                Interrupt the running command");
    eprintln!();
    eprintln!("Configuration: ~/.lazyedit/config.toml");
    eprintln!("Log file:      ~/.lazyedit/lazyedit.log");
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, String> {
    let args: Vec<String> = args.into_iter().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-s" | "--shell" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing shell argument".to_string());
                }
                parsed.shell = Some(args[i].clone());
            }
            arg if arg.starts_with('-') && arg.len() > 1 => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => {
                if parsed.root.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                parsed.root = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to ~/.lazyedit/lazyedit.log; stdout belongs to the UI
fn init_logging() {
    let Some(dir) = config::data_dir() else {
        return;
    };
    let _ = fs::create_dir_all(&dir);

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("lazyedit.log"))
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args(env::args()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("lazyedit {} starting...", VERSION);

    // Command line overrides the config file
    let mut config = Config::load();
    if let Some(shell) = args.shell {
        config.shell = Some(shell);
        config.shell_args.clear();
    }

    let shell = config.shell_command();
    if shell.locate().is_none() {
        eprintln!("Error: shell not found: {}", shell.program);
        std::process::exit(1);
    }

    let root = match args.root {
        Some(root) => root,
        None => env::current_dir()?,
    };
    if !root.is_dir() {
        eprintln!("Error: not a directory: {}", root.display());
        std::process::exit(1);
    }
    let root = root.canonicalize().unwrap_or(root);
    info!("root: {}", root.display());
    info!("shell: {}", shell.program);

    run(&config, &shell, root)
}

fn run(config: &Config, shell: &ShellCommand, root: PathBuf) -> anyhow::Result<()> {
    let (cols, rows) = Renderer::size()?;
    info!("terminal size: {}x{}", cols, rows);
    let layout = Layout::compute(cols, rows);

    let mut coordinator = Coordinator::new(root, config);
    let term = layout.terminal.inner();
    coordinator.start_shell(shell, term.width.max(1), term.height.max(1));
    coordinator.resize(&layout);

    let mut renderer = Renderer::new();
    renderer.init()?;

    let result = run_main_loop(&mut coordinator, &mut renderer, layout, config.poll_interval());

    coordinator.shutdown();
    let _ = renderer.cleanup();
    info!("lazyedit exiting");
    result
}

/// Poll input, drain shell output, render when something changed
fn run_main_loop(
    coordinator: &mut Coordinator,
    renderer: &mut Renderer,
    mut layout: Layout,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let mut dirty = true;

    loop {
        if coordinator.tick() {
            dirty = true;
        }
        if dirty {
            renderer.render(coordinator, &layout)?;
            dirty = false;
        }

        if !event::poll(poll_interval)? {
            continue;
        }
        match event::read()? {
            Event::Key(key_event) => {
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                let Some(key) = KeyMapper::map(&key_event) else {
                    continue;
                };
                if coordinator.handle_key(&key) == Flow::Quit {
                    info!("quit requested");
                    break;
                }
                dirty = true;
            }
            Event::Resize(cols, rows) => {
                layout = Layout::compute(cols, rows);
                coordinator.resize(&layout);
                renderer.invalidate();
                dirty = true;
            }
            _ => {}
        }
    }

    Ok(())
}
