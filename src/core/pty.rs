//! Pseudo-terminal wrapper
//!
//! Spawns the platform shell inside a pseudo terminal (openpty on Unix,
//! ConPTY on Windows, both through portable-pty) and exposes the master
//! side for reading, writing and signalling.

use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtyPair, PtySize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("shell not found: {0}")]
    ShellNotFound(String),

    #[error("failed to allocate pseudo terminal: {0}")]
    PtyAllocation(String),

    #[error("failed to spawn {command}: {reason}")]
    ProcessSpawn { command: String, reason: String },

    #[error("failed to attach to pseudo terminal: {0}")]
    Attach(String),
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("shell process has exited")]
    Exited,

    #[error("failed to write to PTY: {0}")]
    Io(#[source] io::Error),
}

/// How long teardown waits for the child to be reaped after a kill
const REAP_TIMEOUT: Duration = Duration::from_millis(200);

/// Shell program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The platform's interactive shell
    #[cfg(unix)]
    pub fn platform_default() -> Self {
        if let Some(shell) = env::var("SHELL").ok().filter(|s| !s.trim().is_empty()) {
            return Self::new(shell, Vec::new());
        }
        let program = ["/bin/bash", "/bin/sh"]
            .into_iter()
            .find(|p| Path::new(p).is_file())
            .unwrap_or("sh");
        Self::new(program, Vec::new())
    }

    /// The platform's interactive shell
    #[cfg(windows)]
    pub fn platform_default() -> Self {
        let program = env::var("COMSPEC")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "cmd.exe".to_string());
        Self::new(program, Vec::new())
    }

    /// Resolve the program to an executable path, searching PATH for bare names
    pub fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 || program.is_absolute() {
            return program.is_file().then(|| program.to_path_buf());
        }

        let paths = env::var_os("PATH")?;
        env::split_paths(&paths).find_map(|dir| {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) && program.extension().is_none() {
                let exe = candidate.with_extension("exe");
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    }

    /// Short name for titles ("bash", "cmd.exe")
    pub fn display_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }
}

/// A shell process attached to a pseudo terminal
pub struct Pty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    cols: u16,
    rows: u16,
}

impl Pty {
    /// Allocate a PTY pair and spawn the shell on its slave side
    pub fn spawn(shell: &ShellCommand, cwd: &Path, cols: u16, rows: u16) -> Result<Self, SpawnError> {
        let program = shell
            .locate()
            .ok_or_else(|| SpawnError::ShellNotFound(shell.program.clone()))?;

        let size = PtySize {
            rows: rows.max(1),
            cols: cols.max(1),
            pixel_width: 0,
            pixel_height: 0,
        };
        let PtyPair { slave, master } = native_pty_system()
            .openpty(size)
            .map_err(|e| SpawnError::PtyAllocation(e.to_string()))?;
        // The pane already shows what was typed
        #[cfg(unix)]
        disable_echo(&*master);

        let mut cmd = CommandBuilder::new(&program);
        cmd.args(&shell.args);
        cmd.cwd(cwd);
        // Plain line output is all the terminal pane can display
        cmd.env("TERM", "dumb");
        cmd.env("LAZYEDIT", "1");

        let child = slave.spawn_command(cmd).map_err(|e| SpawnError::ProcessSpawn {
            command: program.display().to_string(),
            reason: e.to_string(),
        })?;
        // Our copy of the slave must go so the master reports EOF once the child exits
        drop(slave);

        let writer = master
            .take_writer()
            .map_err(|e| SpawnError::Attach(e.to_string()))?;
        let killer = child.clone_killer();

        debug!("spawned {} (pid {:?})", program.display(), child.process_id());

        Ok(Self {
            master,
            writer,
            child,
            killer,
            cols: size.cols,
            rows: size.rows,
        })
    }

    /// A reader on its own handle to the master, and the stop that wakes it
    #[cfg(unix)]
    pub fn reader(&self) -> Result<(Box<dyn Read + Send>, ReaderStop), SpawnError> {
        use std::os::fd::BorrowedFd;

        let raw = self
            .master
            .as_raw_fd()
            .ok_or_else(|| SpawnError::Attach("master has no file descriptor".to_string()))?;
        // SAFETY: `raw` belongs to `self.master`, which is alive for this call
        let master = unsafe { BorrowedFd::borrow_raw(raw) };
        let fd = master
            .try_clone_to_owned()
            .map_err(|e| SpawnError::Attach(e.to_string()))?;
        let (stop_rx, stop_tx) = nix::unistd::pipe().map_err(|e| SpawnError::Attach(e.to_string()))?;

        let reader = PtyReader {
            file: std::fs::File::from(fd),
            stop: stop_rx,
        };
        Ok((Box::new(reader), ReaderStop { _tx: stop_tx }))
    }

    /// A second handle on the master; it unblocks once ConPTY is closed
    #[cfg(windows)]
    pub fn reader(&self) -> Result<(Box<dyn Read + Send>, ReaderStop), SpawnError> {
        let reader = self
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::Attach(e.to_string()))?;
        Ok((reader, ReaderStop {}))
    }

    /// Write bytes to the shell's input
    pub fn write_all(&mut self, data: &[u8]) -> Result<(), WriteError> {
        if !self.is_running() {
            return Err(WriteError::Exited);
        }
        self.writer
            .write_all(data)
            .and_then(|_| self.writer.flush())
            .map_err(|e| match e.kind() {
                io::ErrorKind::BrokenPipe => WriteError::Exited,
                _ => WriteError::Io(e),
            })
    }

    /// Check if the shell is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Send SIGINT to whatever owns the terminal's foreground
    #[cfg(unix)]
    pub fn interrupt(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let target = self
            .master
            .process_group_leader()
            .or_else(|| self.child.process_id().map(|pid| pid as i32));

        if let Some(pgid) = target {
            if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGINT) {
                debug!("interrupt of process group {} failed: {}", pgid, e);
            }
        }
    }

    /// ConPTY turns a raw ETX byte into a Ctrl+C event
    #[cfg(windows)]
    pub fn interrupt(&mut self) {
        if let Err(e) = self.writer.write_all(&[0x03]).and_then(|_| self.writer.flush()) {
            debug!("interrupt write failed: {}", e);
        }
    }

    /// Resize the pseudo terminal
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let (cols, rows) = (cols.max(1), rows.max(1));
        if (cols, rows) == (self.cols, self.rows) {
            return;
        }
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        match self.master.resize(size) {
            Ok(()) => {
                self.cols = cols;
                self.rows = rows;
            }
            Err(e) => warn!("failed to resize pty: {}", e),
        }
    }

    /// Kill the shell and the job in its foreground, then reap it
    pub fn kill(&mut self) {
        if !self.is_running() {
            return;
        }

        #[cfg(unix)]
        if let Some(pgid) = self.master.process_group_leader() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGHUP);
        }

        if let Err(e) = self.killer.kill() {
            debug!("kill failed: {}", e);
        }

        let deadline = std::time::Instant::now() + REAP_TIMEOUT;
        while std::time::Instant::now() < deadline {
            if !matches!(self.child.try_wait(), Ok(None)) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        warn!("shell {:?} did not exit after kill", self.child.process_id());
    }
}

/// Wakes the reader returned with it when dropped
pub struct ReaderStop {
    #[cfg(unix)]
    _tx: std::os::fd::OwnedFd,
}

/// Reads the master, returning end of file as soon as the stop pipe closes
#[cfg(unix)]
struct PtyReader {
    file: std::fs::File,
    stop: std::os::fd::OwnedFd,
}

#[cfg(unix)]
impl Read for PtyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use nix::errno::Errno;
        use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
        use std::os::fd::AsFd;

        loop {
            let (data, stopped) = {
                let mut fds = [
                    PollFd::new(self.file.as_fd(), PollFlags::POLLIN),
                    PollFd::new(self.stop.as_fd(), PollFlags::POLLIN),
                ];
                match poll(&mut fds, PollTimeout::NONE) {
                    Ok(_) => {}
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(e.into()),
                }
                let ready = |fd: &PollFd| fd.revents().map(|r| !r.is_empty()).unwrap_or(false);
                (ready(&fds[0]), ready(&fds[1]))
            };
            if stopped {
                return Ok(0);
            }
            if data {
                return self.file.read(buf);
            }
        }
    }
}

/// Turn off the line discipline's echo
#[cfg(unix)]
fn disable_echo(master: &dyn MasterPty) {
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
    use std::os::fd::BorrowedFd;

    let Some(raw) = master.as_raw_fd() else {
        return;
    };
    // SAFETY: `raw` belongs to `master`, which is alive for this call
    let fd = unsafe { BorrowedFd::borrow_raw(raw) };
    let result = tcgetattr(fd).and_then(|mut termios| {
        termios.local_flags.remove(LocalFlags::ECHO);
        tcsetattr(fd, SetArg::TCSANOW, &termios)
    });
    if let Err(e) = result {
        warn!("failed to turn off pty echo: {}", e);
    }
}

impl Drop for Pty {
    fn drop(&mut self) {
        self.kill();
    }
}
