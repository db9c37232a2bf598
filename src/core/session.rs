//! Shell session management
//!
//! A session owns one PTY-backed shell and the reader thread that moves its
//! output onto the output queue. The thread's lifetime is tied to the
//! session: dropping the session kills the shell, wakes the reader and
//! joins it. On Unix the reader waits on the master and a stop pipe
//! together, so a background job still holding the slave open cannot keep
//! it blocked.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use super::pty::{Pty, ReaderStop, ShellCommand, SpawnError, WriteError};
use super::queue::{output_queue, Chunk, OutputProducer, OutputQueue};

/// How long teardown waits for the reader once ConPTY is closed
#[cfg(windows)]
const READER_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

const READ_BUFFER_SIZE: usize = 4096;

/// The operations the terminal pane needs from a shell
pub trait Shell {
    /// Forward bytes to the shell's input
    fn write(&mut self, data: &[u8]) -> Result<(), WriteError>;
    /// Best-effort SIGINT to the running command
    fn interrupt(&mut self);
    /// Take every output chunk received since the last call
    fn drain(&mut self) -> Vec<Chunk>;
    fn is_alive(&mut self) -> bool;
    fn resize(&mut self, _cols: u16, _rows: u16) {}
}

/// A running shell in a pseudo terminal
pub struct ShellSession {
    pty: Option<Pty>,
    queue: OutputQueue,
    /// Cleared by the reader when it stops
    running: Arc<AtomicBool>,
    /// Dropping it makes the reader return end of file
    stop: Option<ReaderStop>,
    reader_thread: Option<JoinHandle<()>>,
    #[cfg(windows)]
    reader_done: std::sync::mpsc::Receiver<()>,
}

impl ShellSession {
    /// Spawn the shell and start the reader thread
    pub fn start(shell: &ShellCommand, cwd: &Path, cols: u16, rows: u16) -> Result<Self, SpawnError> {
        let pty = Pty::spawn(shell, cwd, cols, rows)?;
        let (reader, stop) = pty.reader()?;

        let (producer, queue) = output_queue();
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, _reader_done) = std::sync::mpsc::channel();

        let flag = running.clone();
        let reader_thread = thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                read_loop(reader, producer);
                flag.store(false, Ordering::SeqCst);
                let _ = done_tx.send(());
            })
            .map_err(|e| SpawnError::Attach(e.to_string()))?;

        info!("shell session started: {} (pid {:?})", shell.program, pty.process_id());

        Ok(Self {
            pty: Some(pty),
            queue,
            running,
            stop: Some(stop),
            reader_thread: Some(reader_thread),
            #[cfg(windows)]
            reader_done: _reader_done,
        })
    }

    /// Whether the reader thread is still delivering output
    pub fn is_reading(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the shell and the reader; idempotent
    pub fn shutdown(&mut self) {
        let Some(mut pty) = self.pty.take() else {
            return;
        };
        pty.kill();
        self.stop = None;
        drop(pty);

        let Some(handle) = self.reader_thread.take() else {
            return;
        };
        #[cfg(windows)]
        if self.is_reading() {
            use std::sync::mpsc::RecvTimeoutError;
            if let Err(RecvTimeoutError::Timeout) = self.reader_done.recv_timeout(READER_SHUTDOWN_TIMEOUT) {
                tracing::warn!("pty reader did not stop within {:?}", READER_SHUTDOWN_TIMEOUT);
                return;
            }
        }
        let _ = handle.join();
        debug!("pty reader joined");
    }
}

/// Blocking read loop run on the reader thread
fn read_loop(mut reader: Box<dyn Read + Send>, producer: OutputProducer) {
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("pty reader reached EOF");
                break;
            }
            Ok(n) => {
                if producer.push(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                // EIO is how Linux reports a hung-up slave
                debug!("pty reader stopped: {}", e);
                break;
            }
        }
    }
}

impl Shell for ShellSession {
    fn write(&mut self, data: &[u8]) -> Result<(), WriteError> {
        match self.pty.as_mut() {
            Some(pty) => pty.write_all(data),
            None => Err(WriteError::Exited),
        }
    }

    fn interrupt(&mut self) {
        if let Some(pty) = self.pty.as_mut() {
            pty.interrupt();
        }
    }

    fn drain(&mut self) -> Vec<Chunk> {
        let was_closed = self.queue.is_closed();
        let chunks = self.queue.drain();
        if !was_closed && self.queue.is_closed() {
            debug!("pty output closed");
        }
        chunks
    }

    fn is_alive(&mut self) -> bool {
        match self.pty.as_mut() {
            Some(pty) => pty.is_running(),
            None => false,
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        if let Some(pty) = self.pty.as_mut() {
            pty.resize(cols, rows);
        }
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
