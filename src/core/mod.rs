//! Shell plumbing.
//!
//! This module contains everything that talks to the child shell:
//!
//! - **pty**: pseudo-terminal allocation and the shell process
//! - **queue**: unbounded output queue between reader threads and the main loop
//! - **session**: a shell session owning the PTY and its reader thread
//! - **filter**: byte stream to plain text (UTF-8 reassembly, escape stripping)
//!
//! # Architecture
//!
//! ```text
//! ShellSession
//! ├── Pty (master side + child process)
//! ├── reader thread ──push──▶ OutputProducer
//! └── OutputQueue ◀──drain── main loop ──▶ OutputFilter ──▶ TerminalBuffer
//! ```

pub mod filter;
pub mod pty;
pub mod queue;
pub mod session;
