//! Output queue between PTY reader threads and the main loop
//!
//! An unbounded mpsc channel: readers push raw chunks without ever waiting
//! on the consumer, and the main loop drains whatever has arrived.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// A raw chunk of shell output
pub type Chunk = Vec<u8>;

/// The consumer side has gone away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// Producer handle, one per reader thread
#[derive(Clone)]
pub struct OutputProducer {
    tx: Sender<Chunk>,
}

impl OutputProducer {
    /// Enqueue a chunk; never blocks
    pub fn push(&self, chunk: Chunk) -> Result<(), QueueClosed> {
        self.tx.send(chunk).map_err(|_| QueueClosed)
    }
}

/// Consumer side, owned by the main loop
pub struct OutputQueue {
    rx: Receiver<Chunk>,
    closed: bool,
}

/// Create a connected producer/consumer pair
pub fn output_queue() -> (OutputProducer, OutputQueue) {
    let (tx, rx) = mpsc::channel();
    (OutputProducer { tx }, OutputQueue { rx, closed: false })
}

impl OutputQueue {
    /// Remove and return every queued chunk in arrival order
    pub fn drain(&mut self) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(chunk) => chunks.push(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        chunks
    }

    /// True once every producer has hung up and the queue was drained dry
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
