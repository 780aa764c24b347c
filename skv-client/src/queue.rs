//! # Command Queues
//!
//! Purpose: Track commands awaiting replies (in-flight FIFO) and commands
//! issued while no connection is ready (offline buffer).
//!
//! ## Design Principles
//! 1. **Strict FIFO**: Replies match the oldest in-flight entry, never by
//!    content.
//! 2. **Bounded Offline Buffer**: Capacity overflow fails the command
//!    immediately instead of blocking.
//! 3. **Single Owner**: Only the connection task mutates these queues, so no
//!    locking is required.

use std::collections::VecDeque;

use tokio::sync::oneshot;

use skv_common::{Arg, Error, Result, Value};

/// Channel half that resolves one command's continuation.
pub(crate) type ReplySender = oneshot::Sender<Result<Value>>;

/// Command buffered while no connection is ready.
pub(crate) struct QueuedCommand {
    pub cmd: String,
    pub args: Vec<Arg>,
    pub tx: ReplySender,
}

/// Command written to the socket and awaiting its reply.
pub(crate) struct PendingReply {
    pub cmd: String,
    pub tx: ReplySender,
}

/// Both queues owned by one connection.
pub(crate) struct CommandQueue {
    in_flight: VecDeque<PendingReply>,
    offline: VecDeque<QueuedCommand>,
    limit: usize,
}

impl CommandQueue {
    /// Creates empty queues with the given offline capacity (0 = unbounded).
    pub fn new(limit: usize) -> Self {
        CommandQueue {
            in_flight: VecDeque::new(),
            offline: VecDeque::new(),
            limit,
        }
    }

    /// Records a command the moment its bytes are handed to the socket.
    pub fn push_in_flight(&mut self, cmd: String, tx: ReplySender) {
        self.in_flight.push_back(PendingReply { cmd, tx });
    }

    /// Pops the oldest in-flight entry for an arriving reply.
    pub fn pop_reply(&mut self) -> Option<PendingReply> {
        self.in_flight.pop_front()
    }

    /// Buffers a command for replay on the next reconnect.
    ///
    /// Overflow resolves the continuation immediately with a queue-full
    /// error; the command never touches the network.
    pub fn buffer(&mut self, cmd: String, args: Vec<Arg>, tx: ReplySender) {
        if self.limit != 0 && self.offline.len() >= self.limit {
            let _ = tx.send(Err(Error::OfflineQueueFull));
            return;
        }
        self.offline.push_back(QueuedCommand { cmd, args, tx });
    }

    /// Swaps the offline buffer for an empty one.
    ///
    /// Entries must be replayed through the normal write path in the order
    /// returned, ahead of any newer traffic.
    pub fn take_offline(&mut self) -> VecDeque<QueuedCommand> {
        std::mem::take(&mut self.offline)
    }

    /// Fails every in-flight command with a connection-lost error.
    ///
    /// The offline buffer is untouched; those commands stay queued for the
    /// next reconnect.
    pub fn fail_in_flight(&mut self) {
        for pending in self.in_flight.drain(..) {
            let _ = pending.tx.send(Err(Error::ConnectionLost));
        }
    }

    /// Drains the offline buffer at terminal shutdown, failing every entry.
    pub fn flush_offline(&mut self, err: impl Fn() -> Error) {
        for entry in self.offline.drain(..) {
            let _ = entry.tx.send(Err(err()));
        }
    }

    #[cfg(test)]
    fn offline_len(&self) -> usize {
        self.offline.len()
    }
}
