//! Queue protocol types
//!
//! Commands travel through the same FIFO queue as events, so a command is
//! only serviced after every event enqueued before it has been delivered or
//! attempted. That ordering is the correctness property behind flush.

use super::event::LogEvent;
use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Flush,
    Close,
}

/// A flush/close request carrying its single-slot reply channel. The caller
/// blocks on the receiving half until the worker acknowledges.
#[derive(Debug)]
pub struct Command {
    pub kind: CommandKind,
    pub reply: Sender<bool>,
}

impl Command {
    /// Create a command and the reply receiver its issuer blocks on.
    pub fn new(kind: CommandKind) -> (Self, Receiver<bool>) {
        let (reply, reply_rx) = bounded(1);
        (Command { kind, reply }, reply_rx)
    }

    /// Acknowledge the rendezvous. The issuer may have given up and dropped
    /// its receiver; that is not an error.
    pub fn acknowledge(&self, ok: bool) {
        let _ = self.reply.send(ok);
    }
}

/// One slot in a destination queue.
#[derive(Debug)]
pub enum QueueItem {
    /// Boxed to keep queue slots small; events dominate queue traffic.
    Event(Box<LogEvent>),
    Command(Command),
}
