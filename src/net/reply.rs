//! Pending-reply correlation.
//!
//! The wire protocol carries no message IDs, so a reply is matched to its
//! request purely by position: the next reply line after a send belongs to
//! that send. The dispatcher feeds every reply line into a [`ReplySink`];
//! a request-issuing caller blocks on [`ReplySource::recv`]. Positional
//! correlation is only sound while send+recv pairs are strictly
//! serialized, which the session enforces with its request lock.
//!
//! When the dispatcher exits, its sink drops and every pending `recv`
//! fails; that is the disconnect path for blocked callers.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::ClientError;

/// Producer half, owned by the dispatcher.
#[derive(Debug, Clone)]
pub struct ReplySink(Sender<String>);

impl ReplySink {
    /// Append a reply line. Returns `false` if the consumer is gone.
    pub fn push(&self, line: String) -> bool {
        self.0.send(line).is_ok()
    }
}

/// Consumer half, shared by all request-issuing callers.
#[derive(Debug)]
pub struct ReplySource(Receiver<String>);

impl ReplySource {
    /// Block until the next reply line arrives.
    ///
    /// No timeout is applied: an unresponsive server stalls the issuing
    /// action until the connection is torn down.
    pub fn recv(&self) -> Result<String, ClientError> {
        self.0
            .recv()
            .map_err(|_| ClientError::Transport("connection closed".to_string()))
    }
}

/// Create a connected sink/source pair over an unbounded channel.
pub fn reply_channel() -> (ReplySink, ReplySource) {
    let (tx, rx) = unbounded();
    (ReplySink(tx), ReplySource(rx))
}
