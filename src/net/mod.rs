//! Networking: transport, reply correlation, and the packet dispatcher.
//!
//! - `transport`: owns the socket and the line primitives; knows nothing
//!   about protocol semantics.
//! - `reply`: the pending-reply channel correlating each request with the
//!   next reply line.
//! - `dispatcher`: the background reader classifying pushes vs replies.

pub mod reply;
pub mod transport;

pub(crate) mod dispatcher;

pub use reply::{reply_channel, ReplySink, ReplySource};
pub use transport::Transport;
