//! Error taxonomy for the session engine.
//!
//! Four failure families with different blast radii:
//!
//! - [`ClientError::Connection`]: the transport could not be established.
//!   Fatal to session start; callers fall back to an offline identity.
//! - [`ClientError::Transport`]: mid-session I/O failure. Surfaced to the
//!   caller, session state is left as last known.
//! - [`ClientError::Protocol`]: an unrecognized or malformed line. Inside
//!   the dispatcher these are logged and the message dropped; from a
//!   synchronous action they propagate to the caller.
//! - Local validation (`AlreadyActed`, `InvalidCatch`, `NotInGame`,
//!   `Rejected`): rejected before any network call, or a server decline.

use std::fmt;
use std::io;

use crate::state::phase::InvalidTransition;
use crate::state::settings::SettingsError;

/// Errors surfaced by session actions and the networking layer.
#[derive(Debug)]
pub enum ClientError {
    /// Could not establish the TCP connection within the timeout.
    Connection(io::Error),

    /// I/O failure on an established connection (broken pipe, closed
    /// stream, dispatcher gone).
    Transport(String),

    /// A line that does not match the wire protocol.
    Protocol(String),

    /// The server declined the request; carries the failure reply text.
    Rejected(String),

    /// A catch amount was already submitted for the current round.
    AlreadyActed,

    /// Catch amount outside the `[min_catch, max_catch]` range.
    InvalidCatch { amount: u32, min: u32, max: u32 },

    /// The action requires an active game.
    NotInGame,

    /// The action is not valid in the current session phase.
    Phase(InvalidTransition),

    /// Lobby or game settings failed validation.
    Settings(SettingsError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "Could not connect to server: {}", e),
            Self::Transport(msg) => write!(f, "Connection failure: {}", msg),
            Self::Protocol(msg) => write!(f, "Malformed protocol line: {}", msg),
            Self::Rejected(reply) => write!(f, "Server rejected request: {}", reply),
            Self::AlreadyActed => write!(f, "Catch amount already submitted this round"),
            Self::InvalidCatch { amount, min, max } => {
                write!(f, "Catch amount {} outside allowed range {}..={}", amount, min, max)
            }
            Self::NotInGame => write!(f, "No active game"),
            Self::Phase(e) => write!(f, "{}", e),
            Self::Settings(e) => write!(f, "Invalid settings: {}", e),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::Phase(e) => Some(e),
            Self::Settings(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SettingsError> for ClientError {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

impl From<InvalidTransition> for ClientError {
    fn from(e: InvalidTransition) -> Self {
        Self::Phase(e)
    }
}
