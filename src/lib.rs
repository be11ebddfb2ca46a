//! Shrimp Client Session Library
//!
//! This crate provides the networked session-synchronization engine for
//! the shrimp fishing game client.
//!
//! # Overview
//!
//! The engine keeps local game state consistent with server-confirmed
//! state over a single line-delimited TCP connection that carries both
//! request/reply exchanges and asynchronous server pushes:
//!
//! - **Transport** - Owns the socket and the line primitives; no protocol
//!   knowledge.
//!
//! - **Packet Dispatcher** - One background thread that classifies every
//!   incoming line as a push (`UPDATE …`) or a reply, routes replies to
//!   the pending-reply channel, and applies pushes to session state.
//!
//! - **Session State** - The Game/Round/Player/Settings data model and the
//!   round-lifecycle phase machine with validated transitions.
//!
//! - **Round Deadline Timer** - A per-round countdown that signals urgency
//!   to the UI and, on expiry, submits the minimum legal catch on the
//!   player's behalf.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - Invalid phase changes are
//!    rejected with clear errors, never silently applied.
//!
//! 2. **One context object** - A [`session::SessionClient`] owns the
//!    connection, the dispatcher, and the state; no hidden singletons.
//!
//! 3. **Serialized requests** - Replies are correlated positionally, so
//!    every send+await pair runs behind one session-wide lock; the
//!    deadline timer's fallback submission goes through the same lock.
//!
//! 4. **Rendering stays outside** - UI collaborators consume read-only
//!    snapshots and [`observer::SessionObserver`] callbacks.
//!
//! # Example
//!
//! ```rust
//! use shrimp_client::state::{GameSettings, SessionState, UserIdentity};
//!
//! // Settings are validated at construction.
//! let settings = GameSettings::new(3, 4, 60, [2].into_iter().collect(), 30, 10, 50).unwrap();
//! assert!(settings.is_comm_round(2));
//! assert_eq!(settings.duration_for_round(2), 90);
//!
//! // Session state starts with no game and no identity.
//! let mut state = SessionState::new();
//! state.identity = Some(UserIdentity { name: "olaf".to_string(), is_admin: false });
//! assert!(state.game.is_none());
//! assert!(!state.local_has_acted());
//! ```

pub mod error;
pub mod net;
pub mod observer;
pub mod protocol;
pub mod session;
pub mod state;
pub mod timer;

pub use error::ClientError;
pub use observer::{NullObserver, Scene, SessionObserver};
pub use session::{ClientConfig, SessionClient};
pub use state::{
    ChatMessage, Game, GameSettings, Lobby, Player, Round, SessionPhase, SessionState,
    UserIdentity,
};
pub use timer::TimerConfig;
