//! Session phase machine.
//!
//! Tracks where the session is in the round lifecycle and validates
//! transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌────────┐  join_lobby   ┌─────────┐  game_started  ┌─────────────┐
//! │ NoGame │──────────────▶│ InLobby │───────────────▶│ InGame(n)   │
//! └────────┘               └─────────┘                └──────┬──────┘
//!     ▲                         │                            │ round_finished
//!     │ leave_lobby             │ leave_lobby                ▼
//!     ├─────────────────────────┘                   ┌────────────────┐
//!     │                                             │ RoundResolving │
//!     │                                             └───────┬────────┘
//!     │                          acknowledge (next ≤ count) │
//!     │                     ┌───────────────────────────────┤
//!     │                     ▼                               │ (next > count)
//!     │              ┌─────────────┐                        ▼
//!     │              │ InGame(n+1) │                  ┌──────────┐
//!     │              └─────────────┘                  │ GameOver │
//!     │                                               └────┬─────┘
//!     └────────────────────── leave_lobby ─────────────────┘
//! ```
//!
//! `InGame → RoundResolving` only ever happens via a `ROUND_FINISHED`
//! push; `RoundResolving → InGame | GameOver` only via the summary-screen
//! acknowledgement.

use std::fmt;

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Connected (or offline), browsing lobbies.
    #[default]
    NoGame,

    /// Waiting in a lobby for the game to start.
    InLobby { lobby: String },

    /// Playing the given round (1-based).
    InGame { round: u32 },

    /// A round resolved; the summary screen has not been acknowledged yet.
    RoundResolving { next_round: u32 },

    /// All rounds resolved.
    GameOver,
}

impl SessionPhase {
    /// Check if a game is active (playing or between rounds).
    pub fn in_game(&self) -> bool {
        matches!(self, Self::InGame { .. } | Self::RoundResolving { .. })
    }

    /// The round currently accepting actions, if any.
    pub fn active_round(&self) -> Option<u32> {
        match self {
            Self::InGame { round } => Some(*round),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoGame => write!(f, "NoGame"),
            Self::InLobby { lobby } => write!(f, "InLobby({})", lobby),
            Self::InGame { round } => write!(f, "InGame(round {})", round),
            Self::RoundResolving { next_round } => {
                write!(f, "RoundResolving(next {})", next_round)
            }
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

/// Phase transition events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    JoinLobby { lobby: String },
    LeaveLobby,
    GameStarted,
    RoundFinished,
    /// Summary-screen continue action; carries the settings' round count to
    /// decide between the next round and game over.
    AcknowledgeSummary { round_count: u32 },
}

/// Error when a phase transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub event: PhaseEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

impl SessionPhase {
    /// Apply an event in place, returning an error if invalid.
    pub fn apply_mut(&mut self, event: PhaseEvent) -> Result<(), InvalidTransition> {
        *self = self.transition(&event)?;
        Ok(())
    }

    /// Calculate the phase an event leads to.
    fn transition(&self, event: &PhaseEvent) -> Result<SessionPhase, InvalidTransition> {
        use PhaseEvent::*;
        use SessionPhase::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.clone(),
            event: event.clone(),
            reason,
        };

        match (self, event) {
            // JoinLobby: NoGame -> InLobby
            (NoGame, JoinLobby { lobby }) => Ok(InLobby {
                lobby: lobby.clone(),
            }),
            (InLobby { .. }, JoinLobby { .. }) => Err(invalid("Already in a lobby")),
            (_, JoinLobby { .. }) => Err(invalid("Must finish the game first")),

            // LeaveLobby: InLobby | GameOver -> NoGame
            (InLobby { .. }, LeaveLobby) => Ok(NoGame),
            (GameOver, LeaveLobby) => Ok(NoGame),
            (NoGame, LeaveLobby) => Err(invalid("Not in a lobby")),
            (_, LeaveLobby) => Err(invalid("Game still in progress")),

            // GameStarted: InLobby -> InGame(1)
            (InLobby { .. }, GameStarted) => Ok(InGame { round: 1 }),
            (_, GameStarted) => Err(invalid("Must be in a lobby")),

            // RoundFinished: InGame(n) -> RoundResolving(n+1)
            (InGame { round }, RoundFinished) => Ok(RoundResolving {
                next_round: round + 1,
            }),
            (_, RoundFinished) => Err(invalid("No round in progress")),

            // AcknowledgeSummary: RoundResolving -> InGame | GameOver
            (RoundResolving { next_round }, AcknowledgeSummary { round_count }) => {
                if *next_round > *round_count {
                    Ok(GameOver)
                } else {
                    Ok(InGame { round: *next_round })
                }
            }
            (_, AcknowledgeSummary { .. }) => Err(invalid("No round summary pending")),
        }
    }
}
