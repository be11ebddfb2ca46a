//! Collaborator interface for UI layers.
//!
//! Rendering lives outside this crate. The engine reports through a
//! [`SessionObserver`]: scene switches after state transitions, lobby and
//! chat refreshes, timer urgency signals, and non-fatal alerts. Callbacks
//! are invoked from the dispatcher and timer threads with no internal lock
//! held, so implementations may call back into session accessors.

use crate::state::{ChatMessage, Lobby};

/// Screens the engine can switch the UI to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Lobby browser.
    Lobby,
    /// Game-start screen, after `GAME_STARTED`.
    GameStart,
    /// Round summary, after `ROUND_FINISHED`.
    RoundSummary,
    /// Final standings, after the last summary is acknowledged.
    GameOver,
}

/// Callbacks from the engine to its UI collaborator.
///
/// Every method has a no-op default so observers implement only what they
/// render. Implementations must be thread-safe; calls arrive from
/// background threads.
pub trait SessionObserver: Send + Sync {
    /// A state transition implies a different screen.
    fn scene_changed(&self, _scene: Scene) {}

    /// The lobby list was replaced by a push.
    fn lobbies_updated(&self, _lobbies: &[Lobby]) {}

    /// A chat message was appended to the game log.
    fn chat_received(&self, _message: &ChatMessage) {}

    /// The round deadline crossed the early-warning threshold.
    fn deadline_warning(&self, _seconds_left: u32) {}

    /// The nudge threshold passed without a local action; the UI should
    /// force the catch-entry screen.
    fn force_catch_entry(&self) {}

    /// A non-fatal failure the user should see (for example a failed
    /// fallback submission).
    fn alert(&self, _message: &str) {}

    /// The connection dropped; session state is last known.
    fn connection_lost(&self) {}
}

/// Observer that ignores everything. Useful for tests and headless use.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}
