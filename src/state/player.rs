//! Per-player game state.
//!
//! Three players share a game; the local user's entry is distinguished only
//! by name equality with the session's own identity, never by a flag. The
//! caught amount is `Option<u32>`; `None` is the "has not acted yet"
//! sentinel, distinct from catching zero.

use serde::Serialize;

/// Fixed running cost charged to every boat each round. The protocol does
/// not carry it; it is display metadata.
pub const DEFAULT_ROUND_COST: i64 = 50;

/// One player in the game, keyed by name in [`crate::state::game::Game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Player {
    /// Display name, unique within a game.
    pub name: String,

    /// Total earnings before the most recent resolved round.
    pub previous_total: i64,

    /// Total earnings including the most recent resolved round.
    pub current_total: i64,

    /// Profit from the most recent resolved round.
    pub last_profit: i64,

    /// Fixed per-round cost.
    pub round_cost: i64,

    /// Amount caught this round; `None` until the player acts.
    caught: Option<u32>,
}

impl Player {
    pub fn new(name: String) -> Self {
        Self {
            name,
            previous_total: 0,
            current_total: 0,
            last_profit: 0,
            round_cost: DEFAULT_ROUND_COST,
            caught: None,
        }
    }

    /// Whether the player has submitted a catch amount this round.
    pub fn has_acted(&self) -> bool {
        self.caught.is_some()
    }

    /// The caught amount, if acted this round.
    pub fn caught(&self) -> Option<u32> {
        self.caught
    }

    /// Record the catch amount for this round.
    pub(crate) fn record_catch(&mut self, amount: u32) {
        self.caught = Some(amount);
    }

    /// Clear the catch sentinel at the start of a new round.
    pub(crate) fn reset_catch(&mut self) {
        self.caught = None;
    }

    /// Apply a resolved round: fix the caught amount as reported by the
    /// server and roll the money totals forward.
    pub(crate) fn apply_result(&mut self, caught: u32, profit: i64) {
        self.caught = Some(caught);
        self.last_profit = profit;
        self.previous_total = self.current_total;
        self.current_total += profit;
    }

    /// Convert to JSON for display collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "previous_total": self.previous_total,
            "current_total": self.current_total,
            "last_profit": self.last_profit,
            "round_cost": self.round_cost,
            "caught": self.caught
        })
    }
}
