//! Resolved-round snapshots.
//!
//! A [`Round`] is an immutable historical record built at resolution time
//! from *copies* of the per-player results. It never aliases the live
//! [`crate::state::player::Player`] objects, so later mutation of player
//! state cannot rewrite history.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// One resolved round: fixed price plus per-player catch and profit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Round {
    number: u32,
    price: u32,
    catches: BTreeMap<String, u32>,
    profits: BTreeMap<String, i64>,
}

impl Round {
    /// Build a snapshot. The two maps must be non-empty and keyed by the
    /// same player names.
    pub fn new(
        number: u32,
        price: u32,
        catches: BTreeMap<String, u32>,
        profits: BTreeMap<String, i64>,
    ) -> Result<Self, RoundError> {
        if catches.is_empty() || profits.is_empty() {
            return Err(RoundError::EmptySnapshot);
        }
        if !catches.keys().eq(profits.keys()) {
            return Err(RoundError::SnapshotMismatch);
        }
        Ok(Self {
            number,
            price,
            catches,
            profits,
        })
    }

    /// Round number, 1-based.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Derived display name.
    pub fn display_name(&self) -> String {
        format!("Round {}", self.number)
    }

    /// Resolved shrimp unit price.
    pub fn price(&self) -> u32 {
        self.price
    }

    /// A player's caught amount this round.
    pub fn caught_by(&self, player: &str) -> Option<u32> {
        self.catches.get(player).copied()
    }

    /// A player's profit this round.
    pub fn profit_of(&self, player: &str) -> Option<i64> {
        self.profits.get(player).copied()
    }

    /// Total shrimp caught by all players this round.
    pub fn total_catch(&self) -> u32 {
        self.catches.values().sum()
    }

    /// Player names in the snapshot.
    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.catches.keys().map(String::as_str)
    }

    /// Convert to JSON for display collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "number": self.number,
            "name": self.display_name(),
            "price": self.price,
            "total_catch": self.total_catch(),
            "catches": self.catches,
            "profits": self.profits
        })
    }
}

/// Snapshot construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundError {
    /// A snapshot map was empty.
    EmptySnapshot,
    /// The catch and profit maps name different players.
    SnapshotMismatch,
}

impl fmt::Display for RoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySnapshot => write!(f, "Round snapshot has no players"),
            Self::SnapshotMismatch => {
                write!(f, "Round catch and profit snapshots name different players")
            }
        }
    }
}

impl std::error::Error for RoundError {}
