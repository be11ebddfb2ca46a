//! Game settings, fixed for the lifetime of a game.
//!
//! Constructed once, either locally when creating a lobby or from a
//! `GAME_STARTED` push, and validated at construction. Numeric fields the
//! protocol requires to be non-negative use unsigned types, so only the
//! cross-field rules need runtime checks.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Settings for one game. Immutable once the game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSettings {
    /// Number of players in the game.
    pub player_count: u32,

    /// Total rounds, at least 1.
    pub round_count: u32,

    /// Base round duration in seconds.
    pub round_duration: u32,

    /// Round numbers designated as communication rounds.
    pub comm_rounds: BTreeSet<u32>,

    /// Extra seconds granted on top of the base duration in a
    /// communication round.
    pub comm_round_duration: u32,

    /// Smallest legal catch amount.
    pub min_catch: u32,

    /// Largest legal catch amount.
    pub max_catch: u32,
}

impl GameSettings {
    /// Validate and construct settings.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        player_count: u32,
        round_count: u32,
        round_duration: u32,
        comm_rounds: BTreeSet<u32>,
        comm_round_duration: u32,
        min_catch: u32,
        max_catch: u32,
    ) -> Result<Self, SettingsError> {
        if round_count < 1 {
            return Err(SettingsError::NoRounds);
        }
        if min_catch > max_catch {
            return Err(SettingsError::CatchRangeInverted {
                min: min_catch,
                max: max_catch,
            });
        }
        Ok(Self {
            player_count,
            round_count,
            round_duration,
            comm_rounds,
            comm_round_duration,
            min_catch,
            max_catch,
        })
    }

    /// Check if a round number is a designated communication round.
    pub fn is_comm_round(&self, round: u32) -> bool {
        self.comm_rounds.contains(&round)
    }

    /// Deadline duration for a round, in seconds: the base duration,
    /// extended for communication rounds.
    pub fn duration_for_round(&self, round: u32) -> u32 {
        if self.is_comm_round(round) {
            self.round_duration + self.comm_round_duration
        } else {
            self.round_duration
        }
    }

    /// Check if a catch amount is within the legal range.
    pub fn catch_in_range(&self, amount: u32) -> bool {
        (self.min_catch..=self.max_catch).contains(&amount)
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    NoRounds,
    CatchRangeInverted { min: u32, max: u32 },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRounds => write!(f, "A game needs at least one round"),
            Self::CatchRangeInverted { min, max } => {
                write!(f, "Minimum catch {} exceeds maximum catch {}", min, max)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
