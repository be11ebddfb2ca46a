//! Game state management.
//!
//! A [`Game`] is created atomically from one `GAME_STARTED` push and lives
//! until the user leaves after game over. It owns the player map, the
//! ordered collection of resolved rounds, the chat log, and the handle of
//! the active round deadline timer.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};

use crate::protocol::RoundResult;
use crate::state::player::Player;
use crate::state::round::{Round, RoundError};
use crate::state::settings::GameSettings;
use crate::timer::TimerHandle;

/// One chat entry in the game log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sender": self.sender,
            "message": self.message,
            "sent_at": self.sent_at.to_rfc3339()
        })
    }
}

/// An active game session.
#[derive(Debug)]
pub struct Game {
    /// Game name from the `GAME_STARTED` push.
    pub name: String,

    /// Island (table) identifier.
    pub island: u32,

    /// Settings, immutable once the game starts.
    pub settings: GameSettings,

    /// Players indexed by name.
    players: HashMap<String, Player>,

    /// Resolved rounds, ordered by round number.
    rounds: Vec<Round>,

    /// Current round number, 1-based. Incremented on each resolution;
    /// never exceeds `settings.round_count + 1`.
    pub current_round: u32,

    /// Chat log, in arrival order.
    chat: Vec<ChatMessage>,

    /// Deadline timer for the current round.
    timer: Option<TimerHandle>,

    /// When the game was created locally.
    pub created_at: DateTime<Utc>,
}

impl Game {
    /// Create a game with the given players, starting at round 1.
    pub fn new(
        name: String,
        island: u32,
        settings: GameSettings,
        player_names: impl IntoIterator<Item = String>,
    ) -> Self {
        let players = player_names
            .into_iter()
            .map(|name| (name.clone(), Player::new(name)))
            .collect();
        Self {
            name,
            island,
            settings,
            players,
            rounds: Vec::new(),
            current_round: 1,
            chat: Vec::new(),
            timer: None,
            created_at: Utc::now(),
        }
    }

    /// Get a player by name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    /// Get a mutable player by name.
    pub(crate) fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.get_mut(name)
    }

    /// All players, unordered.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Player count.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Check if more rounds remain after the current one resolves.
    pub fn rounds_remaining(&self) -> bool {
        self.current_round <= self.settings.round_count
    }

    /// Apply a resolved round: update every player's catch, profit, and
    /// money totals, snapshot the round from copies of the results, and
    /// advance the round counter. All catch sentinels are reset for the
    /// next round.
    pub fn resolve_round(&mut self, result: &RoundResult) -> Result<&Round, GameError> {
        if self.current_round > self.settings.round_count {
            return Err(GameError::GameAlreadyOver);
        }

        // Validate everything before touching any player.
        let mut catches = BTreeMap::new();
        let mut profits = BTreeMap::new();
        for outcome in &result.outcomes {
            if !self.players.contains_key(&outcome.name) {
                return Err(GameError::UnknownPlayer(outcome.name.clone()));
            }
            if catches.insert(outcome.name.clone(), outcome.caught).is_some() {
                return Err(GameError::DuplicatePlayer(outcome.name.clone()));
            }
            profits.insert(outcome.name.clone(), outcome.profit);
        }
        let round = Round::new(self.current_round, result.price, catches, profits)?;

        for outcome in &result.outcomes {
            if let Some(player) = self.players.get_mut(&outcome.name) {
                player.apply_result(outcome.caught, outcome.profit);
            }
        }
        self.rounds.push(round);
        self.current_round += 1;
        debug_assert!(self.current_round <= self.settings.round_count + 1);

        for player in self.players.values_mut() {
            player.reset_catch();
        }

        Ok(self.rounds.last().expect("round pushed above"))
    }

    /// Resolved rounds in order.
    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Get a resolved round by number.
    pub fn round(&self, number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.number() == number)
    }

    /// Append a chat entry.
    pub(crate) fn push_chat(&mut self, message: ChatMessage) {
        self.chat.push(message);
    }

    /// Chat log in arrival order.
    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    /// Install the deadline timer for the current round, returning the
    /// replaced handle so the caller can stop it.
    pub(crate) fn set_timer(&mut self, timer: TimerHandle) -> Option<TimerHandle> {
        self.timer.replace(timer)
    }

    /// Remove and return the active timer handle.
    pub(crate) fn take_timer(&mut self) -> Option<TimerHandle> {
        self.timer.take()
    }

    /// Seconds remaining on the active round deadline, if a timer runs.
    pub fn deadline_remaining(&self) -> Option<u32> {
        self.timer.as_ref().map(|t| t.remaining())
    }

    /// Convert full game state to a JSON snapshot.
    pub fn to_json(&self) -> serde_json::Value {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));

        serde_json::json!({
            "name": self.name,
            "island": self.island,
            "settings": self.settings,
            "current_round": self.current_round,
            "players": players.iter().map(|p| p.to_json()).collect::<Vec<_>>(),
            "rounds": self.rounds.iter().map(|r| r.to_json()).collect::<Vec<_>>(),
            "chat": self.chat.iter().map(|m| m.to_json()).collect::<Vec<_>>()
        })
    }
}

/// Game errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// A round result named a player missing from the game.
    UnknownPlayer(String),
    /// A round result named the same player more than once.
    DuplicatePlayer(String),
    /// All rounds are already resolved.
    GameAlreadyOver,
    /// The round snapshot could not be built.
    Round(RoundError),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPlayer(name) => {
                write!(f, "Unknown player {:?} in round result", name)
            }
            Self::DuplicatePlayer(name) => {
                write!(f, "Player {:?} appears twice in round result", name)
            }
            Self::GameAlreadyOver => write!(f, "All rounds already resolved"),
            Self::Round(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for GameError {}

impl From<RoundError> for GameError {
    fn from(e: RoundError) -> Self {
        Self::Round(e)
    }
}
