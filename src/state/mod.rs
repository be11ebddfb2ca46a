//! Session state: the data model and state machines the dispatcher and the
//! action entry points mutate.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        SessionState                           │
//! │                                                               │
//! │  identity: Option<UserIdentity>     lobbies: Vec<Lobby>       │
//! │                                                               │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐  │
//! │  │     SessionPhase         │   │      Option<Game>        │  │
//! │  │                          │   │                          │  │
//! │  │ NoGame ▶ InLobby ▶       │   │ name → Player            │  │
//! │  │ InGame ▶ RoundResolving  │   │ resolved Rounds          │  │
//! │  │ ▶ … ▶ GameOver           │   │ chat log, timer handle   │  │
//! │  └──────────────────────────┘   └──────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutation happens through methods called with the session's state
//! lock held, by the dispatcher (pushes), the deadline timer (fallback),
//! and user actions. No internal locking.

pub mod game;
pub mod lobby;
pub mod phase;
pub mod player;
pub mod round;
pub mod settings;

use std::fmt;

use chrono::{DateTime, Utc};

pub use game::{ChatMessage, Game, GameError};
pub use lobby::Lobby;
pub use phase::{InvalidTransition, PhaseEvent, SessionPhase};
pub use player::Player;
pub use round::{Round, RoundError};
pub use settings::{GameSettings, SettingsError};

use crate::protocol::{GameStart, RoundResult};

/// The identity the server assigned to this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub is_admin: bool,
}

/// What the round deadline timer should do after a round resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextDeadline {
    /// Round the new timer is bound to.
    pub round: u32,
    /// Deadline duration in seconds (already extended for communication
    /// rounds).
    pub duration: u32,
}

/// Combined session state guarded by the session's state lock.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Server-assigned identity; set by the username request.
    pub identity: Option<UserIdentity>,

    /// Last lobby listing push, replaced wholesale.
    pub lobbies: Vec<Lobby>,

    /// Round-lifecycle phase machine.
    phase: SessionPhase,

    /// The active game, if any.
    pub game: Option<Game>,

    /// Whether the transport is up.
    connected: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Replace the lobby listing wholesale.
    pub(crate) fn replace_lobbies(&mut self, lobbies: Vec<Lobby>) {
        self.lobbies = lobbies;
    }

    /// Enter a lobby after the server confirmed the join.
    pub(crate) fn enter_lobby(&mut self, lobby: &str) -> Result<(), InvalidTransition> {
        self.phase.apply_mut(PhaseEvent::JoinLobby {
            lobby: lobby.to_string(),
        })
    }

    /// Leave the lobby (or the finished game). Dereferences the game when
    /// leaving after game over.
    pub(crate) fn leave_lobby(&mut self) -> Result<(), InvalidTransition> {
        self.phase.apply_mut(PhaseEvent::LeaveLobby)?;
        self.game = None;
        Ok(())
    }

    /// Apply a `GAME_STARTED` push: build the player map (self plus two
    /// opponents), the settings, and the game, and enter round 1.
    ///
    /// Returns the deadline to start for round 1.
    pub(crate) fn start_game(&mut self, start: &GameStart) -> Result<NextDeadline, ApplyError> {
        let identity = self.identity.as_ref().ok_or(ApplyError::MissingIdentity)?;

        let player_names = [
            identity.name.clone(),
            start.opponents[0].clone(),
            start.opponents[1].clone(),
        ];
        let settings = GameSettings::new(
            player_names.len() as u32,
            start.round_count,
            start.round_duration,
            start.comm_rounds.clone(),
            start.comm_round_duration,
            start.min_catch,
            start.max_catch,
        )?;

        self.phase.apply_mut(PhaseEvent::GameStarted)?;
        let duration = settings.duration_for_round(1);
        self.game = Some(Game::new(
            start.game_name.clone(),
            start.island,
            settings,
            player_names,
        ));
        Ok(NextDeadline { round: 1, duration })
    }

    /// Apply a `ROUND_FINISHED` push.
    ///
    /// Returns the deadline for the next round, or `None` when all rounds
    /// are resolved.
    pub(crate) fn finish_round(
        &mut self,
        result: &RoundResult,
    ) -> Result<Option<NextDeadline>, ApplyError> {
        // Stage the phase transition before mutating the game, so a
        // rejected push leaves both machines untouched.
        let mut staged = self.phase.clone();
        staged.apply_mut(PhaseEvent::RoundFinished)?;

        let game = self.game.as_mut().ok_or(ApplyError::NoGame)?;
        game.resolve_round(result)?;
        self.phase = staged;

        if game.rounds_remaining() {
            let round = game.current_round;
            Ok(Some(NextDeadline {
                round,
                duration: game.settings.duration_for_round(round),
            }))
        } else {
            Ok(None)
        }
    }

    /// Acknowledge the round summary screen. Returns `true` when the game
    /// is over.
    pub(crate) fn acknowledge_summary(&mut self) -> Result<bool, ApplyError> {
        let round_count = self
            .game
            .as_ref()
            .ok_or(ApplyError::NoGame)?
            .settings
            .round_count;
        self.phase
            .apply_mut(PhaseEvent::AcknowledgeSummary { round_count })?;
        Ok(self.phase == SessionPhase::GameOver)
    }

    /// Append a chat entry from a `MESSAGE_SENT` push.
    pub(crate) fn append_chat(
        &mut self,
        sender: String,
        message: String,
        sent_at: DateTime<Utc>,
    ) -> Result<(), ApplyError> {
        let game = self.game.as_mut().ok_or(ApplyError::NoGame)?;
        game.push_chat(ChatMessage {
            sender,
            message,
            sent_at,
        });
        Ok(())
    }

    /// The local user's player entry, found by name equality with the
    /// session identity.
    pub fn local_player(&self) -> Option<&Player> {
        let name = &self.identity.as_ref()?.name;
        self.game.as_ref()?.player(name)
    }

    /// Whether the local player has already acted in the current round.
    pub fn local_has_acted(&self) -> bool {
        self.local_player().is_some_and(|p| p.has_acted())
    }

    /// Record the local player's catch for `round`, unless a resolution
    /// already advanced the game past it while the confirmation was in
    /// flight. The guard is the game's round counter, not the phase: an
    /// unacknowledged summary screen must not block the next round's
    /// fallback from being recorded. Returns whether the catch was
    /// recorded.
    pub(crate) fn record_local_catch(&mut self, round: u32, amount: u32) -> bool {
        let name = match &self.identity {
            Some(identity) => identity.name.clone(),
            None => return false,
        };
        match self.game.as_mut() {
            Some(game) if game.current_round == round => match game.player_mut(&name) {
                Some(player) => {
                    player.record_catch(amount);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Convert to a JSON snapshot for display collaborators.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "phase": self.phase.to_string(),
            "connected": self.connected,
            "identity": self.identity.as_ref().map(|i| i.name.clone()),
            "lobbies": self.lobbies.iter().map(|l| l.to_json()).collect::<Vec<_>>(),
            "game": self.game.as_ref().map(|g| g.to_json())
        })
    }
}

/// Errors from applying a push or a local transition to session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The push arrived in a phase that cannot accept it.
    Transition(InvalidTransition),
    /// Settings in the push failed validation.
    Settings(SettingsError),
    /// The game rejected the update.
    Game(GameError),
    /// A game push arrived before the username handshake.
    MissingIdentity,
    /// A game push arrived with no active game.
    NoGame,
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transition(e) => write!(f, "{}", e),
            Self::Settings(e) => write!(f, "{}", e),
            Self::Game(e) => write!(f, "{}", e),
            Self::MissingIdentity => write!(f, "No username assigned yet"),
            Self::NoGame => write!(f, "No active game"),
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<InvalidTransition> for ApplyError {
    fn from(e: InvalidTransition) -> Self {
        Self::Transition(e)
    }
}

impl From<SettingsError> for ApplyError {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

impl From<GameError> for ApplyError {
    fn from(e: GameError) -> Self {
        Self::Game(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PlayerOutcome;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn game_start() -> GameStart {
        GameStart {
            opponents: ["p2".to_string(), "p3".to_string()],
            round_count: 4,
            round_duration: 60,
            comm_rounds: [2].into_iter().collect(),
            comm_round_duration: 30,
            min_catch: 10,
            max_catch: 50,
            island: 7,
            game_name: "IslandA".to_string(),
        }
    }

    fn round_result() -> RoundResult {
        RoundResult {
            price: 30,
            outcomes: vec![
                PlayerOutcome {
                    name: "self".to_string(),
                    caught: 20,
                    profit: 300,
                },
                PlayerOutcome {
                    name: "p2".to_string(),
                    caught: 15,
                    profit: 225,
                },
                PlayerOutcome {
                    name: "p3".to_string(),
                    caught: 25,
                    profit: 375,
                },
            ],
        }
    }

    fn in_lobby_state() -> SessionState {
        let mut state = SessionState::new();
        state.identity = Some(UserIdentity {
            name: "self".to_string(),
            is_admin: false,
        });
        state.enter_lobby("bay").unwrap();
        state
    }

    #[test]
    fn test_game_started_scenario() {
        let mut state = in_lobby_state();

        let deadline = state.start_game(&game_start()).unwrap();
        // Round 1 is not a communication round ("2"), so no extension.
        assert_eq!(deadline, NextDeadline { round: 1, duration: 60 });

        let game = state.game.as_ref().unwrap();
        assert_eq!(game.current_round, 1);
        assert_eq!(game.player_count(), 3);
        assert!(game.player("self").is_some());
        assert_eq!(state.phase().active_round(), Some(1));
    }

    #[test]
    fn test_round_finished_scenario() {
        let mut state = in_lobby_state();
        state.start_game(&game_start()).unwrap();

        let round_before = state.game.as_ref().unwrap().current_round;
        let deadline = state.finish_round(&round_result()).unwrap().unwrap();

        // Round 2 is a communication round: 60 + 30 seconds.
        assert_eq!(deadline, NextDeadline { round: 2, duration: 90 });

        let game = state.game.as_ref().unwrap();
        assert_eq!(game.current_round, 2);
        assert_eq!(game.player("self").unwrap().current_total, 300);
        let stored = game.round(round_before).unwrap();
        assert_eq!(stored.number(), round_before);
        assert_eq!(stored.total_catch(), 60);
        assert!(!state.local_has_acted());
    }

    #[test]
    fn test_each_total_equals_previous_plus_profit() {
        let mut state = in_lobby_state();
        state.start_game(&game_start()).unwrap();
        state.finish_round(&round_result()).unwrap();
        state.acknowledge_summary().unwrap();
        state.finish_round(&round_result()).unwrap();

        let game = state.game.as_ref().unwrap();
        for player in game.players() {
            assert_eq!(
                player.current_total,
                player.previous_total + player.last_profit
            );
        }
    }

    #[test]
    fn test_last_round_ends_game() {
        let mut state = in_lobby_state();
        let mut start = game_start();
        start.round_count = 1;
        start.comm_rounds = BTreeSet::new();
        state.start_game(&start).unwrap();

        let next = state.finish_round(&round_result()).unwrap();
        assert_eq!(next, None);

        let over = state.acknowledge_summary().unwrap();
        assert!(over);
        assert_eq!(*state.phase(), SessionPhase::GameOver);

        // Leaving after game over drops the game.
        state.leave_lobby().unwrap();
        assert!(state.game.is_none());
        assert_eq!(*state.phase(), SessionPhase::NoGame);
    }

    #[test]
    fn test_game_push_without_identity_rejected() {
        let mut state = SessionState::new();
        state.enter_lobby("bay").unwrap();
        let err = state.start_game(&game_start()).unwrap_err();
        assert_eq!(err, ApplyError::MissingIdentity);
    }

    #[test]
    fn test_round_push_without_game_rejected() {
        let mut state = SessionState::new();
        let err = state.finish_round(&round_result()).unwrap_err();
        assert_eq!(err, ApplyError::NoGame);
    }

    #[test]
    fn test_record_local_catch_checks_round() {
        let mut state = in_lobby_state();
        state.start_game(&game_start()).unwrap();

        // Stale round number: nothing recorded.
        assert!(!state.record_local_catch(2, 20));
        assert!(!state.local_has_acted());

        assert!(state.record_local_catch(1, 20));
        assert!(state.local_has_acted());
        assert_eq!(state.local_player().unwrap().caught(), Some(20));
    }

    #[test]
    fn test_record_catch_while_summary_unacknowledged() {
        let mut state = in_lobby_state();
        state.start_game(&game_start()).unwrap();
        state.finish_round(&round_result()).unwrap();

        // The summary has not been acknowledged, but round 2's deadline
        // may already act on the player's behalf.
        assert!(state.record_local_catch(2, 10));
        assert_eq!(state.local_player().unwrap().caught(), Some(10));

        // The resolved round stays out of reach.
        assert!(!state.record_local_catch(1, 99));
    }

    #[test]
    fn test_chat_requires_game() {
        let mut state = in_lobby_state();
        assert_eq!(
            state
                .append_chat("p2".to_string(), "hi".to_string(), Utc::now())
                .unwrap_err(),
            ApplyError::NoGame
        );

        state.start_game(&game_start()).unwrap();
        state
            .append_chat("p2".to_string(), "hi".to_string(), Utc::now())
            .unwrap();
        assert_eq!(state.game.as_ref().unwrap().chat().len(), 1);
    }

    #[test]
    fn test_replace_lobbies_wholesale() {
        let mut state = SessionState::new();
        state.replace_lobbies(vec![Lobby::new("a".to_string(), 1, 3)]);
        state.replace_lobbies(vec![
            Lobby::new("b".to_string(), 2, 3),
            Lobby::new("c".to_string(), 0, 3),
        ]);
        let names: Vec<&str> = state.lobbies.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }
}
