//! The session client: one explicitly constructed context object tying the
//! transport, the dispatcher, the reply channel, the state, and the
//! observer together. No hidden singletons.
//!
//! # Locking discipline
//!
//! Two locks, acquired in this order and never the other way around:
//!
//! 1. `request_lock`: held across every send+recv pair. Replies are
//!    correlated positionally, so requests must be strictly serialized;
//!    the lock is also what makes "check acted, then send" atomic between
//!    a user submission and the deadline timer's fallback.
//! 2. `state`: guards the session data model. Taken briefly by the
//!    dispatcher per push, by actions for validation and recording, and by
//!    the timer for its re-checks. Never held while blocking on a reply,
//!    so the dispatcher keeps consuming pushes while an action waits.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

use crate::error::ClientError;
use crate::net::{dispatcher, reply_channel, ReplySource, Transport};
use crate::observer::{Scene, SessionObserver};
use crate::protocol::{self, Command};
use crate::state::{GameSettings, PhaseEvent, SessionPhase, SessionState, UserIdentity};
use crate::timer::TimerConfig;

/// Connection and timer configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub timer: TimerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7119,
            connect_timeout: Duration::from_secs(10),
            timer: TimerConfig::default(),
        }
    }
}

/// Shared core referenced by the client handle, the dispatcher thread, and
/// the deadline timer threads.
pub(crate) struct SessionCore {
    pub(crate) state: Mutex<SessionState>,
    pub(crate) request_lock: Mutex<()>,
    pub(crate) transport: Transport,
    pub(crate) replies: ReplySource,
    pub(crate) observer: Box<dyn SessionObserver>,
    pub(crate) timer_config: TimerConfig,
}

impl SessionCore {
    /// Lock the state, recovering the data from a poisoned lock; a
    /// panicking observer must not wedge the whole session.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn lock_requests(&self) -> MutexGuard<'_, ()> {
        self.request_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Send a command and block for the positionally correlated reply.
    /// The caller must hold the request lock.
    pub(crate) fn exchange(&self, command: &Command) -> Result<String, ClientError> {
        self.transport.send_line(&command.encode())?;
        self.replies.recv()
    }
}

/// Handle to a connected session.
pub struct SessionClient {
    core: Arc<SessionCore>,
    dispatcher: Option<JoinHandle<()>>,
}

impl SessionClient {
    /// Connect to the server and start the background dispatcher.
    ///
    /// A connection failure here is fatal to session start; callers
    /// typically fall back to [`SessionClient::offline_username`].
    pub fn connect(
        config: ClientConfig,
        observer: Box<dyn SessionObserver>,
    ) -> Result<Self, ClientError> {
        let transport = Transport::connect(&config.host, config.port, config.connect_timeout)?;
        let reader = transport.reader()?;
        let (sink, source) = reply_channel();

        let mut state = SessionState::new();
        state.set_connected(true);

        let core = Arc::new(SessionCore {
            state: Mutex::new(state),
            request_lock: Mutex::new(()),
            transport,
            replies: source,
            observer,
            timer_config: config.timer,
        });
        info!("session connected to {}", core.transport.peer());

        let dispatcher = dispatcher::spawn(Arc::clone(&core), reader, sink);
        Ok(Self {
            core,
            dispatcher: Some(dispatcher),
        })
    }

    /// Identity used when the server is unreachable: a locally generated
    /// name with no admin rights.
    pub fn offline_username() -> UserIdentity {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() % 100_000)
            .unwrap_or(0);
        UserIdentity {
            name: format!("deckhand-{}", stamp),
            is_admin: false,
        }
    }

    /// Read-only access to the session state.
    pub fn with_state<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.core.lock_state())
    }

    /// Ask the server for an identity and store it in the session.
    pub fn request_username(&self) -> Result<UserIdentity, ClientError> {
        let _requests = self.core.lock_requests();
        let reply = self.core.exchange(&Command::RequestUsername)?;
        let (name, is_admin) = protocol::parse_username_reply(&reply)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        let identity = UserIdentity { name, is_admin };
        self.core.lock_state().identity = Some(identity.clone());
        Ok(identity)
    }

    /// Create a lobby with validated settings. The settings are valid by
    /// construction; the server may still decline (for example a taken
    /// name), surfaced as [`ClientError::Rejected`].
    pub fn create_lobby(
        &self,
        name: &str,
        max_players: u32,
        settings: &GameSettings,
    ) -> Result<(), ClientError> {
        let command = Command::CreateLobby {
            name: name.to_string(),
            max_players,
            round_count: settings.round_count,
            round_duration: settings.round_duration,
            comm_rounds: settings.comm_rounds.clone(),
            comm_round_duration: settings.comm_round_duration,
            min_catch: settings.min_catch,
            max_catch: settings.max_catch,
        };

        let _requests = self.core.lock_requests();
        let reply = self.core.exchange(&command)?;
        if reply == protocol::REPLY_CREATE_LOBBY_SUCCESS {
            Ok(())
        } else {
            Err(ClientError::Rejected(reply))
        }
    }

    /// Join a lobby by name. Rejected locally if a game is in progress.
    ///
    /// The phase moves to `InLobby` before the command is sent: the server
    /// may push `GAME_STARTED` immediately after its reply (the lobby
    /// became full), and the dispatcher must find the phase already
    /// advanced when that push arrives. A declined join or a transport
    /// failure rolls the phase back.
    pub fn join_lobby(&self, name: &str) -> Result<(), ClientError> {
        let _requests = self.core.lock_requests();
        self.core.lock_state().enter_lobby(name)?;

        let outcome = self.core.exchange(&Command::JoinLobby {
            name: name.to_string(),
        });
        match outcome {
            Ok(reply) if reply == protocol::REPLY_JOIN_LOBBY_SUCCESS => Ok(()),
            Ok(reply) => {
                self.undo_join(name);
                Err(ClientError::Rejected(reply))
            }
            Err(e) => {
                self.undo_join(name);
                Err(e)
            }
        }
    }

    /// Undo the early `InLobby` transition after a failed join, unless a
    /// game start already moved the phase on.
    fn undo_join(&self, name: &str) {
        let mut state = self.core.lock_state();
        let still_waiting = matches!(
            state.phase(),
            SessionPhase::InLobby { lobby } if lobby == name
        );
        if still_waiting {
            let _ = state.leave_lobby();
        }
    }

    /// Leave the current lobby, or the table after game over. Dereferences
    /// the finished game.
    pub fn leave_lobby(&self) -> Result<(), ClientError> {
        {
            let state = self.core.lock_state();
            let mut staged = state.phase().clone();
            staged.apply_mut(PhaseEvent::LeaveLobby)?;
        }

        let _requests = self.core.lock_requests();
        self.core.exchange(&Command::LeaveLobby)?;
        let mut state = self.core.lock_state();
        state.leave_lobby().map_err(ClientError::from)?;
        Ok(())
    }

    /// Submit the catch amount for the current round.
    ///
    /// At most one submission per round: a second attempt fails with
    /// [`ClientError::AlreadyActed`] before any network send, as does an
    /// out-of-range amount. The request lock makes the check-then-send
    /// atomic with respect to the deadline timer's fallback.
    pub fn submit_catch(&self, amount: u32) -> Result<(), ClientError> {
        let _requests = self.core.lock_requests();

        let round = {
            let state = self.core.lock_state();
            let game = state.game.as_ref().ok_or(ClientError::NotInGame)?;
            if !game.settings.catch_in_range(amount) {
                return Err(ClientError::InvalidCatch {
                    amount,
                    min: game.settings.min_catch,
                    max: game.settings.max_catch,
                });
            }
            let round = state
                .phase()
                .active_round()
                .ok_or(ClientError::NotInGame)?;
            if state.local_has_acted() {
                return Err(ClientError::AlreadyActed);
            }
            round
        };

        let reply = self.core.exchange(&Command::ChooseAmount { amount })?;
        if reply != protocol::REPLY_CAUGHT {
            return Err(ClientError::Rejected(reply));
        }
        self.core.lock_state().record_local_catch(round, amount);
        Ok(())
    }

    /// Send a chat message to the table. The entry appears in the game log
    /// when the server echoes it back as a `MESSAGE_SENT` push.
    pub fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        {
            let state = self.core.lock_state();
            if !state.phase().in_game() {
                return Err(ClientError::NotInGame);
            }
        }

        let _requests = self.core.lock_requests();
        let reply = self.core.exchange(&Command::Communicate {
            message: text.to_string(),
        })?;
        if reply == protocol::REPLY_MESSAGE_RECEIVED {
            Ok(())
        } else {
            Err(ClientError::Rejected(reply))
        }
    }

    /// Authenticate as lobby administrator. Returns whether the server
    /// accepted the password.
    pub fn become_admin(&self, password: &str) -> Result<bool, ClientError> {
        let _requests = self.core.lock_requests();
        let reply = self.core.exchange(&Command::BecomeAdmin {
            password: password.to_string(),
        })?;
        match reply.as_str() {
            protocol::REPLY_ADMIN_OK => {
                if let Some(identity) = self.core.lock_state().identity.as_mut() {
                    identity.is_admin = true;
                }
                Ok(true)
            }
            protocol::REPLY_ADMIN_FAILED => Ok(false),
            other => Err(ClientError::Protocol(format!(
                "unexpected BECOME_ADMIN reply {:?}",
                other
            ))),
        }
    }

    /// Continue past the round summary screen. Purely local: switches to
    /// the next round or, after the last round, to game over (with a
    /// scene change). Returns whether the game is over.
    pub fn acknowledge_round_summary(&self) -> Result<bool, ClientError> {
        let over = {
            let mut state = self.core.lock_state();
            state.acknowledge_summary().map_err(|e| match e {
                crate::state::ApplyError::Transition(t) => ClientError::Phase(t),
                other => ClientError::Protocol(other.to_string()),
            })?
        };
        if over {
            self.core.observer.scene_changed(Scene::GameOver);
        }
        Ok(over)
    }

    /// Tear the session down: stop the active timer, shut the socket, and
    /// join the dispatcher. Blocked callers are unblocked with a
    /// transport error.
    pub fn disconnect(&mut self) {
        {
            let mut state = self.core.lock_state();
            if let Some(timer) = state.game.as_mut().and_then(|g| g.take_timer()) {
                timer.stop();
            }
            state.set_connected(false);
        }
        self.core.transport.disconnect();
        if let Some(handle) = self.dispatcher.take() {
            let _ = handle.join();
        }
        info!("session disconnected");
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_username_shape() {
        let identity = SessionClient::offline_username();
        assert!(identity.name.starts_with("deckhand-"));
        assert!(!identity.is_admin);
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.port, 7119);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }
}
