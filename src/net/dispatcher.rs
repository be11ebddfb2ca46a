//! Packet dispatcher: the single background reader for a connection.
//!
//! Reads one line at a time, classifies it, and routes it: pushes mutate
//! session state and trigger observer callbacks, anything else is a reply
//! forwarded to the pending-reply channel. A malformed push is fatal for
//! that message only: it is logged and dropped so one corrupt line cannot
//! stop future delivery. The loop ends when the stream closes or errors,
//! which also drops the reply sink and unblocks any waiting caller.

use std::io::{BufRead, BufReader};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::net::reply::ReplySink;
use crate::observer::Scene;
use crate::protocol::{self, Line, Push};
use crate::session::SessionCore;
use crate::timer;

/// Spawn the dispatcher thread for an established connection.
pub(crate) fn spawn(
    core: Arc<SessionCore>,
    reader: BufReader<TcpStream>,
    sink: ReplySink,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("packet-dispatcher".to_string())
        .spawn(move || run(core, reader, sink))
        .expect("failed to spawn dispatcher thread")
}

fn run(core: Arc<SessionCore>, mut reader: BufReader<TcpStream>, sink: ReplySink) {
    let mut buffer = String::new();
    loop {
        buffer.clear();
        match reader.read_line(&mut buffer) {
            Ok(0) => {
                info!("server closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                info!("connection read failed: {}", e);
                break;
            }
        }

        match protocol::classify(&buffer) {
            Ok(Line::Reply(text)) => {
                debug!("reply: {}", text);
                sink.push(text);
            }
            Ok(Line::Push(push)) => {
                debug!("push: {:?}", push);
                apply_push(&core, push);
            }
            Err(e) => {
                // Drop the one bad message, keep the loop alive.
                warn!("dropping malformed line: {}", e);
            }
        }
    }

    teardown(&core);
    // `sink` drops here, failing any caller still waiting for a reply.
}

fn apply_push(core: &Arc<SessionCore>, push: Push) {
    match push {
        Push::Lobby(lobbies) => {
            core.lock_state().replace_lobbies(lobbies.clone());
            core.observer.lobbies_updated(&lobbies);
        }

        Push::GameStarted(start) => {
            let deadline = match core.lock_state().start_game(&start) {
                Ok(deadline) => deadline,
                Err(e) => {
                    warn!("dropping GAME_STARTED push: {}", e);
                    return;
                }
            };
            arm_timer(core, deadline.round, deadline.duration);
            core.observer.scene_changed(Scene::GameStart);
        }

        Push::RoundFinished(result) => {
            let (expired, next) = {
                let mut state = core.lock_state();
                match state.finish_round(&result) {
                    Ok(next) => {
                        let expired =
                            state.game.as_mut().and_then(|game| game.take_timer());
                        (expired, next)
                    }
                    Err(e) => {
                        warn!("dropping ROUND_FINISHED push: {}", e);
                        return;
                    }
                }
            };
            if let Some(timer) = expired {
                timer.stop();
            }
            if let Some(deadline) = next {
                arm_timer(core, deadline.round, deadline.duration);
            }
            core.observer.scene_changed(Scene::RoundSummary);
        }

        Push::MessageSent {
            sender,
            message,
            sent_at,
        } => {
            let appended = core
                .lock_state()
                .append_chat(sender.clone(), message.clone(), sent_at);
            match appended {
                Ok(()) => {
                    let entry = crate::state::ChatMessage {
                        sender,
                        message,
                        sent_at,
                    };
                    core.observer.chat_received(&entry);
                }
                Err(e) => warn!("dropping MESSAGE_SENT push: {}", e),
            }
        }
    }
}

/// Start the deadline timer for a round and park its handle on the game.
fn arm_timer(core: &Arc<SessionCore>, round: u32, duration: u32) {
    let handle = timer::start(Arc::clone(core), round, duration);
    let mut state = core.lock_state();
    if let Some(game) = state.game.as_mut() {
        if let Some(replaced) = game.set_timer(handle) {
            replaced.stop();
        }
    }
}

fn teardown(core: &Arc<SessionCore>) {
    let mut state = core.lock_state();
    if let Some(timer) = state.game.as_mut().and_then(|game| game.take_timer()) {
        timer.stop();
    }
    let was_connected = state.is_connected();
    state.set_connected(false);
    drop(state);

    if was_connected {
        core.observer.connection_lost();
    }
}
