//! Round deadline timer.
//!
//! One repeating one-second tick per round. Each tick decrements the
//! remaining seconds; crossing the warning threshold signals urgency to
//! the UI, crossing the nudge threshold (with no local action yet) forces
//! the catch-entry screen. On expiry the timer becomes a transport caller
//! itself: under the session request lock it re-checks that the round is
//! still current and the player has not acted, and only then submits the
//! minimum legal catch as the fallback action.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::protocol::Command;
use crate::session::SessionCore;

/// Timer thresholds and tick length. The tick is one second in
/// production; tests compress it.
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Length of one countdown tick.
    pub tick: Duration,
    /// Remaining seconds at or below which the UI is told (once per
    /// round) to highlight urgency.
    pub warn_threshold: u32,
    /// Remaining seconds at or below which an inactive player is pushed
    /// (once per round) to the catch-entry screen. Zero disables the
    /// nudge.
    pub nudge_threshold: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            warn_threshold: 10,
            nudge_threshold: 30,
        }
    }
}

/// Handle to a running round timer, stored on the game. Dropping the
/// handle does not stop the countdown; call [`TimerHandle::stop`].
#[derive(Debug)]
pub struct TimerHandle {
    round: u32,
    remaining: Arc<AtomicU32>,
    stopped: Arc<AtomicBool>,
}

impl TimerHandle {
    /// The round this timer is bound to.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Seconds left on the countdown.
    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Relaxed)
    }

    /// Cancel the countdown. The tick thread exits on its next tick and
    /// performs no fallback.
    pub(crate) fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }
}

/// Start the deadline timer for one round. `duration` is in countdown
/// seconds (already extended for communication rounds).
pub(crate) fn start(core: Arc<SessionCore>, round: u32, duration: u32) -> TimerHandle {
    let remaining = Arc::new(AtomicU32::new(duration));
    let stopped = Arc::new(AtomicBool::new(false));
    let handle = TimerHandle {
        round,
        remaining: Arc::clone(&remaining),
        stopped: Arc::clone(&stopped),
    };

    let config = core.timer_config.clone();
    thread::Builder::new()
        .name(format!("round-{}-deadline", round))
        .spawn(move || run(core, round, remaining, stopped, config))
        .expect("failed to spawn timer thread");

    handle
}

fn run(
    core: Arc<SessionCore>,
    round: u32,
    remaining: Arc<AtomicU32>,
    stopped: Arc<AtomicBool>,
    config: TimerConfig,
) {
    // Each signal fires at most once per round, on the first tick at or
    // below its threshold. Rounds shorter than a threshold still get the
    // signal on their first tick.
    let mut warned = false;
    let mut nudged = false;
    loop {
        thread::sleep(config.tick);
        if stopped.load(Ordering::Relaxed) {
            return;
        }

        let left = remaining
            .load(Ordering::Relaxed)
            .saturating_sub(1);
        remaining.store(left, Ordering::Relaxed);

        if !warned && left <= config.warn_threshold && left > 0 {
            warned = true;
            core.observer.deadline_warning(left);
        }
        if !nudged && left <= config.nudge_threshold && left > 0 && !local_acted(&core, round) {
            nudged = true;
            core.observer.force_catch_entry();
        }
        if left == 0 {
            break;
        }
    }

    stopped.store(true, Ordering::Relaxed);
    fallback(&core, round);
}

/// Whether the local player already acted, or a resolution advanced the
/// game past the timer's round. The game's round counter is the reference
/// here, not the phase: an unacknowledged summary screen must not count
/// as having acted for the round behind it.
fn local_acted(core: &SessionCore, round: u32) -> bool {
    let state = core.lock_state();
    match state.game.as_ref() {
        Some(game) => game.current_round != round || state.local_has_acted(),
        None => true,
    }
}

/// Deadline expired: submit the minimum legal catch on the player's
/// behalf, unless a resolution or a manual submission got there first.
///
/// The whole check-then-send runs under the request lock, so it cannot
/// interleave with a concurrent manual `submit_catch` for the same round.
/// A failure here is surfaced as a UI alert, never a crash, since the server
/// resolves the round on its own timeout regardless.
fn fallback(core: &SessionCore, round: u32) {
    let _requests = core.lock_requests();

    let min_catch = {
        let state = core.lock_state();
        match state.game.as_ref() {
            Some(game) if game.current_round == round && !state.local_has_acted() => {
                game.settings.min_catch
            }
            _ => return,
        }
    };

    info!("round {} deadline expired, submitting minimum catch {}", round, min_catch);
    let reply = core.exchange(&Command::ChooseAmount { amount: min_catch });
    match reply {
        Ok(text) if text == crate::protocol::REPLY_CAUGHT => {
            // The round may have resolved while the reply was in flight;
            // record_local_catch re-checks before writing.
            core.lock_state().record_local_catch(round, min_catch);
        }
        Ok(text) => {
            warn!("fallback catch rejected: {}", text);
            core.observer
                .alert(&format!("Automatic catch submission rejected: {}", text));
        }
        Err(e) => {
            warn!("fallback catch failed: {}", e);
            core.observer
                .alert(&format!("Automatic catch submission failed: {}", e));
        }
    }
}
