//! End-to-end session flow against a scripted mock server.
//!
//! Each test binds a local `TcpListener`, plays the server side of the
//! wire protocol from a script, and drives the real client through it.
//! Timer tests compress the one-second tick to a few milliseconds.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use shrimp_client::error::ClientError;
use shrimp_client::{
    ClientConfig, Scene, SessionClient, SessionObserver, SessionPhase, SessionState,
    TimerConfig,
};

// ── Test scaffolding ────────────────────────────────────────────────

/// Observer that records everything it is told.
#[derive(Default)]
struct Recorder {
    scenes: Mutex<Vec<Scene>>,
    alerts: Mutex<Vec<String>>,
    nudged: AtomicBool,
    lost: AtomicBool,
}

impl SessionObserver for Recorder {
    fn scene_changed(&self, scene: Scene) {
        self.scenes.lock().unwrap().push(scene);
    }

    fn force_catch_entry(&self) {
        self.nudged.store(true, Ordering::Relaxed);
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }

    fn connection_lost(&self) {
        self.lost.store(true, Ordering::Relaxed);
    }
}

/// Shared handle so the test keeps a `Recorder` the client also holds.
struct RecorderHandle(Arc<Recorder>);

impl SessionObserver for RecorderHandle {
    fn scene_changed(&self, scene: Scene) {
        self.0.scene_changed(scene);
    }

    fn force_catch_entry(&self) {
        self.0.force_catch_entry();
    }

    fn alert(&self, message: &str) {
        self.0.alert(message);
    }

    fn connection_lost(&self) {
        self.0.connection_lost();
    }
}

/// The server side of one scripted connection.
struct MockPeer {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl MockPeer {
    fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self {
            reader,
            writer: stream,
        }
    }

    /// Read one line and assert it matches the expected command.
    fn expect(&mut self, expected: &str) {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), expected);
    }

    /// Send one protocol line.
    fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).unwrap();
        self.writer.write_all(b"\n").unwrap();
        self.writer.flush().unwrap();
    }

    /// Assert that no line arrives within `window`.
    fn expect_silence(&mut self, window: Duration) {
        self.reader.get_ref().set_read_timeout(Some(window)).unwrap();
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {} // client hung up, also silence
            Ok(_) => panic!("unexpected line during silence window: {:?}", line),
            Err(_) => {} // timed out, as expected
        }
    }
}

fn start_server(
    script: impl FnOnce(MockPeer) + Send + 'static,
) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || script(MockPeer::accept(&listener)));
    (port, handle)
}

fn connect(port: u16, timer: TimerConfig, observer: Arc<Recorder>) -> SessionClient {
    let config = ClientConfig {
        host: "127.0.0.1".to_string(),
        port,
        connect_timeout: Duration::from_secs(2),
        timer,
    };
    SessionClient::connect(config, Box::new(RecorderHandle(observer))).unwrap()
}

/// Poll session state until the predicate holds or the timeout elapses.
fn wait_until(
    client: &SessionClient,
    timeout: Duration,
    predicate: impl Fn(&SessionState) -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if client.with_state(|state| predicate(state)) {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

const GAME_START: &str = "UPDATE GAME_STARTED p2 p3 4 60 2 30 10 50 7 IslandA";

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn full_session_flow() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.send("UPDATE LOBBY bay.1.3 cove.0.3");
        peer.expect("JOIN_LOBBY bay");
        peer.send("JOIN_LOBBY_SUCCESS");
        peer.expect("BECOME_ADMIN tidepool");
        peer.send("BECOME_ADMIN_FAILED");
        // Corrupt pushes are dropped; everything after them still arrives.
        peer.send("UPDATE WEATHER sunny");
        peer.send("UPDATE GAME_STARTED truncated");
        peer.send(GAME_START);
        peer.expect("CHOOSE_AMOUNT 20");
        peer.send("CAUGHT_SUCCESSFULLY");
        peer.expect("COMMUNICATE nice|haul");
        peer.send("MESSAGE_RECEIVED");
        peer.send("UPDATE MESSAGE_SENT olaf nice|haul 1700000000");
        peer.send("UPDATE ROUND_FINISHED 30 olaf 20 300 p2 15 225 p3 25 375");
        // Hold the connection until the client hangs up.
        let mut rest = String::new();
        let _ = peer.reader.read_line(&mut rest);
    });

    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, TimerConfig::default(), Arc::clone(&observer));

    let identity = client.request_username().unwrap();
    assert_eq!(identity.name, "olaf");
    assert!(!identity.is_admin);

    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.lobbies.len() == 2 && s.lobbies[0].name == "bay"
    }));

    client.join_lobby("bay").unwrap();
    assert!(!client.become_admin("tidepool").unwrap());

    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.game.as_ref().is_some_and(|g| g.current_round == 1)
    }));
    client.with_state(|s| {
        let game = s.game.as_ref().unwrap();
        assert_eq!(game.player_count(), 3);
        assert_eq!(game.name, "IslandA");
        assert_eq!(game.island, 7);
    });

    // Below the minimum: rejected before any send.
    let err = client.submit_catch(5).unwrap_err();
    assert!(matches!(
        err,
        ClientError::InvalidCatch { amount: 5, min: 10, max: 50 }
    ));

    client.submit_catch(20).unwrap();
    client.with_state(|s| assert_eq!(s.local_player().unwrap().caught(), Some(20)));

    // Second submission in the same round: rejected locally.
    let err = client.submit_catch(25).unwrap_err();
    assert!(matches!(err, ClientError::AlreadyActed));

    client.send_chat("nice haul").unwrap();
    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.game.as_ref().is_some_and(|g| !g.chat().is_empty())
    }));
    client.with_state(|s| {
        let entry = &s.game.as_ref().unwrap().chat()[0];
        assert_eq!(entry.sender, "olaf");
        assert_eq!(entry.message, "nice haul");
    });

    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.game.as_ref().is_some_and(|g| g.current_round == 2)
    }));
    client.with_state(|s| {
        let game = s.game.as_ref().unwrap();
        let me = game.player("olaf").unwrap();
        assert_eq!(me.current_total, 300);
        assert_eq!(me.previous_total, 0);
        assert!(!me.has_acted());
        let round = game.round(1).unwrap();
        assert_eq!(round.price(), 30);
        assert_eq!(round.total_catch(), 60);
    });

    // Round 2 of 4: acknowledging the summary continues the game.
    let over = client.acknowledge_round_summary().unwrap();
    assert!(!over);

    let scenes = observer.scenes.lock().unwrap().clone();
    assert!(scenes.contains(&Scene::GameStart));
    assert!(scenes.contains(&Scene::RoundSummary));

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn deadline_fallback_submits_minimum_catch() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.expect("JOIN_LOBBY bay");
        peer.send("JOIN_LOBBY_SUCCESS");
        // Round time 6 "seconds" at a 10 ms tick: expires fast.
        peer.send("UPDATE GAME_STARTED p2 p3 1 6 - 0 10 50 7 IslandA");
        peer.expect("CHOOSE_AMOUNT 10");
        peer.send("CAUGHT_SUCCESSFULLY");
        let mut rest = String::new();
        let _ = peer.reader.read_line(&mut rest);
    });

    let timer = TimerConfig {
        tick: Duration::from_millis(10),
        warn_threshold: 2,
        nudge_threshold: 3,
    };
    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, timer, Arc::clone(&observer));

    client.request_username().unwrap();
    client.join_lobby("bay").unwrap();

    // The user never acts; the timer must submit the minimum on expiry.
    assert!(wait_until(&client, Duration::from_secs(3), |s| {
        s.local_player().is_some_and(|p| p.caught() == Some(10))
    }));
    assert!(observer.nudged.load(Ordering::Relaxed));
    assert!(observer.alerts.lock().unwrap().is_empty());

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn no_fallback_after_manual_submission() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.expect("JOIN_LOBBY bay");
        peer.send("JOIN_LOBBY_SUCCESS");
        peer.send("UPDATE GAME_STARTED p2 p3 1 10 - 0 10 50 7 IslandA");
        peer.expect("CHOOSE_AMOUNT 15");
        peer.send("CAUGHT_SUCCESSFULLY");
        // The deadline passes; no second CHOOSE_AMOUNT may arrive.
        peer.expect_silence(Duration::from_millis(600));
    });

    let timer = TimerConfig {
        tick: Duration::from_millis(20),
        warn_threshold: 2,
        nudge_threshold: 0,
    };
    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, timer, Arc::clone(&observer));

    client.request_username().unwrap();
    client.join_lobby("bay").unwrap();
    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.game.is_some()
    }));

    client.submit_catch(15).unwrap();

    // Wait out the deadline window, then confirm the manual amount stuck.
    server.join().unwrap();
    client.with_state(|s| {
        assert_eq!(s.local_player().unwrap().caught(), Some(15));
    });
    client.disconnect();
}

#[test]
fn game_start_directly_after_join_reply() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.expect("JOIN_LOBBY bay");
        // The last player joining fills the lobby, so the game start
        // push follows the join reply back to back.
        peer.send("JOIN_LOBBY_SUCCESS");
        peer.send(GAME_START);
        let mut rest = String::new();
        let _ = peer.reader.read_line(&mut rest);
    });

    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, TimerConfig::default(), Arc::clone(&observer));

    client.request_username().unwrap();
    client.join_lobby("bay").unwrap();

    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        s.game.as_ref().is_some_and(|g| g.current_round == 1)
    }));

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn declined_join_leaves_phase_unchanged() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.expect("JOIN_LOBBY bay");
        peer.send("JOIN_LOBBY_FAILED");
        let mut rest = String::new();
        let _ = peer.reader.read_line(&mut rest);
    });

    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, TimerConfig::default(), Arc::clone(&observer));

    client.request_username().unwrap();
    let err = client.join_lobby("bay").unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));

    client.with_state(|s| assert_eq!(*s.phase(), SessionPhase::NoGame));

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn fallback_fires_while_summary_unacknowledged() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        peer.send("USERNAME olaf false");
        peer.expect("JOIN_LOBBY bay");
        peer.send("JOIN_LOBBY_SUCCESS");
        // Two rounds of 4 "seconds" each at a 10 ms tick.
        peer.send("UPDATE GAME_STARTED p2 p3 2 4 - 0 10 50 7 IslandA");
        peer.expect("CHOOSE_AMOUNT 10");
        peer.send("CAUGHT_SUCCESSFULLY");
        peer.send("UPDATE ROUND_FINISHED 30 olaf 10 100 p2 15 225 p3 25 375");
        // The summary screen stays up, yet round 2 runs out too.
        peer.expect("CHOOSE_AMOUNT 10");
        peer.send("CAUGHT_SUCCESSFULLY");
        let mut rest = String::new();
        let _ = peer.reader.read_line(&mut rest);
    });

    // Thresholds longer than the round: both must still fire once.
    let timer = TimerConfig {
        tick: Duration::from_millis(10),
        warn_threshold: 10,
        nudge_threshold: 30,
    };
    let observer = Arc::new(Recorder::default());
    let mut client = connect(port, timer, Arc::clone(&observer));

    client.request_username().unwrap();
    client.join_lobby("bay").unwrap();

    assert!(wait_until(&client, Duration::from_secs(3), |s| {
        s.game.as_ref().is_some_and(|g| g.current_round == 2)
            && s.local_player().is_some_and(|p| p.caught() == Some(10))
    }));
    assert!(observer.nudged.load(Ordering::Relaxed));
    assert!(observer.alerts.lock().unwrap().is_empty());

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn server_hangup_unblocks_pending_request() {
    let (port, server) = start_server(|mut peer| {
        peer.expect("REQUEST_USERNAME");
        // Never reply; drop the connection instead.
        drop(peer);
    });

    let observer = Arc::new(Recorder::default());
    let client = connect(port, TimerConfig::default(), Arc::clone(&observer));

    let err = client.request_username().unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));

    assert!(wait_until(&client, Duration::from_secs(2), |s| {
        !s.is_connected()
    }));
    assert!(observer.lost.load(Ordering::Relaxed));

    server.join().unwrap();
}
