//! Wire protocol: newline-terminated UTF-8 lines of space-delimited tokens.
//!
//! Two server-to-client disciplines share the stream:
//!
//! - **Replies**: sent strictly in response to a client command, correlated
//!   positionally (the protocol carries no message IDs).
//! - **Pushes**: unsolicited, prefixed with the two-token marker
//!   `UPDATE <KIND>`.
//!
//! [`classify`] splits the stream accordingly; [`Command`] encodes the
//! client-to-server vocabulary. Free-text fields (lobby names, chat
//! messages) must not contain the field separator, so senders substitute
//! internal spaces with [`SPACE_SUBSTITUTE`] and receivers reverse it.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};

use crate::state::lobby::Lobby;

/// First token of every push line.
pub const PUSH_MARKER: &str = "UPDATE";

/// Reserved character substituted for spaces inside free-text fields.
/// Names and messages must not contain it themselves.
pub const SPACE_SUBSTITUTE: char = '|';

/// Reply confirming a catch submission.
pub const REPLY_CAUGHT: &str = "CAUGHT_SUCCESSFULLY";
/// Reply confirming a chat message.
pub const REPLY_MESSAGE_RECEIVED: &str = "MESSAGE_RECEIVED";
/// Reply confirming lobby creation.
pub const REPLY_CREATE_LOBBY_SUCCESS: &str = "CREATE_LOBBY_SUCCESS";
/// Reply confirming a lobby join.
pub const REPLY_JOIN_LOBBY_SUCCESS: &str = "JOIN_LOBBY_SUCCESS";
/// Replies to `BECOME_ADMIN`.
pub const REPLY_ADMIN_OK: &str = "BECOME_ADMIN_SUCCESSFUL";
pub const REPLY_ADMIN_FAILED: &str = "BECOME_ADMIN_FAILED";

/// Substitute internal spaces so a free-text value fits in one token.
pub fn escape_field(value: &str) -> String {
    value.replace(' ', &SPACE_SUBSTITUTE.to_string())
}

/// Reverse [`escape_field`].
pub fn unescape_field(token: &str) -> String {
    token.replace(SPACE_SUBSTITUTE, " ")
}

/// Client-to-server commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    RequestUsername,
    CreateLobby {
        name: String,
        max_players: u32,
        round_count: u32,
        round_duration: u32,
        comm_rounds: BTreeSet<u32>,
        comm_round_duration: u32,
        min_catch: u32,
        max_catch: u32,
    },
    JoinLobby { name: String },
    LeaveLobby,
    ChooseAmount { amount: u32 },
    Communicate { message: String },
    BecomeAdmin { password: String },
}

impl Command {
    /// Render the command as one protocol line (without the terminator).
    pub fn encode(&self) -> String {
        match self {
            Self::RequestUsername => "REQUEST_USERNAME".to_string(),
            Self::CreateLobby {
                name,
                max_players,
                round_count,
                round_duration,
                comm_rounds,
                comm_round_duration,
                min_catch,
                max_catch,
            } => format!(
                "CREATE_LOBBY {} {} {} {} {} {} {} {}",
                escape_field(name),
                max_players,
                round_count,
                round_duration,
                encode_comm_rounds(comm_rounds),
                comm_round_duration,
                min_catch,
                max_catch,
            ),
            Self::JoinLobby { name } => format!("JOIN_LOBBY {}", escape_field(name)),
            Self::LeaveLobby => "LEAVE_LOBBY".to_string(),
            Self::ChooseAmount { amount } => format!("CHOOSE_AMOUNT {}", amount),
            Self::Communicate { message } => {
                format!("COMMUNICATE {}", escape_field(message))
            }
            Self::BecomeAdmin { password } => {
                format!("BECOME_ADMIN {}", escape_field(password))
            }
        }
    }
}

/// Communication round numbers travel as one comma-separated token.
/// An empty set is encoded as `-`.
fn encode_comm_rounds(rounds: &BTreeSet<u32>) -> String {
    if rounds.is_empty() {
        return "-".to_string();
    }
    rounds
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_comm_rounds(token: &str) -> Result<BTreeSet<u32>, ParseError> {
    if token == "-" {
        return Ok(BTreeSet::new());
    }
    token
        .split(',')
        .map(|part| {
            part.parse()
                .map_err(|_| ParseError::bad_field("communication round", part))
        })
        .collect()
}

/// Payload of `UPDATE GAME_STARTED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameStart {
    pub opponents: [String; 2],
    pub round_count: u32,
    pub round_duration: u32,
    pub comm_rounds: BTreeSet<u32>,
    pub comm_round_duration: u32,
    pub min_catch: u32,
    pub max_catch: u32,
    pub island: u32,
    pub game_name: String,
}

/// One player's outcome inside `UPDATE ROUND_FINISHED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOutcome {
    pub name: String,
    pub caught: u32,
    pub profit: i64,
}

/// Payload of `UPDATE ROUND_FINISHED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    /// Resolved shrimp unit price for the round.
    pub price: u32,
    /// Exactly three entries, one per player.
    pub outcomes: Vec<PlayerOutcome>,
}

/// Server pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum Push {
    /// Wholesale replacement of the lobby list.
    Lobby(Vec<Lobby>),
    GameStarted(GameStart),
    RoundFinished(RoundResult),
    MessageSent {
        sender: String,
        message: String,
        sent_at: DateTime<Utc>,
    },
}

/// A server line, classified by discipline.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Push(Push),
    Reply(String),
}

/// Classify one raw line as a push or a reply.
///
/// Anything not starting with the push marker is a reply; correlation with
/// the issuing request is the caller's concern.
pub fn classify(line: &str) -> Result<Line, ParseError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    match trimmed.strip_prefix(PUSH_MARKER) {
        Some(rest) if rest.starts_with(' ') => parse_push(rest.trim_start()).map(Line::Push),
        _ => Ok(Line::Reply(trimmed.to_string())),
    }
}

fn parse_push(body: &str) -> Result<Push, ParseError> {
    let tokens: Vec<&str> = body.split(' ').filter(|t| !t.is_empty()).collect();
    let kind = *tokens.first().ok_or_else(|| ParseError::new(body, "empty push"))?;
    let args = &tokens[1..];

    match kind {
        "LOBBY" => Ok(Push::Lobby(
            args.iter()
                .map(|token| parse_lobby_listing(token))
                .collect::<Result<_, _>>()?,
        )),
        "GAME_STARTED" => parse_game_started(body, args),
        "ROUND_FINISHED" => parse_round_finished(body, args),
        "MESSAGE_SENT" => parse_message_sent(body, args),
        other => Err(ParseError::new(body, format!("unknown push kind {:?}", other))),
    }
}

/// Lobby listings travel as `name.count.max`. The two numeric fields are
/// split off from the right so lobby names may themselves contain dots.
fn parse_lobby_listing(token: &str) -> Result<Lobby, ParseError> {
    let mut parts = token.rsplitn(3, '.');
    let max = parts.next();
    let count = parts.next();
    let name = parts.next();
    match (name, count, max) {
        (Some(name), Some(count), Some(max)) if !name.is_empty() => {
            let player_count = count
                .parse()
                .map_err(|_| ParseError::bad_field("lobby player count", count))?;
            let capacity = max
                .parse()
                .map_err(|_| ParseError::bad_field("lobby capacity", max))?;
            Ok(Lobby::new(unescape_field(name), player_count, capacity))
        }
        _ => Err(ParseError::new(token, "lobby listing needs name.count.max")),
    }
}

fn parse_game_started(body: &str, args: &[&str]) -> Result<Push, ParseError> {
    if args.len() != 10 {
        return Err(ParseError::new(
            body,
            format!("GAME_STARTED expects 10 fields, got {}", args.len()),
        ));
    }
    Ok(Push::GameStarted(GameStart {
        opponents: [unescape_field(args[0]), unescape_field(args[1])],
        round_count: parse_num(args[2], "round count")?,
        round_duration: parse_num(args[3], "round duration")?,
        comm_rounds: parse_comm_rounds(args[4])?,
        comm_round_duration: parse_num(args[5], "communication round duration")?,
        min_catch: parse_num(args[6], "min catch")?,
        max_catch: parse_num(args[7], "max catch")?,
        island: parse_num(args[8], "island number")?,
        game_name: unescape_field(args[9]),
    }))
}

fn parse_round_finished(body: &str, args: &[&str]) -> Result<Push, ParseError> {
    // Price followed by three (name, catch, profit) triples.
    if args.len() != 10 {
        return Err(ParseError::new(
            body,
            format!("ROUND_FINISHED expects 10 fields, got {}", args.len()),
        ));
    }
    let price = parse_num(args[0], "shrimp price")?;
    let outcomes = args[1..]
        .chunks(3)
        .map(|chunk| {
            Ok(PlayerOutcome {
                name: unescape_field(chunk[0]),
                caught: parse_num(chunk[1], "caught amount")?,
                profit: chunk[2]
                    .parse()
                    .map_err(|_| ParseError::bad_field("round profit", chunk[2]))?,
            })
        })
        .collect::<Result<Vec<_>, ParseError>>()?;
    Ok(Push::RoundFinished(RoundResult { price, outcomes }))
}

fn parse_message_sent(body: &str, args: &[&str]) -> Result<Push, ParseError> {
    if args.len() != 3 {
        return Err(ParseError::new(
            body,
            format!("MESSAGE_SENT expects 3 fields, got {}", args.len()),
        ));
    }
    // Timestamps travel as Unix epoch seconds.
    let secs: i64 = args[2]
        .parse()
        .map_err(|_| ParseError::bad_field("message timestamp", args[2]))?;
    let sent_at = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ParseError::bad_field("message timestamp", args[2]))?;
    Ok(Push::MessageSent {
        sender: unescape_field(args[0]),
        message: unescape_field(args[1]),
        sent_at,
    })
}

fn parse_num(token: &str, field: &'static str) -> Result<u32, ParseError> {
    token.parse().map_err(|_| ParseError::bad_field(field, token))
}

/// Parse the `USERNAME <name> <isAdmin>` reply.
pub fn parse_username_reply(reply: &str) -> Result<(String, bool), ParseError> {
    let tokens: Vec<&str> = reply.split(' ').collect();
    match tokens.as_slice() {
        ["USERNAME", name, is_admin] => {
            let is_admin = is_admin
                .parse()
                .map_err(|_| ParseError::bad_field("isAdmin flag", is_admin))?;
            Ok((unescape_field(name), is_admin))
        }
        _ => Err(ParseError::new(reply, "expected USERNAME <name> <isAdmin>")),
    }
}

/// A line that does not match the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: String,
    pub reason: String,
}

impl ParseError {
    fn new(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            reason: reason.into(),
        }
    }

    fn bad_field(field: &'static str, token: &str) -> Self {
        Self::new(token, format!("invalid {}", field))
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {:?}", self.reason, self.line)
    }
}

impl std::error::Error for ParseError {}
