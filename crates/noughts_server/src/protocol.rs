//! Wire-level request and response types.
//!
//! Both directions are JSON objects tagged by `kind`, carried inside the
//! length-prefixed frames of [`crate::codec`].

use crate::error::ServerError;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-chosen match number.
pub type MatchId = i32;

/// Opaque identity of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("conn-{}", _0)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw connection number.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stable player identity, chosen by the client or generated on authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerToken(Uuid);

impl PlayerToken {
    /// Generates a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Uses the supplied token, or generates one when it is absent or empty.
    ///
    /// # Errors
    ///
    /// Returns a validation [`ServerError`] if the token is not a UUID.
    pub fn parse_or_generate(raw: Option<&str>) -> Result<Self, ServerError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::generate()),
            Some(s) => Uuid::parse_str(s).map(Self).map_err(|e| {
                ServerError::validation(format!("Invalid player token '{}': {}", s, e))
            }),
        }
    }
}

/// Grid coordinates as sent by the client, validated by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Row, expected `1..=3`.
    pub x: i32,
    /// Column, expected `1..=3`.
    pub y: i32,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Request {
    /// Log in, optionally reusing a token.
    Authenticate {
        /// Token to adopt; generated if absent.
        #[serde(default)]
        player_token: Option<String>,
    },
    /// Open a new match as host.
    CreateMatch {
        /// Id to register the match under.
        match_id: MatchId,
    },
    /// Join an open match as guest.
    JoinMatch {
        /// Match to join.
        match_id: MatchId,
    },
    /// Leave the current match.
    LeaveMatch {
        /// Match to leave.
        match_id: MatchId,
    },
    /// Place a mark.
    PlaceMark {
        /// Match to play in.
        match_id: MatchId,
        /// Target cell; required.
        #[serde(default)]
        position: Option<Position>,
    },
    /// Score the finished round and clear the board.
    ResetMatch {
        /// Match to reset.
        match_id: MatchId,
    },
    /// Replay every occupied cell of the current match.
    Sync,
    /// Report win and loss counts.
    GetStatistics,
}

/// Operation echoed by a [`Response::MatchOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Match created.
    Create,
    /// A guest joined.
    Join,
    /// A player left.
    Leave,
    /// The round was reset.
    Reset,
}

/// Outcome text for a draw in [`Response::Finish`].
pub const DRAW: &str = "draw";

/// A message for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// The request was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// Authentication succeeded.
    Auth {
        /// Token now bound to the connection.
        player_token: PlayerToken,
    },
    /// A match lifecycle event.
    MatchOperation {
        /// Affected match.
        match_id: MatchId,
        /// What happened.
        operation: Operation,
        /// Host token, when relevant.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        host_token: Option<PlayerToken>,
        /// Guest token, when relevant.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guest_token: Option<PlayerToken>,
    },
    /// A mark on the board.
    Placement {
        /// Whether the receiver owns the mark.
        is_mine: bool,
        /// Row.
        x: u8,
        /// Column.
        y: u8,
    },
    /// Current decision of the match.
    Finish {
        /// Winner token, [`DRAW`], or `None` while undecided.
        outcome: Option<String>,
    },
    /// Score of one side.
    Statistics {
        /// Rounds won.
        wins: u32,
        /// Rounds lost.
        losses: u32,
        /// Whether these are the receiver's own counts.
        is_mine: bool,
    },
}

impl From<&ServerError> for Response {
    fn from(err: &ServerError) -> Self {
        Response::Error {
            message: err.message.clone(),
        }
    }
}
