//! Server error types.

use derive_more::{Display, Error};
use noughts_board::{CoordinateError, MoveError};
use tracing::instrument;

/// Category of a rejected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorKind {
    /// The request is not permitted in the session's current state.
    Unauthorized,
    /// The referenced match does not exist.
    NotFound,
    /// The request is malformed.
    Validation,
    /// The request is well formed but the match rules decline it.
    Rejected,
}

/// Request error with location tracking.
///
/// Always reported back to the requesting connection; never fatal to it.
#[derive(Debug, Clone, Display, Error)]
#[display("{} at {}:{}", message, file, line)]
pub struct ServerError {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message sent to the client.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ServerError {
    /// Creates a new error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Session has not authenticated.
    #[track_caller]
    pub fn not_authenticated() -> Self {
        Self::new(ErrorKind::Unauthorized, "Not authenticated")
    }

    /// Session is already playing.
    #[track_caller]
    pub fn already_in_match() -> Self {
        Self::new(ErrorKind::Unauthorized, "Already in a match")
    }

    /// Session is not playing.
    #[track_caller]
    pub fn not_in_match() -> Self {
        Self::new(ErrorKind::Unauthorized, "Not in a match")
    }

    /// No live match has this id.
    #[track_caller]
    pub fn match_not_found(match_id: i32) -> Self {
        Self::new(ErrorKind::NotFound, format!("Match {} not found", match_id))
    }

    /// Malformed request.
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Rule rejection.
    #[track_caller]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejected, message)
    }
}

impl From<CoordinateError> for ServerError {
    #[track_caller]
    fn from(err: CoordinateError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<MoveError> for ServerError {
    #[track_caller]
    fn from(err: MoveError) -> Self {
        Self::rejected(err.to_string())
    }
}
