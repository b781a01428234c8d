//! Per-connection player sessions.

use crate::error::ServerError;
use crate::outbox::Outbox;
use crate::protocol::{ConnectionId, MatchId, PlayerToken, Response};
use crate::registry::lock;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Where a connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AuthState {
    /// Connected but not yet authenticated. Never re-entered.
    Unauthenticated,
    /// Authenticated and not part of a match.
    Idle,
    /// Host or guest of a match.
    InMatch,
}

#[derive(Debug, Clone, Copy)]
struct SessionState {
    auth: AuthState,
    current_match: Option<MatchId>,
}

/// Server-side state of one authenticated connection.
///
/// The mutable part sits behind its own lock, which is always the innermost
/// lock taken and is never held while acquiring another.
#[derive(Debug)]
pub struct Session {
    connection: ConnectionId,
    token: PlayerToken,
    outbox: Outbox,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates an idle session for a freshly authenticated connection.
    #[instrument(skip(outbox), fields(connection = %outbox.connection()))]
    pub fn authenticated(token: PlayerToken, outbox: Outbox) -> Self {
        debug!(%token, "Session authenticated");
        Self {
            connection: outbox.connection(),
            token,
            outbox,
            state: Mutex::new(SessionState {
                auth: AuthState::Idle,
                current_match: None,
            }),
        }
    }

    /// Connection owning this session.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Player token.
    pub fn token(&self) -> PlayerToken {
        self.token
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        lock(&self.state).auth
    }

    /// Match the session last entered, if still in one.
    pub fn current_match(&self) -> Option<MatchId> {
        lock(&self.state).current_match
    }

    /// Fails unless the session is in a match.
    pub fn require_in_match(&self) -> Result<MatchId, ServerError> {
        let state = lock(&self.state);
        match (state.auth, state.current_match) {
            (AuthState::InMatch, Some(id)) => Ok(id),
            _ => Err(ServerError::not_in_match()),
        }
    }

    /// Fails if the session is already in a match.
    pub fn require_idle(&self) -> Result<(), ServerError> {
        match self.state() {
            AuthState::InMatch => Err(ServerError::already_in_match()),
            _ => Ok(()),
        }
    }

    /// Idle -> InMatch.
    pub(crate) fn enter_match(&self, match_id: MatchId) {
        let mut state = lock(&self.state);
        state.auth = AuthState::InMatch;
        state.current_match = Some(match_id);
        debug!(connection = %self.connection, match_id, "Session entered match");
    }

    /// InMatch -> Idle.
    pub(crate) fn release(&self) {
        let mut state = lock(&self.state);
        state.auth = AuthState::Idle;
        state.current_match = None;
        debug!(connection = %self.connection, "Session released from match");
    }

    /// Queues a response for this session's connection.
    pub fn send(&self, response: Response) -> bool {
        self.outbox.send(response)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.connection == other.connection
    }
}

impl Eq for Session {}
