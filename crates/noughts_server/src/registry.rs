//! Live connections, sessions and matches, and request dispatch.

use crate::error::ServerError;
use crate::matchup::Match;
use crate::outbox::Outbox;
use crate::protocol::{ConnectionId, MatchId, Request, Response};
use crate::session::{AuthState, Session};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// Shared handle to one match.
pub type SharedMatch = Arc<Mutex<Match>>;

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every live connection, session and match.
///
/// Cheap to clone; all clones share the same state. Map locks are held only
/// for a single lookup, insert or remove. Lock order is match, then map, then
/// session state.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    connections: Arc<Mutex<HashMap<ConnectionId, Outbox>>>,
    sessions: Arc<Mutex<HashMap<ConnectionId, Arc<Session>>>>,
    matches: Arc<Mutex<HashMap<MatchId, SharedMatch>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating registry");
        Self::default()
    }

    /// Registers a freshly accepted connection.
    #[instrument(skip(self, outbox), fields(connection = %outbox.connection()))]
    pub fn connect(&self, outbox: Outbox) {
        debug!("Connection registered");
        lock(&self.connections).insert(outbox.connection(), outbox);
    }

    /// Forgets a closed connection and releases whatever its session held.
    ///
    /// A host's match is torn down; a guest's seat is freed. Responses already
    /// queued for the connection stay queued for the transport to flush.
    #[instrument(skip(self))]
    pub fn disconnect(&self, connection: ConnectionId) {
        lock(&self.connections).remove(&connection);
        let Some(session) = lock(&self.sessions).remove(&connection) else {
            debug!("Unauthenticated connection closed");
            return;
        };
        info!(token = %session.token(), "Player disconnected");
        if session.state() == AuthState::InMatch
            && let Err(err) = self.depart(&session, None)
        {
            debug!(error = %err, "Nothing to release on disconnect");
        }
    }

    /// Routes one decoded request to its handler.
    ///
    /// Any handler error becomes a single error response to the requester.
    #[instrument(skip(self, request), fields(kind = tracing::field::Empty))]
    pub fn handle(&self, connection: ConnectionId, request: Request) {
        let kind: &'static str = (&request).into();
        tracing::Span::current().record("kind", kind);
        debug!(?request, "Dispatching request");

        let result = match request {
            Request::Authenticate { player_token } => {
                self.authenticate(connection, player_token.as_deref())
            }
            Request::CreateMatch { match_id } => self.create_match(connection, match_id),
            Request::JoinMatch { match_id } => self.join_match(connection, match_id),
            Request::LeaveMatch { match_id } => self.leave_match(connection, match_id),
            Request::PlaceMark { match_id, position } => {
                self.place_mark(connection, match_id, position)
            }
            Request::ResetMatch { match_id } => self.reset_match(connection, match_id),
            Request::Sync => self.sync(connection),
            Request::GetStatistics => self.statistics(connection),
        };

        if let Err(err) = result {
            self.reject(connection, &err);
        }
    }

    /// Reports an error to one connection.
    pub fn reject(&self, connection: ConnectionId, err: &ServerError) {
        warn!(%connection, kind = %err.kind, error = %err, "Request rejected");
        self.send_to(connection, Response::from(err));
    }

    /// Lifecycle state of a connection.
    pub fn auth_state(&self, connection: ConnectionId) -> AuthState {
        lock(&self.sessions)
            .get(&connection)
            .map_or(AuthState::Unauthenticated, |s| s.state())
    }

    /// True if a live match is registered under `match_id`.
    pub fn contains_match(&self, match_id: MatchId) -> bool {
        lock(&self.matches).contains_key(&match_id)
    }

    /// Number of authenticated sessions.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub(crate) fn send_to(&self, connection: ConnectionId, response: Response) -> bool {
        match lock(&self.connections).get(&connection) {
            Some(outbox) => outbox.send(response),
            None => {
                warn!(%connection, "No outbox for connection");
                false
            }
        }
    }

    pub(crate) fn outbox(&self, connection: ConnectionId) -> Option<Outbox> {
        lock(&self.connections).get(&connection).cloned()
    }

    pub(crate) fn session(&self, connection: ConnectionId) -> Result<Arc<Session>, ServerError> {
        lock(&self.sessions)
            .get(&connection)
            .cloned()
            .ok_or_else(ServerError::not_authenticated)
    }

    pub(crate) fn replace_session(&self, session: Arc<Session>) -> Option<Arc<Session>> {
        lock(&self.sessions).insert(session.connection(), session)
    }

    pub(crate) fn take_session(&self, connection: ConnectionId) -> Option<Arc<Session>> {
        lock(&self.sessions).remove(&connection)
    }

    pub(crate) fn find_match(&self, match_id: MatchId) -> Result<SharedMatch, ServerError> {
        lock(&self.matches)
            .get(&match_id)
            .cloned()
            .ok_or_else(|| ServerError::match_not_found(match_id))
    }

    /// Registers a new match unless the id is live.
    pub(crate) fn insert_match(
        &self,
        match_id: MatchId,
        entry: SharedMatch,
    ) -> Result<(), ServerError> {
        let mut matches = lock(&self.matches);
        if matches.contains_key(&match_id) {
            return Err(ServerError::rejected(format!(
                "Match id {} is already in use",
                match_id
            )));
        }
        matches.insert(match_id, entry);
        Ok(())
    }

    /// Unregisters `entry`, but only if it is still the match under its id.
    pub(crate) fn remove_match(&self, match_id: MatchId, entry: &SharedMatch) {
        let mut matches = lock(&self.matches);
        if matches
            .get(&match_id)
            .is_some_and(|live| Arc::ptr_eq(live, entry))
        {
            matches.remove(&match_id);
            info!(match_id, "Match removed");
        }
    }
}
