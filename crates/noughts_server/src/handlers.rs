//! Request handlers.
//!
//! Each handler validates the caller's session and match, mutates under the
//! match lock, and queues every resulting notice before releasing it.

use crate::error::ServerError;
use crate::matchup::Match;
use crate::protocol::{ConnectionId, MatchId, Operation, PlayerToken, Position, Response};
use crate::registry::{Registry, SharedMatch, lock};
use crate::session::{AuthState, Session};
use derive_new::new;
use noughts_board::{Cell, Role};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument};

/// What a session gave up when it left a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub(crate) struct Departure {
    /// Match that was left.
    pub(crate) match_id: MatchId,
    /// Role the session held in it.
    pub(crate) role: Role,
}

/// Locks a match, treating a torn-down one as gone.
fn lock_open(entry: &SharedMatch) -> Result<MutexGuard<'_, Match>, ServerError> {
    let game = lock(entry);
    if game.is_closed() {
        return Err(ServerError::match_not_found(game.id()));
    }
    Ok(game)
}

impl Registry {
    /// Binds a player token to the connection.
    ///
    /// A previous session on the same connection is displaced first and
    /// leaves its match the same way a disconnect would.
    #[instrument(skip(self))]
    pub(crate) fn authenticate(
        &self,
        connection: ConnectionId,
        raw_token: Option<&str>,
    ) -> Result<(), ServerError> {
        let token = PlayerToken::parse_or_generate(raw_token)?;
        let outbox = self
            .outbox(connection)
            .ok_or_else(|| ServerError::validation("Unknown connection"))?;

        if let Some(old) = self.take_session(connection) {
            info!(old = %old.token(), "Displacing previous session");
            if old.state() == AuthState::InMatch {
                match self.depart(&old, None) {
                    Ok(departure) => {
                        old.send(Response::MatchOperation {
                            match_id: departure.match_id,
                            operation: Operation::Leave,
                            host_token: (departure.role == Role::Host).then(|| old.token()),
                            guest_token: (departure.role == Role::Guest).then(|| old.token()),
                        });
                    }
                    Err(err) => debug!(error = %err, "Displaced session held no match"),
                }
            }
        }

        let session = Arc::new(Session::authenticated(token, outbox));
        self.replace_session(Arc::clone(&session));
        session.send(Response::Auth {
            player_token: token,
        });
        info!(%token, "Player joined");
        Ok(())
    }

    /// Opens a match with the caller as host.
    #[instrument(skip(self))]
    pub(crate) fn create_match(
        &self,
        connection: ConnectionId,
        match_id: MatchId,
    ) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        session.require_idle()?;

        let entry: SharedMatch = Arc::new(Mutex::new(Match::new(match_id, Arc::clone(&session))));
        let game = lock(&entry);
        self.insert_match(match_id, Arc::clone(&entry))?;
        session.enter_match(match_id);
        session.send(game.operation_notice(Operation::Create, None));
        info!(token = %session.token(), match_id, "Player created match");
        Ok(())
    }

    /// Seats the caller as guest of an open match.
    #[instrument(skip(self))]
    pub(crate) fn join_match(
        &self,
        connection: ConnectionId,
        match_id: MatchId,
    ) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        session.require_idle()?;

        let entry = self.find_match(match_id)?;
        let mut game = lock_open(&entry)?;
        game.attach_guest(Arc::clone(&session))?;
        session.enter_match(match_id);
        session.send(game.operation_notice(Operation::Join, None));
        info!(token = %session.token(), match_id, "Player joined match");
        Ok(())
    }

    /// Leaves the caller's match.
    #[instrument(skip(self))]
    pub(crate) fn leave_match(
        &self,
        connection: ConnectionId,
        match_id: MatchId,
    ) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        session.require_in_match()?;
        let departure = self.depart(&session, Some(match_id))?;
        info!(
            token = %session.token(),
            match_id = departure.match_id,
            role = %departure.role,
            "Player left match"
        );
        Ok(())
    }

    /// Removes `session` from its match.
    ///
    /// The match is resolved from `requested`, falling back to the session's
    /// own match. The leaver gets a finish notice and is released even if
    /// that notice cannot be delivered. A departing guest frees the seat; a
    /// departing host ends the match and releases the guest.
    #[instrument(skip(self, session), fields(token = %session.token()))]
    pub(crate) fn depart(
        &self,
        session: &Session,
        requested: Option<MatchId>,
    ) -> Result<Departure, ServerError> {
        let own = session.current_match();
        let entry = match requested {
            Some(id) => match (self.find_match(id), own) {
                (Ok(entry), _) => entry,
                (Err(_), Some(own)) if own != id => self.find_match(own)?,
                (Err(err), _) => return Err(err),
            },
            None => self.find_match(own.ok_or_else(ServerError::not_in_match)?)?,
        };

        let mut game = lock_open(&entry)?;
        let role = game.require_role(session.connection())?;
        let match_id = game.id();

        if !session.send(game.finish_notice()) {
            debug!("Finish notice not delivered, releasing anyway");
        }
        session.release();

        match role {
            Role::Guest => {
                game.detach_guest();
            }
            Role::Host => {
                game.close();
                self.remove_match(match_id, &entry);
            }
        }
        Ok(Departure::new(match_id, role))
    }

    /// Places the caller's mark.
    #[instrument(skip(self))]
    pub(crate) fn place_mark(
        &self,
        connection: ConnectionId,
        match_id: MatchId,
        position: Option<Position>,
    ) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        session.require_in_match()?;
        let entry = self.find_match(match_id)?;

        let position =
            position.ok_or_else(|| ServerError::validation("place_mark requires a position"))?;
        let cell = Cell::new(position.x, position.y)?;

        let mut game = lock_open(&entry)?;
        let role = game.require_role(connection)?;
        game.place(role, cell)?;
        Ok(())
    }

    /// Scores the round and clears the board.
    #[instrument(skip(self))]
    pub(crate) fn reset_match(
        &self,
        connection: ConnectionId,
        match_id: MatchId,
    ) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        session.require_in_match()?;
        let entry = self.find_match(match_id)?;

        let mut game = lock_open(&entry)?;
        game.require_role(connection)?;
        game.reset();
        Ok(())
    }

    /// Replays the caller's board.
    #[instrument(skip(self))]
    pub(crate) fn sync(&self, connection: ConnectionId) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        let match_id = session.require_in_match()?;
        let entry = self.find_match(match_id)?;

        let game = lock_open(&entry)?;
        let role = game.require_role(connection)?;
        let notices = game.replay(role);
        debug!(count = notices.len(), "Replaying placements");
        for notice in notices {
            session.send(notice);
        }
        Ok(())
    }

    /// Reports the caller's score, then the opponent's.
    #[instrument(skip(self))]
    pub(crate) fn statistics(&self, connection: ConnectionId) -> Result<(), ServerError> {
        let session = self.session(connection)?;
        let not_in_match = || ServerError::rejected("Not in a match");
        let match_id = session.current_match().ok_or_else(not_in_match)?;
        let entry = self.find_match(match_id).map_err(|_| not_in_match())?;

        let game = lock_open(&entry).map_err(|_| not_in_match())?;
        let role = game.role_of(connection).ok_or_else(not_in_match)?;
        for report in game.statistics(role) {
            session.send(report);
        }
        Ok(())
    }
}
