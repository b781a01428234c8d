//! A single match between a host and an optional guest.

use crate::error::ServerError;
use crate::protocol::{ConnectionId, DRAW, MatchId, Operation, Response};
use crate::session::Session;
use derive_getters::Getters;
use noughts_board::{Cell, Outcome, Role, Round};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Win and loss counters for both roles. Only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Getters)]
pub struct Score {
    /// Rounds won by the host.
    host_wins: u32,
    /// Rounds won by the guest.
    guest_wins: u32,
    /// Rounds lost by the host.
    host_losses: u32,
    /// Rounds lost by the guest.
    guest_losses: u32,
}

impl Score {
    /// Books a finished round. A draw or undecided round changes nothing.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Won(Role::Host) => {
                self.host_wins += 1;
                self.guest_losses += 1;
            }
            Outcome::Won(Role::Guest) => {
                self.guest_wins += 1;
                self.host_losses += 1;
            }
            Outcome::Draw | Outcome::Undecided => {}
        }
    }

    /// (wins, losses) for one role.
    pub fn of(&self, role: Role) -> (u32, u32) {
        match role {
            Role::Host => (self.host_wins, self.host_losses),
            Role::Guest => (self.guest_wins, self.guest_losses),
        }
    }
}

/// One match. Every method expects the caller to hold the match's lock.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    host: Arc<Session>,
    guest: Option<Arc<Session>>,
    round: Round,
    score: Score,
    closed: bool,
}

impl Match {
    /// Opens a match hosted by `host`.
    #[instrument(skip(host), fields(host = %host.token()))]
    pub fn new(id: MatchId, host: Arc<Session>) -> Self {
        debug!(match_id = id, "Creating match");
        Self {
            id,
            host,
            guest: None,
            round: Round::new(),
            score: Score::default(),
            closed: false,
        }
    }

    /// Match id.
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Current round.
    pub fn round(&self) -> &Round {
        &self.round
    }

    /// Cumulative score.
    pub fn score(&self) -> &Score {
        &self.score
    }

    /// True once the host has torn the match down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Role the connection plays here, if any.
    pub fn role_of(&self, connection: ConnectionId) -> Option<Role> {
        if self.host.connection() == connection {
            Some(Role::Host)
        } else if self.guest.as_ref().map(|g| g.connection()) == Some(connection) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    /// Like [`Match::role_of`] but fails for non-participants.
    pub fn require_role(&self, connection: ConnectionId) -> Result<Role, ServerError> {
        self.role_of(connection).ok_or_else(|| {
            ServerError::rejected(format!("Not a participant of match {}", self.id))
        })
    }

    /// Session holding the given role.
    pub fn session(&self, role: Role) -> Option<&Arc<Session>> {
        match role {
            Role::Host => Some(&self.host),
            Role::Guest => self.guest.as_ref(),
        }
    }

    fn participants(&self) -> impl Iterator<Item = (Role, &Arc<Session>)> {
        std::iter::once((Role::Host, &self.host))
            .chain(self.guest.as_ref().map(|g| (Role::Guest, g)))
    }

    /// Seats a guest and tells the host who joined.
    ///
    /// # Errors
    ///
    /// Rejected if a guest is already seated.
    #[instrument(skip(self, guest), fields(match_id = self.id, guest = %guest.token()))]
    pub fn attach_guest(&mut self, guest: Arc<Session>) -> Result<(), ServerError> {
        if self.guest.is_some() {
            return Err(ServerError::rejected(format!("Match {} is full", self.id)));
        }
        let notice = self.operation_notice(Operation::Join, Some(&guest));
        self.guest = Some(guest);
        self.host.send(notice);
        info!("Guest joined");
        Ok(())
    }

    /// Removes the guest, keeping the match open, and tells the host.
    #[instrument(skip(self), fields(match_id = self.id))]
    pub fn detach_guest(&mut self) -> Option<Arc<Session>> {
        let guest = self.guest.take()?;
        self.host.send(self.operation_notice(Operation::Leave, Some(&guest)));
        info!(guest = %guest.token(), "Guest left, match stays open");
        Some(guest)
    }

    /// Ends the match: the guest gets a finish notice and is released.
    #[instrument(skip(self), fields(match_id = self.id))]
    pub fn close(&mut self) {
        self.closed = true;
        let notice = self.finish_notice();
        if let Some(guest) = self.guest.take() {
            guest.send(notice);
            guest.release();
            debug!(guest = %guest.token(), "Guest released by teardown");
        }
        info!("Match closed");
    }

    /// Places a mark for `mover` and notifies both players.
    ///
    /// On a decisive placement both players also receive a finish notice.
    ///
    /// # Errors
    ///
    /// Rejected without side effects when no guest is seated or the board
    /// refuses the move.
    #[instrument(skip(self, cell), fields(match_id = self.id, cell = %cell))]
    pub fn place(&mut self, mover: Role, cell: Cell) -> Result<Outcome, ServerError> {
        if self.guest.is_none() {
            return Err(ServerError::rejected("Waiting for an opponent"));
        }
        self.round.place(mover, cell)?;

        for (role, session) in self.participants() {
            session.send(Response::Placement {
                is_mine: role == mover,
                x: cell.x(),
                y: cell.y(),
            });
        }

        let outcome = self.round.outcome();
        if outcome.is_decided() {
            let notice = self.finish_notice();
            for (_, session) in self.participants() {
                session.send(notice.clone());
            }
            info!(%outcome, "Round decided");
        }
        debug!(board = %self.round.board(), "Board after placement");
        Ok(outcome)
    }

    /// Scores the current round, clears the board and notifies both players.
    ///
    /// Without a seated guest nothing is scored and the returned outcome is
    /// [`Outcome::Undecided`].
    #[instrument(skip(self), fields(match_id = self.id))]
    pub fn reset(&mut self) -> Outcome {
        let cleared = self.round.reset();
        let outcome = if self.guest.is_some() {
            cleared
        } else {
            Outcome::Undecided
        };
        self.score.record(outcome);
        for (_, session) in self.participants() {
            session.send(self.operation_notice(Operation::Reset, None));
        }
        info!(%outcome, score = ?self.score, "Round reset");
        outcome
    }

    /// Placement notices for every occupied cell, row-major, from `viewer`'s side.
    pub fn replay(&self, viewer: Role) -> Vec<Response> {
        self.round
            .occupied()
            .map(|(cell, owner)| Response::Placement {
                is_mine: owner == viewer,
                x: cell.x(),
                y: cell.y(),
            })
            .collect()
    }

    /// Statistics notices for `viewer`: own counts first, then the opponent's
    /// when one is seated.
    pub fn statistics(&self, viewer: Role) -> Vec<Response> {
        let report = |role: Role, is_mine: bool| {
            let (wins, losses) = self.score.of(role);
            Response::Statistics {
                wins,
                losses,
                is_mine,
            }
        };
        let mut reports = vec![report(viewer, true)];
        if self.session(viewer.opponent()).is_some() {
            reports.push(report(viewer.opponent(), false));
        }
        reports
    }

    /// Finish notice describing the current decision.
    pub fn finish_notice(&self) -> Response {
        let outcome = match self.round.outcome() {
            Outcome::Undecided => None,
            Outcome::Draw => Some(DRAW.to_string()),
            Outcome::Won(role) => self.session(role).map(|s| s.token().to_string()),
        };
        Response::Finish { outcome }
    }

    /// Lifecycle notice carrying the tokens known to the match.
    pub fn operation_notice(&self, operation: Operation, guest: Option<&Arc<Session>>) -> Response {
        Response::MatchOperation {
            match_id: self.id,
            operation,
            host_token: Some(self.host.token()),
            guest_token: guest.or(self.guest.as_ref()).map(|g| g.token()),
        }
    }
}
