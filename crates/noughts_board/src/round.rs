//! One round of play: the board plus turn bookkeeping.

use crate::error::MoveError;
use crate::rules::check_winner;
use crate::types::{Board, Cell, Outcome, Role, Square};
use tracing::{debug, instrument};

/// The board and whoever placed the most recent mark.
///
/// A round never accepts two consecutive placements from the same role and
/// never accepts a placement once decided, until [`Round::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Round {
    board: Board,
    last_mover: Option<Role>,
}

impl Round {
    /// Creates an empty round in which either role may open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Returns the role that placed the most recent mark.
    pub fn last_mover(&self) -> Option<Role> {
        self.last_mover
    }

    /// Current decision for the board.
    pub fn outcome(&self) -> Outcome {
        check_winner(&self.board)
    }

    /// Places a mark for `mover`.
    ///
    /// # Errors
    ///
    /// Returns [`MoveError`] without touching the board if the cell is taken,
    /// `mover` placed the previous mark, or the round is already decided.
    #[instrument(skip(self, cell), fields(cell = %cell))]
    pub fn place(&mut self, mover: Role, cell: Cell) -> Result<(), MoveError> {
        if !self.board.is_empty(cell) {
            return Err(MoveError::CellOccupied(cell));
        }
        if self.last_mover == Some(mover) {
            return Err(MoveError::OutOfTurn(mover));
        }
        let outcome = self.outcome();
        if outcome.is_decided() {
            return Err(MoveError::AlreadyDecided(outcome));
        }

        self.board.set(cell, Square::Occupied(mover));
        self.last_mover = Some(mover);
        debug!(%mover, "Mark placed");
        Ok(())
    }

    /// Clears the board and returns the outcome of the finished round.
    ///
    /// After a win the winner is recorded as `last_mover`, so the loser opens
    /// the next round. After a draw or an undecided round `last_mover` is
    /// kept and the role that did not place the final mark opens.
    #[instrument(skip(self))]
    pub fn reset(&mut self) -> Outcome {
        let outcome = self.outcome();
        if let Outcome::Won(winner) = outcome {
            self.last_mover = Some(winner);
        }
        self.board.clear();
        debug!(%outcome, next_opener = ?self.last_mover.map(Role::opponent), "Round reset");
        outcome
    }

    /// Occupied cells in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (Cell, Role)> + '_ {
        Cell::all().filter_map(|cell| match self.board.get(cell) {
            Square::Occupied(role) => Some((cell, role)),
            Square::Empty => None,
        })
    }
}
