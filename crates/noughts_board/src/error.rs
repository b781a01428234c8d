//! Board error types.

use crate::types::{Cell, Outcome, Role};
use derive_more::{Display, Error};

/// Coordinates outside the 3x3 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
#[display("Coordinates out of range: x = {}, y = {} (expected 1-3)", x, y)]
pub struct CoordinateError {
    /// Requested row.
    pub x: i32,
    /// Requested column.
    pub y: i32,
}

impl CoordinateError {
    /// Creates a new coordinate error.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A structurally valid placement that the rules decline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// The cell already carries a mark.
    #[display("Cell {} is already occupied", _0)]
    CellOccupied(#[error(not(source))] Cell),
    /// The role placed the previous mark as well.
    #[display("Not your turn: {} placed the last mark", _0)]
    OutOfTurn(#[error(not(source))] Role),
    /// The round is over until it is reset.
    #[display("Round already decided ({})", _0)]
    AlreadyDecided(#[error(not(source))] Outcome),
}
