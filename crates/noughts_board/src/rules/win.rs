//! Win detection.

use crate::rules::is_full;
use crate::types::{Board, Cell, Outcome, Square};
use tracing::instrument;

/// Every straight line, as (row, column) pairs.
///
/// Scan order is fixed: rows top to bottom, columns left to right, then the
/// main diagonal and the anti-diagonal.
const LINES: [[(i32, i32); 3]; 8] = [
    // Rows
    [(1, 1), (1, 2), (1, 3)],
    [(2, 1), (2, 2), (2, 3)],
    [(3, 1), (3, 2), (3, 3)],
    // Columns
    [(1, 1), (2, 1), (3, 1)],
    [(1, 2), (2, 2), (3, 2)],
    [(1, 3), (2, 3), (3, 3)],
    // Diagonals
    [(1, 1), (2, 2), (3, 3)],
    [(1, 3), (2, 2), (3, 1)],
];

/// Scans the board for a decision.
///
/// Returns the owner of the first complete line found, [`Outcome::Draw`] if
/// the board is full with no line, and [`Outcome::Undecided`] otherwise. Pure:
/// repeated calls on an unmodified board return the same value.
#[instrument(skip(board))]
pub fn check_winner(board: &Board) -> Outcome {
    for line in LINES {
        let [a, b, c] = line.map(|(x, y)| square_at(board, x, y));
        if let Square::Occupied(role) = a
            && a == b
            && b == c
        {
            return Outcome::Won(role);
        }
    }

    if is_full(board) {
        Outcome::Draw
    } else {
        Outcome::Undecided
    }
}

fn square_at(board: &Board, x: i32, y: i32) -> Square {
    // LINES only holds in-range coordinates.
    Cell::new(x, y).map_or(Square::Empty, |cell| board.get(cell))
}
