//! Noughts board - pure game logic for a 3x3 two-player match.
//!
//! This crate knows nothing about connections, sessions or matches. It owns the
//! grid, validates coordinates, enforces turn alternation within a round and
//! decides wins and draws.
//!
//! # Example
//!
//! ```
//! use noughts_board::{Cell, Outcome, Role, Round};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut round = Round::new();
//! round.place(Role::Host, Cell::new(1, 1)?)?;
//! round.place(Role::Guest, Cell::new(2, 2)?)?;
//! assert_eq!(round.outcome(), Outcome::Undecided);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod round;
mod rules;
mod types;

pub use error::{CoordinateError, MoveError};
pub use round::Round;
pub use rules::{check_winner, is_full};
pub use types::{Board, Cell, Outcome, Role, Square, BOARD_SIZE};
