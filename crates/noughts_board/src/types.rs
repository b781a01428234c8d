//! Core domain types for the board.

use crate::error::CoordinateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side length of the grid.
pub const BOARD_SIZE: usize = 3;

/// One of the two roles in a match, and the owner of a mark on the board.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// The player that created the match.
    Host,
    /// The player that joined the match.
    Guest,
}

impl Role {
    /// Returns the other role.
    pub fn opponent(self) -> Self {
        match self {
            Role::Host => Role::Guest,
            Role::Guest => Role::Host,
        }
    }

    fn symbol(self) -> char {
        match self {
            Role::Host => 'O',
            Role::Guest => 'X',
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Square {
    /// Nobody has placed here.
    #[default]
    Empty,
    /// Occupied by the given role.
    Occupied(Role),
}

/// A validated grid coordinate.
///
/// `x` is the row and `y` the column, both in `1..=3`. Construction through
/// [`Cell::new`] is the only way to obtain one, so every `Cell` is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    x: u8,
    y: u8,
}

impl Cell {
    /// Validates raw coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if either coordinate lies outside `1..=3`.
    pub fn new(x: i32, y: i32) -> Result<Self, CoordinateError> {
        let in_range = |v: i32| (1..=BOARD_SIZE as i32).contains(&v);
        if in_range(x) && in_range(y) {
            Ok(Self {
                x: x as u8,
                y: y as u8,
            })
        } else {
            Err(CoordinateError::new(x, y))
        }
    }

    /// Row, `1..=3`.
    pub fn x(&self) -> u8 {
        self.x
    }

    /// Column, `1..=3`.
    pub fn y(&self) -> u8 {
        self.y
    }

    /// All nine cells in row-major order.
    pub fn all() -> impl Iterator<Item = Cell> {
        (1..=BOARD_SIZE as u8)
            .flat_map(|x| (1..=BOARD_SIZE as u8).map(move |y| Cell { x, y }))
    }

    fn index(self) -> usize {
        (self.x as usize - 1) * BOARD_SIZE + (self.y as usize - 1)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 3x3 board.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    /// Squares in row-major order.
    squares: [Square; BOARD_SIZE * BOARD_SIZE],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the square at the given cell.
    pub fn get(&self, cell: Cell) -> Square {
        self.squares[cell.index()]
    }

    /// Sets the square at the given cell without any rule checks.
    pub fn set(&mut self, cell: Cell, square: Square) {
        self.squares[cell.index()] = square;
    }

    /// Checks if a cell is empty.
    pub fn is_empty(&self, cell: Cell) -> bool {
        self.get(cell) == Square::Empty
    }

    /// Returns all squares in row-major order.
    pub fn squares(&self) -> &[Square; BOARD_SIZE * BOARD_SIZE] {
        &self.squares
    }

    /// Clears every cell.
    pub fn clear(&mut self) {
        self.squares = [Square::Empty; BOARD_SIZE * BOARD_SIZE];
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(BOARD_SIZE * 2 + 1);
        writeln!(f, "{rule}")?;
        for row in self.squares.chunks(BOARD_SIZE) {
            write!(f, "|")?;
            for square in row {
                let symbol = match square {
                    Square::Empty => ' ',
                    Square::Occupied(role) => role.symbol(),
                };
                write!(f, "{symbol}|")?;
            }
            writeln!(f)?;
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

/// Result of scanning a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    /// No line and free cells remain.
    #[default]
    Undecided,
    /// The given role owns a complete line.
    Won(Role),
    /// Every cell is occupied and nobody owns a line.
    Draw,
}

impl Outcome {
    /// True for a win or a draw.
    pub fn is_decided(self) -> bool {
        self != Outcome::Undecided
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Undecided => write!(f, "undecided"),
            Outcome::Won(role) => write!(f, "{role} wins"),
            Outcome::Draw => write!(f, "draw"),
        }
    }
}
