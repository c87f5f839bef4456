use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// A grid coordinate. Serialized as a two-element `[x, y]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two cells.
    pub fn distance(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn is_adjacent(self, other: Cell) -> bool {
        self.distance(other) == 1
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl From<Cell> for (i32, i32) {
    fn from(cell: Cell) -> Self {
        (cell.x, cell.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Neighbor expansion order: east, west, south, north.
const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Immutable playfield: dimensions plus the adversary's start and goal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    start: Cell,
    goal: Cell,
}

impl Grid {
    pub const STANDARD_SIZE: i32 = 15;

    pub fn new(width: i32, height: i32, start: Cell, goal: Cell) -> Result<Self, GameError> {
        if width <= 0 || height <= 0 {
            return Err(GameError::InvalidPosition {
                position: Cell::new(width, height),
                reason: "grid dimensions must be positive",
            });
        }
        let grid = Self {
            width,
            height,
            start,
            goal,
        };
        for cell in [start, goal] {
            if !grid.contains(cell) {
                return Err(GameError::InvalidPosition {
                    position: cell,
                    reason: "outside the grid",
                });
            }
        }
        if start == goal {
            return Err(GameError::InvalidPosition {
                position: goal,
                reason: "start and goal must differ",
            });
        }
        Ok(grid)
    }

    /// The 15x15 board: start on the west edge, goal straight across on the east edge.
    pub fn standard() -> Self {
        let mid = Self::STANDARD_SIZE / 2;
        Self {
            width: Self::STANDARD_SIZE,
            height: Self::STANDARD_SIZE,
            start: Cell::new(0, mid),
            goal: Cell::new(Self::STANDARD_SIZE - 1, mid),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn goal(&self) -> Cell {
        self.goal
    }

    pub fn contains(&self, cell: Cell) -> bool {
        (0..self.width).contains(&cell.x) && (0..self.height).contains(&cell.y)
    }

    /// Start and goal can never hold an obstacle.
    pub fn is_reserved(&self, cell: Cell) -> bool {
        cell == self.start || cell == self.goal
    }

    pub fn cell_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Row-major index into a dense per-cell buffer.
    pub fn index(&self, cell: Cell) -> Option<usize> {
        self.contains(cell)
            .then(|| (cell.y as usize) * (self.width as usize) + cell.x as usize)
    }

    /// In-bounds orthogonal neighbors in fixed E, W, S, N order.
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |(dx, dy)| Cell::new(cell.x + dx, cell.y + dy))
            .filter(|c| self.contains(*c))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::standard()
    }
}
