//! Grid coordinates and compass directions shared between client and server.
//!
//! The world is a grid of cells. `y` grows downward, so `Direction::Up`
//! decrements `y`.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A cell coordinate on a map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The point `distance` cells away in `direction`
    pub fn next_point(&self, direction: Direction, distance: i32) -> Point {
        let (dx, dy) = direction.offset();
        Point::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// Chebyshev range check: both axes within `range` cells
    pub fn in_range(&self, other: Point, range: i32) -> bool {
        (self.x - other.x).abs() <= range && (self.y - other.y).abs() <= range
    }

    /// Chebyshev distance to another point
    pub fn distance(&self, other: Point) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The eight compass directions, clockwise from `Up`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    #[default]
    Up = 0,
    UpRight = 1,
    Right = 2,
    DownRight = 3,
    Down = 4,
    DownLeft = 5,
    Left = 6,
    UpLeft = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::UpRight,
        Direction::Right,
        Direction::DownRight,
        Direction::Down,
        Direction::DownLeft,
        Direction::Left,
        Direction::UpLeft,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Cell offset of one step in this direction
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::UpRight => (1, -1),
            Self::Right => (1, 0),
            Self::DownRight => (1, 1),
            Self::Down => (0, 1),
            Self::DownLeft => (-1, 1),
            Self::Left => (-1, 0),
            Self::UpLeft => (-1, -1),
        }
    }

    /// Next direction clockwise
    pub fn next(&self) -> Self {
        Self::ALL[(self.as_u8() as usize + 1) % 8]
    }

    /// Next direction counter-clockwise
    pub fn previous(&self) -> Self {
        Self::ALL[(self.as_u8() as usize + 7) % 8]
    }

    /// Direction pointing from `source` toward `dest`.
    /// Returns `Up` when both points are equal.
    pub fn from_points(source: Point, dest: Point) -> Self {
        use std::cmp::Ordering::*;
        match (source.x.cmp(&dest.x), source.y.cmp(&dest.y)) {
            (Less, Less) => Self::DownRight,
            (Less, Greater) => Self::UpRight,
            (Less, Equal) => Self::Right,
            (Greater, Less) => Self::DownLeft,
            (Greater, Greater) => Self::UpLeft,
            (Greater, Equal) => Self::Left,
            (Equal, Less) => Self::Down,
            (Equal, _) => Self::Up,
        }
    }

    pub fn random() -> Self {
        Self::ALL[rand::thread_rng().gen_range(0..8)]
    }
}
