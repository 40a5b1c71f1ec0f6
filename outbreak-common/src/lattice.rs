use serde::{Deserialize, Serialize};

/// A cell on the square lattice. `x` is the row and `y` the column, both in `0..size`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

/// One of the eight compass offsets an agent can travel along.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    pub dx: i32,
    pub dy: i32,
}

/// The eight compass offsets, clockwise starting from the upper-left diagonal.
pub const DIRECTIONS: [Direction; 8] = [
    Direction::new(-1, -1),
    Direction::new(-1, 0),
    Direction::new(-1, 1),
    Direction::new(0, 1),
    Direction::new(1, 1),
    Direction::new(1, 0),
    Direction::new(1, -1),
    Direction::new(0, -1),
];

impl Direction {
    #[inline(always)]
    pub const fn new(dx: i32, dy: i32) -> Self { Self { dx, dy } }
}

impl Cell {
    #[inline(always)]
    pub fn new(x: usize, y: usize) -> Self { Self { x, y } }

    /// Maps a flat lattice index (row-major) back to a cell.
    #[inline(always)]
    pub fn from_index(index: usize, size: usize) -> Self {
        Self::new(index / size, index % size)
    }

    /// Row-major flat index of this cell on a `size x size` lattice.
    #[inline(always)]
    pub fn index(self, size: usize) -> usize { self.x * size + self.y }

    /// The neighbouring cell one step along `dir`, or `None` when it falls off the lattice.
    #[inline(always)]
    pub fn step(self, dir: Direction, size: usize) -> Option<Cell> {
        let nx = self.x as i64 + dir.dx as i64;
        let ny = self.y as i64 + dir.dy as i64;
        let bound = size as i64;
        if nx >= 0 && nx < bound && ny >= 0 && ny < bound {
            Some(Cell::new(nx as usize, ny as usize))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_row_major_layout() {
        let cell = Cell::from_index(13, 5);
        assert_eq!(cell, Cell::new(2, 3));
        assert_eq!(cell.index(5), 13);
    }

    #[test]
    fn step_stays_inside_lattice() {
        let corner = Cell::new(0, 0);
        assert_eq!(corner.step(Direction::new(-1, 0), 4), None);
        assert_eq!(corner.step(Direction::new(0, -1), 4), None);
        assert_eq!(corner.step(Direction::new(1, 1), 4), Some(Cell::new(1, 1)));

        let far = Cell::new(3, 3);
        assert_eq!(far.step(Direction::new(1, 0), 4), None);
        assert_eq!(far.step(Direction::new(-1, -1), 4), Some(Cell::new(2, 2)));
    }

    #[test]
    fn compass_offsets_are_distinct_and_non_zero() {
        for (i, a) in DIRECTIONS.iter().enumerate() {
            assert!(a.dx != 0 || a.dy != 0);
            for b in &DIRECTIONS[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
