use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::Position;

/// Represents errors that can occur within the grid operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("Position {position} is out of bounds for grid size ({rows}, {cols})")]
    OutOfBounds {
        position: Position,
        rows: usize,
        cols: usize,
    },
}

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order and is
/// addressed with [`Position`] (row first, column second).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a new grid with the specified dimensions, filled by a generator function.
    ///
    /// The generator receives the [`Position`] of each cell in row-major order.
    ///
    /// # Arguments
    ///
    /// * `rows`: The number of rows.
    /// * `cols`: The number of columns.
    /// * `f`: A function `FnMut(Position) -> T` to generate cell values.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    pub fn from_generator<F>(rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(Position) -> T,
    {
        let size = rows.checked_mul(cols).expect("Grid size overflow");
        let mut cells = Vec::with_capacity(size);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(Position { row, col }));
            }
        }
        Grid { rows, cols, cells }
    }

    /// Returns the number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    fn offset(&self, position: Position) -> Option<usize> {
        if self.contains(position) {
            Some(position.row * self.cols + position.col)
        } else {
            None
        }
    }

    /// Checks if the given position is within the grid boundaries.
    #[inline]
    pub fn contains(&self, position: Position) -> bool {
        position.row < self.rows && position.col < self.cols
    }

    /// Clamps a signed coordinate pair onto the nearest cell of the grid.
    ///
    /// # Arguments
    ///
    /// * `row`: Row index, possibly negative or past the last row.
    /// * `col`: Column index, possibly negative or past the last column.
    ///
    /// The grid must not be empty.
    pub fn clamp(&self, row: isize, col: isize) -> Position {
        let max_row = self.rows.saturating_sub(1) as isize;
        let max_col = self.cols.saturating_sub(1) as isize;
        Position {
            row: row.clamp(0, max_row) as usize,
            col: col.clamp(0, max_col) as usize,
        }
    }

    /// Sets the value of the cell at the given position.
    ///
    /// # Arguments
    ///
    /// * `position`: The cell to overwrite.
    /// * `value`: The new value.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::OutOfBounds`] if `position` lies outside the grid.
    pub fn set(&mut self, position: Position, value: T) -> Result<(), GridError> {
        let index = self.offset(position).ok_or(GridError::OutOfBounds {
            position,
            rows: self.rows,
            cols: self.cols,
        })?;
        self.cells[index] = value;
        Ok(())
    }

    /// Returns an iterator that yields `(Position, &T)` for each cell in row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = (Position, &T)> {
        let cols = self.cols;
        self.cells.iter().enumerate().map(move |(index, cell)| {
            (
                Position {
                    row: index / cols,
                    col: index % cols,
                },
                cell,
            )
        })
    }

    /// Returns an iterator over the rows of the grid, top to bottom.
    pub fn row_slices(&self) -> impl Iterator<Item = &[T]> {
        // chunks() rejects a zero size; an empty grid has no rows anyway.
        self.cells.chunks(self.cols.max(1))
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, position: Position) -> &Self::Output {
        match self.offset(position) {
            Some(index) => &self.cells[index],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, self.rows, self.cols
            ),
        }
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, position: Position) -> &mut Self::Output {
        let (rows, cols) = (self.rows, self.cols);
        match self.offset(position) {
            Some(index) => &mut self.cells[index],
            None => panic!(
                "Grid index {} out of bounds for grid size ({}, {})",
                position, rows, cols
            ),
        }
    }
}
