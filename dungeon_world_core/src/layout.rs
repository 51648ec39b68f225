//! Static dungeon layouts described as text maps.
//!
//! One glyph per cell, one line per row:
//!
//! | glyph | cell |
//! |-------|------|
//! | `L` | lava |
//! | `W` | wall |
//! | `.` | walkable floor |
//! | `A` | agent start |
//! | `K` | key |
//! | `G` | goal |

use crate::{Position, environment::CellKind, map::Grid};

/// The 11x11 dungeon: a corridor network over a lava field, two keys in the
/// far corners and the goal next to the start.
pub const DEFAULT_LAYOUT: &str = "\
LLLLLLLLLLL
LL.......KL
LL.LLLLLLLL
WW.WWWLLLLL
W....WLLLLL
G.A..WWWWWW
W....WLLLLL
WW.WWWLLLLL
LL.LLLLLLLL
LL.......KL
LLLLLLLLLLL
";

/// Represents errors found while parsing a layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("layout is empty")]
    Empty,
    #[error("inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown glyph '{glyph}' at {position}")]
    UnknownGlyph { glyph: char, position: Position },
    #[error("no agent start ('A') found")]
    MissingStart,
    #[error("multiple agent starts found at {first} and {second}")]
    MultipleStarts { first: Position, second: Position },
    #[error("no goal ('G') found")]
    MissingGoal,
}

/// A parsed, validated layout: the initial grid plus the agent's start cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    grid: Grid<CellKind>,
    start: Position,
}

impl Layout {
    /// Parses a text map. Leading/trailing blank lines and surrounding
    /// whitespace on each row are ignored.
    ///
    /// # Arguments
    ///
    /// * `text`: One line per grid row, one glyph per cell (`A . W L K G`).
    ///
    /// # Errors
    ///
    /// Returns a [`LayoutError`] for an empty or ragged map, an unknown glyph,
    /// or a map without exactly one start and at least one goal.
    pub fn parse(text: &str) -> Result<Self, LayoutError> {
        let lines: Vec<Vec<char>> = text
            .trim()
            .lines()
            .map(|line| line.trim().chars().collect())
            .collect();

        let cols = lines.first().map_or(0, Vec::len);
        if cols == 0 {
            return Err(LayoutError::Empty);
        }
        for (row, line) in lines.iter().enumerate() {
            if line.len() != cols {
                return Err(LayoutError::InconsistentWidth {
                    row,
                    expected: cols,
                    found: line.len(),
                });
            }
        }

        let mut kinds: Vec<Vec<CellKind>> = Vec::with_capacity(lines.len());
        let mut start: Option<Position> = None;
        let mut has_goal = false;

        for (row, line) in lines.iter().enumerate() {
            let mut row_kinds = Vec::with_capacity(cols);
            for (col, &glyph) in line.iter().enumerate() {
                let position = Position { row, col };
                let kind = CellKind::from_glyph(glyph)
                    .ok_or(LayoutError::UnknownGlyph { glyph, position })?;
                match kind {
                    CellKind::Agent => {
                        if let Some(first) = start {
                            return Err(LayoutError::MultipleStarts {
                                first,
                                second: position,
                            });
                        }
                        start = Some(position);
                    }
                    CellKind::Goal => has_goal = true,
                    _ => {}
                }
                row_kinds.push(kind);
            }
            kinds.push(row_kinds);
        }

        let start = start.ok_or(LayoutError::MissingStart)?;
        if !has_goal {
            return Err(LayoutError::MissingGoal);
        }

        let grid = Grid::from_generator(kinds.len(), cols, |p| kinds[p.row][p.col]);

        Ok(Layout { grid, start })
    }

    /// The grid as it looks at the start of every episode.
    pub fn grid(&self) -> &Grid<CellKind> {
        &self.grid
    }

    /// Cell the agent is placed on at every reset.
    pub fn start(&self) -> Position {
        self.start
    }

    /// Returns the number of rows.
    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    /// Number of keys lying in the layout.
    pub fn key_count(&self) -> usize {
        self.grid
            .enumerate()
            .filter(|(_, kind)| **kind == CellKind::Key)
            .count()
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::parse(DEFAULT_LAYOUT).expect("built-in layout is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_landmarks() {
        let layout = Layout::default();
        assert_eq!((layout.rows(), layout.cols()), (11, 11));
        assert_eq!(layout.start(), Position::new(5, 2));

        let grid = layout.grid();
        assert_eq!(grid[Position::new(5, 0)], CellKind::Goal);
        assert_eq!(grid[Position::new(1, 9)], CellKind::Key);
        assert_eq!(grid[Position::new(9, 9)], CellKind::Key);
        assert_eq!(grid[Position::new(4, 0)], CellKind::Wall);
        assert_eq!(grid[Position::new(5, 7)], CellKind::Wall);
        assert_eq!(grid[Position::new(3, 2)], CellKind::Walkable);
        assert_eq!(grid[Position::new(0, 0)], CellKind::Lava);
        assert_eq!(layout.key_count(), 2);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = Layout::parse("A.G\n..").unwrap_err();
        assert_eq!(
            err,
            LayoutError::InconsistentWidth {
                row: 1,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_rejects_unknown_glyph() {
        let err = Layout::parse("A.G\n.x.").unwrap_err();
        assert_eq!(
            err,
            LayoutError::UnknownGlyph {
                glyph: 'x',
                position: Position::new(1, 1)
            }
        );
    }

    #[test]
    fn test_requires_single_start_and_goal() {
        assert_eq!(Layout::parse("..G").unwrap_err(), LayoutError::MissingStart);
        assert_eq!(Layout::parse("A..").unwrap_err(), LayoutError::MissingGoal);
        assert_eq!(
            Layout::parse("A.A\n..G").unwrap_err(),
            LayoutError::MultipleStarts {
                first: Position::new(0, 0),
                second: Position::new(0, 2)
            }
        );
        assert_eq!(Layout::parse("  \n").unwrap_err(), LayoutError::Empty);
    }
}
