//! Error types for the dungeon world crate

use std::path::PathBuf;

use thiserror::Error;

use crate::{Position, environment::CellKind, layout::LayoutError, map::GridError};

/// Main error type for the dungeon world crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid action index {0} (expected 0-3: up, down, left, right)")]
    InvalidAction(usize),

    #[error("invalid carry state: second key held without the first (first={first}, second={second})")]
    InvalidCarryState { first: bool, second: bool },

    #[error("invalid cell {kind:?} at {position}: the grid no longer matches the agent position")]
    InvalidCell { position: Position, kind: CellKind },

    #[error("invalid layout: {0}")]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to {operation} '{}': {source}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode Q-table: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode Q-table: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported Q-table format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("Q-table '{}' has {found} actions per row (expected 1-4)", path.display())]
    InvalidActionCount { path: PathBuf, found: usize },

    #[error("config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no Q-table files found in '{}'", dir.display())]
    NoTablesFound { dir: PathBuf },

    #[error("incomplete multi-policy experiment in '{}': missing {}", dir.display(), missing.join(", "))]
    IncompleteTables { dir: PathBuf, missing: Vec<String> },
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
