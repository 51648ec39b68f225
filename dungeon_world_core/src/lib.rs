use serde::{Deserialize, Serialize};

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod layout;
pub mod map;
pub mod persistence;
pub mod policy;
pub mod q_table;
pub mod report;
pub mod selector;
pub mod training;

pub use agent::{AnyAgent, Learner, MultiPolicyAgent, SinglePolicyAgent, Transition};
pub use config::{AgentKind, Config, EnvConfig, LearningConfig, TrainingConfig};
pub use environment::{Action, CarryFlags, CellKind, DungeonEnv, Observation, StepOutcome};
pub use error::{Error, Result};
pub use layout::{DEFAULT_LAYOUT, Layout};
pub use policy::QLearningPolicy;
pub use q_table::QTable;
pub use selector::SubPolicy;
pub use training::{DEFAULT_EVAL_STEPS, EpisodeOutcome, EpisodeStats, Trainer, TrainingSummary};

/// Represents a cell coordinate on the dungeon grid.
///
/// `row` grows downwards (`Action::Up` decreases it), `col` grows to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}
