use log::trace;
use serde::{Deserialize, Serialize};

use crate::{
    Position,
    config::EnvConfig,
    error::{Error, Result},
    layout::Layout,
    map::Grid,
};

/// Reward for a step onto walkable floor, and for bumping into a wall.
pub const STEP_PENALTY: f64 = -0.1;
/// Reward for touching lava. Ends the episode.
pub const LAVA_PENALTY: f64 = -10.0;
/// Reward for picking up a key.
pub const KEY_REWARD: f64 = 10.0;
/// Reward for entering the goal while carrying both keys. Ends the episode.
pub const GOAL_REWARD: f64 = 100.0;
/// Reward for walking into the goal without both keys, or into the agent's own cell.
pub const BLOCKED_PENALTY: f64 = -1.0;

/// Represents the kind of a cell in the dungeon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CellKind {
    #[default]
    Lava,
    Wall,
    Walkable,
    Agent,
    Key,
    Goal,
}

impl CellKind {
    /// Glyph used by text layouts and [`DungeonEnv::render`].
    pub fn glyph(self) -> char {
        match self {
            CellKind::Lava => 'L',
            CellKind::Wall => 'W',
            CellKind::Walkable => '.',
            CellKind::Agent => 'A',
            CellKind::Key => 'K',
            CellKind::Goal => 'G',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            'L' => Some(CellKind::Lava),
            'W' => Some(CellKind::Wall),
            '.' => Some(CellKind::Walkable),
            'A' => Some(CellKind::Agent),
            'K' => Some(CellKind::Key),
            'G' => Some(CellKind::Goal),
            _ => None,
        }
    }
}

/// The four movement actions, in Q-table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const COUNT: usize = 4;
    pub const ALL: [Action; Action::COUNT] = [Action::Up, Action::Down, Action::Left, Action::Right];

    /// Column of this action in a Q-table row.
    pub fn index(self) -> usize {
        self as usize
    }

    /// `(d_row, d_col)` unit vector.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }

    pub fn arrow(self) -> char {
        match self {
            Action::Up => '^',
            Action::Down => 'v',
            Action::Left => '<',
            Action::Right => '>',
        }
    }
}

impl TryFrom<usize> for Action {
    type Error = Error;

    fn try_from(index: usize) -> Result<Self> {
        Action::ALL
            .get(index)
            .copied()
            .ok_or(Error::InvalidAction(index))
    }
}

/// Key possession flags.
///
/// These count keys rather than identify them: the first key picked up sets
/// `first`, the second one (whichever it is) sets `second`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CarryFlags {
    pub first: bool,
    pub second: bool,
}

impl CarryFlags {
    pub const fn new(first: bool, second: bool) -> Self {
        Self { first, second }
    }

    fn pick_up(&mut self) {
        if self.first {
            self.second = true;
        } else {
            self.first = true;
        }
    }

    pub fn both(self) -> bool {
        self.first && self.second
    }

    pub fn count(self) -> usize {
        usize::from(self.first) + usize::from(self.second)
    }
}

/// What the agent sees after each reset/step: its cell and its key flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Observation {
    pub position: Position,
    pub carrying: CarryFlags,
}

/// Result of a single [`DungeonEnv::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    /// The goal was reached with both keys.
    pub done: bool,
    /// The agent touched lava.
    pub terminated: bool,
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        self.done || self.terminated
    }
}

/// The key-and-lava dungeon.
///
/// Deterministic: the same action sequence from a reset always produces the
/// same outcomes.
#[derive(Debug, Clone)]
pub struct DungeonEnv {
    layout: Layout,
    grid: Grid<CellKind>,
    agent: Position,
    carrying: CarryFlags,
}

impl DungeonEnv {
    /// Creates an environment in its freshly reset state.
    pub fn new(layout: Layout) -> Self {
        let grid = layout.grid().clone();
        let agent = layout.start();
        DungeonEnv {
            layout,
            grid,
            agent,
            carrying: CarryFlags::default(),
        }
    }

    pub fn from_config(config: &EnvConfig) -> Result<Self> {
        Ok(Self::new(Layout::parse(&config.layout)?))
    }

    /// Restores the layout, puts the agent back at the start and drops all keys.
    pub fn reset(&mut self) -> Observation {
        self.grid = self.layout.grid().clone();
        self.agent = self.layout.start();
        self.carrying = CarryFlags::default();
        self.observation()
    }

    /// Applies one action.
    ///
    /// The target cell is clamped to the grid, so pushing against the border
    /// is scored exactly like moving onto the border cell itself.
    pub fn step(&mut self, action: Action) -> Result<StepOutcome> {
        let (d_row, d_col) = action.delta();
        let target = self.grid.clamp(
            self.agent.row as isize + d_row,
            self.agent.col as isize + d_col,
        );
        let kind = self.grid[target];

        let (reward, done, terminated) = match kind {
            CellKind::Wall => (STEP_PENALTY, false, false),
            CellKind::Lava => (LAVA_PENALTY, false, true),
            CellKind::Key => {
                self.move_agent(target)?;
                self.carrying.pick_up();
                (KEY_REWARD, false, false)
            }
            CellKind::Goal if self.carrying.both() => {
                self.move_agent(target)?;
                (GOAL_REWARD, true, false)
            }
            CellKind::Goal => (BLOCKED_PENALTY, false, false),
            CellKind::Walkable => {
                self.move_agent(target)?;
                (STEP_PENALTY, false, false)
            }
            CellKind::Agent if target == self.agent => (BLOCKED_PENALTY, false, false),
            CellKind::Agent => {
                return Err(Error::InvalidCell {
                    position: target,
                    kind,
                });
            }
        };

        trace!(
            "{:?} -> {} ({:?}) reward={} done={} terminated={}",
            action, target, kind, reward, done, terminated
        );

        Ok(StepOutcome {
            observation: self.observation(),
            reward,
            done,
            terminated,
        })
    }

    /// Repaints the target as the agent and the old cell as floor.
    /// An out-of-bounds target leaves the grid untouched.
    fn move_agent(&mut self, target: Position) -> Result<()> {
        self.grid.set(target, CellKind::Agent)?;
        self.grid.set(self.agent, CellKind::Walkable)?;
        self.agent = target;
        Ok(())
    }

    pub fn observation(&self) -> Observation {
        Observation {
            position: self.agent,
            carrying: self.carrying,
        }
    }

    pub fn grid(&self) -> &Grid<CellKind> {
        &self.grid
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn agent_position(&self) -> Position {
        self.agent
    }

    pub fn carrying(&self) -> CarryFlags {
        self.carrying
    }

    /// Text dump of the grid, one glyph per cell.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.grid.rows() * (self.grid.cols() + 1));
        for row in self.grid.row_slices() {
            out.extend(row.iter().map(|kind| kind.glyph()));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{layout::DEFAULT_LAYOUT, map::GridError};

    fn env(text: &str) -> DungeonEnv {
        DungeonEnv::new(Layout::parse(text).unwrap())
    }

    fn walk(env: &mut DungeonEnv, actions: &[Action]) -> StepOutcome {
        let mut last = None;
        for &action in actions {
            last = Some(env.step(action).unwrap());
        }
        last.unwrap()
    }

    #[test]
    fn test_reset_matches_layout() {
        let mut env = DungeonEnv::new(Layout::default());
        let obs = env.reset();
        assert_eq!(obs.position, Position::new(5, 2));
        assert_eq!(obs.carrying, CarryFlags::default());
        assert_eq!(env.render(), DEFAULT_LAYOUT);
    }

    #[test]
    fn test_reset_restores_keys_and_flags() {
        let mut env = env("AKG");
        env.step(Action::Right).unwrap();
        assert!(env.carrying().first);
        env.reset();
        assert_eq!(env.grid()[Position::new(0, 1)], CellKind::Key);
        assert_eq!(env.carrying(), CarryFlags::default());
        assert_eq!(env.agent_position(), Position::new(0, 0));
    }

    #[test]
    fn test_wall_blocks_without_moving() {
        let mut env = env("AW\n.G");
        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(out.observation.position, Position::new(0, 0));
        assert!(!out.is_terminal());
    }

    #[test]
    fn test_lava_terminates() {
        let mut env = env("AL\n.G");
        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, LAVA_PENALTY);
        assert!(out.terminated);
        assert!(!out.done);
        assert_eq!(out.observation.position, Position::new(0, 0));
    }

    #[test]
    fn test_walkable_repaints_cells() {
        let mut env = env("A.G");
        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(out.observation.position, Position::new(0, 1));
        assert_eq!(env.grid()[Position::new(0, 0)], CellKind::Walkable);
        assert_eq!(env.grid()[Position::new(0, 1)], CellKind::Agent);
        assert_eq!(
            env.grid().enumerate().filter(|(_, k)| **k == CellKind::Agent).count(),
            1
        );
    }

    #[test]
    fn test_goal_requires_both_keys() {
        let mut env = env("KAG");
        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, BLOCKED_PENALTY);
        assert!(!out.done);
        assert_eq!(out.observation.position, Position::new(0, 1));

        // One key is still not enough.
        let out = env.step(Action::Left).unwrap();
        assert_eq!(out.reward, KEY_REWARD);
        assert_eq!(out.observation.carrying, CarryFlags::new(true, false));
        let out = walk(&mut env, &[Action::Right, Action::Right]);
        assert_eq!(out.reward, BLOCKED_PENALTY);
        assert_eq!(out.observation.position, Position::new(0, 1));
    }

    #[test]
    fn test_goal_with_both_keys_is_done() {
        let mut env = env("K.A.KG");
        let out = env.step(Action::Left).unwrap();
        assert_eq!(out.reward, STEP_PENALTY);
        let out = env.step(Action::Left).unwrap();
        assert_eq!(out.reward, KEY_REWARD);
        assert_eq!(out.observation.carrying, CarryFlags::new(true, false));

        let out = walk(&mut env, &[Action::Right, Action::Right, Action::Right]);
        assert_eq!(out.reward, STEP_PENALTY);
        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, KEY_REWARD);
        assert_eq!(out.observation.carrying, CarryFlags::new(true, true));

        let out = env.step(Action::Right).unwrap();
        assert_eq!(out.reward, GOAL_REWARD);
        assert!(out.done);
        assert!(!out.terminated);
        assert_eq!(out.observation.position, Position::new(0, 5));
    }

    #[test]
    fn test_key_flags_count_pickups_not_identity() {
        // Pick up the right-hand key first; it still sets the first flag.
        let mut env = env("K.A.K\nG....");
        let out = walk(&mut env, &[Action::Right, Action::Right]);
        assert_eq!(out.observation.carrying, CarryFlags::new(true, false));

        let out = walk(&mut env, &[Action::Left, Action::Left, Action::Left, Action::Left]);
        assert_eq!(out.reward, KEY_REWARD);
        assert_eq!(out.observation.carrying, CarryFlags::new(true, true));
    }

    #[test]
    fn test_second_flag_never_without_first() {
        let mut env = DungeonEnv::new(Layout::default());
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..2_000 {
            let action = Action::ALL[rng.random_range(0..Action::COUNT)];
            let out = env.step(action).unwrap();
            assert!(!out.observation.carrying.second || out.observation.carrying.first);
            if out.is_terminal() {
                env.reset();
            }
        }
    }

    #[test]
    fn test_border_clamps_onto_edge_cell() {
        // Pushing off the top edge re-evaluates the agent's own cell.
        let mut env = env("A.\n.G");
        let out = env.step(Action::Up).unwrap();
        assert_eq!(out.reward, BLOCKED_PENALTY);
        assert_eq!(out.observation.position, Position::new(0, 0));
        let out = env.step(Action::Left).unwrap();
        assert_eq!(out.reward, BLOCKED_PENALTY);
    }

    #[test]
    fn test_default_layout_walls_and_lava() {
        let mut env = DungeonEnv::new(Layout::default());
        // (5,2) -> (4,2) walkable, (3,2) walkable, (3,1) wall.
        let out = walk(&mut env, &[Action::Up, Action::Up, Action::Left]);
        assert_eq!(out.reward, STEP_PENALTY);
        assert_eq!(out.observation.position, Position::new(3, 2));

        env.reset();
        // (5,2) -> (4,2) -> (4,3) -> (3,3) is wall; (4,4) -> (4,5) wall.
        let out = walk(&mut env, &[Action::Up, Action::Right, Action::Up]);
        assert_eq!(out.observation.position, Position::new(4, 3));

        env.reset();
        // Up the corridor to (2,2), then right into lava at (2,3).
        let out = walk(&mut env, &[Action::Up, Action::Up, Action::Up, Action::Right]);
        assert!(out.terminated);
        assert_eq!(out.reward, LAVA_PENALTY);
    }

    #[test]
    fn test_foreign_agent_cell_is_invalid() {
        let mut env = env("A.G");
        env.grid[Position::new(0, 1)] = CellKind::Agent;

        let err = env.step(Action::Right).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidCell {
                position: Position { row: 0, col: 1 },
                kind: CellKind::Agent
            }
        ));
        // Nothing moved.
        assert_eq!(env.agent_position(), Position::new(0, 0));
        assert_eq!(env.carrying(), CarryFlags::default());
    }

    #[test]
    fn test_repaint_outside_grid_is_rejected() {
        let mut env = env("A.G");
        let err = env.move_agent(Position::new(3, 0)).unwrap_err();
        assert!(matches!(
            err,
            Error::Grid(GridError::OutOfBounds {
                rows: 1,
                cols: 3,
                ..
            })
        ));
        assert_eq!(env.render(), "A.G\n");
        assert_eq!(env.agent_position(), Position::new(0, 0));
    }

    #[test]
    fn test_invalid_action_index() {
        assert_eq!(Action::try_from(2).unwrap(), Action::Left);
        assert!(matches!(Action::try_from(4), Err(Error::InvalidAction(4))));
    }
}
