//! Epsilon-greedy Q-learning over a [`QTable`].

use std::hash::Hash;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{config::LearningConfig, q_table::QTable};

fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// Q-learning policy (off-policy, one-step TD control).
///
/// Owns its Q-table and its exploration schedule. Epsilon only moves when an
/// update is flagged as the end of an episode; the caller decides where
/// episode boundaries are.
#[derive(Debug, Clone)]
pub struct QLearningPolicy<S> {
    q_table: QTable<S>,
    learning_rate: f64,
    discount_factor: f64,
    epsilon: f64,
    epsilon_decay: f64,
    min_epsilon: f64,
    /// Epsilon after each episode boundary, preallocated for `max_episodes`.
    epsilon_history: Vec<f64>,
    current_episode: usize,
    rng: StdRng,
}

impl<S: Eq + Hash + Clone> QLearningPolicy<S> {
    /// Create a fresh policy with an empty table.
    ///
    /// # Arguments
    ///
    /// * `config`: Hyperparameters, exploration seed and action space size.
    ///
    /// # Panics
    ///
    /// Panics if `config.action_space_size` is zero. [`LearningConfig::validate`]
    /// rejects such configs up front.
    pub fn new(config: &LearningConfig) -> Self {
        Self::with_table(QTable::new(config.action_space_size), config.epsilon, config)
    }

    /// Wrap a previously learned table for exploitation: epsilon starts at 0.
    ///
    /// The action count comes from the table, everything else from `config`.
    ///
    /// # Panics
    ///
    /// Panics if the table has no actions.
    pub fn from_table(q_table: QTable<S>, config: &LearningConfig) -> Self {
        Self::with_table(q_table, 0.0, config)
    }

    fn with_table(q_table: QTable<S>, epsilon: f64, config: &LearningConfig) -> Self {
        assert!(
            q_table.action_count() > 0,
            "action_space_size must be positive"
        );
        Self {
            q_table,
            learning_rate: config.learning_rate,
            discount_factor: config.discount_factor,
            epsilon,
            epsilon_decay: config.epsilon_decay,
            min_epsilon: config.min_epsilon,
            epsilon_history: vec![0.0; config.max_episodes],
            current_episode: 0,
            rng: build_rng(config.seed),
        }
    }

    /// Reseeds exploration, overriding `config.seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// ε-greedy action selection. Unseen states get a zero row first.
    ///
    /// With probability epsilon a uniformly random action is drawn from
    /// `0..action_count`, otherwise the first maximal action is returned.
    ///
    /// # Arguments
    ///
    /// * `state`: The state to act in.
    pub fn get_action(&mut self, state: &S) -> usize {
        let greedy = self.q_table.greedy_action(state);
        if self.rng.random::<f64>() < self.epsilon {
            self.rng.random_range(0..self.q_table.action_count())
        } else {
            greedy
        }
    }

    /// Q-learning update
    ///
    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// With `advance_episode`, also decays epsilon (clamped to the floor) and
    /// records the new value in the history.
    ///
    /// # Panics
    ///
    /// Panics if `action` is not below the table's action count.
    pub fn update(&mut self, state: &S, action: usize, reward: f64, next_state: &S, advance_episode: bool) {
        let max_next_q = self.q_table.max_value(next_state);
        let td_target = reward + self.discount_factor * max_next_q;
        let learning_rate = self.learning_rate;
        let q = &mut self.q_table.row_mut(state)[action];
        *q += learning_rate * (td_target - *q);

        if advance_episode {
            self.decay_epsilon();
        }
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.min_epsilon);
        match self.epsilon_history.get_mut(self.current_episode) {
            Some(slot) => *slot = self.epsilon,
            None => self.epsilon_history.push(self.epsilon),
        }
        self.current_episode += 1;
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Epsilon values recorded so far, one per episode boundary, in order.
    pub fn epsilon_history(&self) -> &[f64] {
        &self.epsilon_history[..self.current_episode]
    }

    /// Number of episode boundaries seen.
    pub fn current_episode(&self) -> usize {
        self.current_episode
    }

    pub fn q_table(&self) -> &QTable<S> {
        &self.q_table
    }
}
