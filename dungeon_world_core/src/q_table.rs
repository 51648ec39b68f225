//! Sparse tabular action-value store

use std::{collections::HashMap, hash::Hash};

use serde::{Deserialize, Serialize};

/// Q-table mapping a discrete state to one value per action.
///
/// Rows are created lazily: the learning path goes through [`QTable::row_mut`],
/// which inserts an all-zero row the first time a state is touched. Read-only
/// consumers (reports, tests) use [`QTable::get`], which never inserts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "S: Serialize",
    deserialize = "S: Deserialize<'de> + Eq + Hash"
))]
pub struct QTable<S> {
    values: HashMap<S, Vec<f64>>,
    action_count: usize,
}

impl<S: Eq + Hash + Clone> QTable<S> {
    /// Creates an empty table.
    ///
    /// # Arguments
    ///
    /// * `action_count`: Length of every row inserted later.
    pub fn new(action_count: usize) -> Self {
        Self {
            values: HashMap::new(),
            action_count,
        }
    }

    /// Number of actions per row.
    pub fn action_count(&self) -> usize {
        self.action_count
    }

    /// Action values of a state, if it has been visited.
    pub fn get(&self, state: &S) -> Option<&[f64]> {
        self.values.get(state).map(Vec::as_slice)
    }

    /// Action values of a state, inserting a zero row on first access.
    pub fn row_mut(&mut self, state: &S) -> &mut [f64] {
        let action_count = self.action_count;
        self.values
            .entry(state.clone())
            .or_insert_with(|| vec![0.0; action_count])
    }

    /// Highest action value of a state (zero-initializing it if unseen).
    pub fn max_value(&mut self, state: &S) -> f64 {
        self.row_mut(state)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action of a state (zero-initializing it if unseen).
    pub fn greedy_action(&mut self, state: &S) -> usize {
        argmax(self.row_mut(state))
    }

    pub fn contains(&self, state: &S) -> bool {
        self.values.contains_key(state)
    }

    /// Number of visited states.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over visited states and their action values, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&S, &[f64])> {
        self.values.iter().map(|(state, row)| (state, row.as_slice()))
    }
}

/// Index of the first maximal value; 0 for an empty slice.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = index;
        }
    }
    best
}
