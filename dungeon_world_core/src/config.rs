//! Run configuration.
//!
//! Every constant of a training or evaluation run lives here and is passed
//! into the environment, policies and trainer at construction. Configs can be
//! loaded from and saved to YAML.

use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    environment::Action,
    error::{Error, Result},
    layout::DEFAULT_LAYOUT,
};

/// Which agent variant a run trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// One Q-table over the full observation.
    Single,
    /// Three Q-tables over positions, one per key-possession phase.
    #[default]
    Multi,
}

/// Environment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Text map, see [`crate::layout`].
    pub layout: String,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            layout: DEFAULT_LAYOUT.to_string(),
        }
    }
}

/// Q-learning hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Number of training episodes; also sizes the epsilon history.
    pub max_episodes: usize,
    pub learning_rate: f64,
    pub discount_factor: f64,
    /// Initial exploration rate.
    pub epsilon: f64,
    /// Multiplier applied to epsilon at every episode boundary.
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    pub action_space_size: usize,
    /// Seed for exploration; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_episodes: 100_000,
            learning_rate: 0.01,
            discount_factor: 0.99,
            epsilon: 1.0,
            epsilon_decay: 0.9995,
            min_epsilon: 0.1,
            action_space_size: Action::COUNT,
            seed: None,
        }
    }
}

impl LearningConfig {
    /// Sets the number of episodes.
    pub fn max_episodes(mut self, v: usize) -> Self {
        self.max_episodes = v;
        self
    }

    /// Sets the learning rate α.
    pub fn learning_rate(mut self, v: f64) -> Self {
        self.learning_rate = v;
        self
    }

    /// Sets the discount factor γ.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the epsilon schedule: initial value, decay multiplier and floor.
    pub fn epsilon_schedule(mut self, epsilon: f64, decay: f64, min_epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self.epsilon_decay = decay;
        self.min_epsilon = min_epsilon;
        self
    }

    /// Sets the exploration seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Checks the hyperparameter ranges.
    ///
    /// Rates and epsilons must lie in `[0, 1]`, and `action_space_size` in
    /// `1..=4`. Policies built from an unchecked config panic on an empty
    /// action space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let l = self;
        let invalid = |message: String| Err(Error::InvalidConfiguration { message });

        if !(0.0..=1.0).contains(&l.learning_rate) {
            return invalid(format!("learning_rate {} must be in [0, 1]", l.learning_rate));
        }
        if !(0.0..=1.0).contains(&l.discount_factor) {
            return invalid(format!(
                "discount_factor {} must be in [0, 1]",
                l.discount_factor
            ));
        }
        if !(0.0..=1.0).contains(&l.epsilon) || !(0.0..=1.0).contains(&l.min_epsilon) {
            return invalid(format!(
                "epsilon {} and min_epsilon {} must be in [0, 1]",
                l.epsilon, l.min_epsilon
            ));
        }
        if !(0.0..=1.0).contains(&l.epsilon_decay) {
            return invalid(format!("epsilon_decay {} must be in [0, 1]", l.epsilon_decay));
        }
        if l.action_space_size == 0 || l.action_space_size > Action::COUNT {
            return invalid(format!(
                "action_space_size {} must be between 1 and {}",
                l.action_space_size,
                Action::COUNT
            ));
        }
        Ok(())
    }
}

/// Training driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub agent: AgentKind,
    /// Truncate episodes after this many steps.
    pub max_steps: Option<usize>,
    /// Log progress every this many episodes.
    pub log_interval: usize,
    /// Write Q-tables and reports at the end of a run.
    pub save_results: bool,
    /// Parent directory of the per-run experiment directories.
    pub results_dir: PathBuf,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            agent: AgentKind::default(),
            max_steps: None,
            log_interval: 1000,
            save_results: true,
            results_dir: PathBuf::from("experiments"),
        }
    }
}

/// Complete configuration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: EnvConfig,
    pub learning: LearningConfig,
    pub training: TrainingConfig,
}

impl Config {
    /// Constructs [`Config`] from a YAML file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io("open config", path, e))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Saves [`Config`] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path).map_err(|e| Error::io("create config", path, e))?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())
            .map_err(|e| Error::io("write config", path, e))?;
        Ok(())
    }

    /// Checks value ranges that would otherwise surface as odd learning behavior.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        let invalid = |message: String| Err(Error::InvalidConfiguration { message });

        if self.training.log_interval == 0 {
            return invalid("log_interval must be positive".to_string());
        }
        if self.training.max_steps == Some(0) {
            return invalid("max_steps must be positive when set".to_string());
        }
        Ok(())
    }
}
