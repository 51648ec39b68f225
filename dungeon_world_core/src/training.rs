//! Episode loop shared by training and evaluation.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    agent::{Learner, Transition},
    config::Config,
    environment::DungeonEnv,
    error::Result,
};

/// Step cap for evaluation episodes of a [`Trainer`] without `max_steps`.
///
/// A greedy policy can cycle between cells forever, so evaluation is always capped.
pub const DEFAULT_EVAL_STEPS: usize = 200;

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeOutcome {
    /// Goal reached with both keys.
    Success,
    /// Agent walked into lava.
    Lava,
    /// Step cap hit first.
    Truncated,
}

/// Result of one episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeStats {
    /// Zero-based episode index.
    pub episode: usize,
    /// Steps taken, including the terminal one.
    pub steps: usize,
    pub total_reward: f64,
    pub outcome: EpisodeOutcome,
}

/// Aggregate results of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSummary {
    pub episodes: usize,
    pub successes: usize,
    pub lava_deaths: usize,
    pub truncations: usize,
    pub total_steps: usize,
    /// Total reward of every episode, in order.
    pub rewards: Vec<f64>,
}

impl TrainingSummary {
    fn record(&mut self, stats: &EpisodeStats) {
        self.episodes += 1;
        self.total_steps += stats.steps;
        self.rewards.push(stats.total_reward);
        match stats.outcome {
            EpisodeOutcome::Success => self.successes += 1,
            EpisodeOutcome::Lava => self.lava_deaths += 1,
            EpisodeOutcome::Truncated => self.truncations += 1,
        }
    }

    /// Fraction of episodes that reached the goal; 0 before the first episode.
    pub fn success_rate(&self) -> f64 {
        if self.episodes == 0 {
            0.0
        } else {
            self.successes as f64 / self.episodes as f64
        }
    }

    /// Mean reward of the last `window` episodes.
    pub fn recent_mean_reward(&self, window: usize) -> f64 {
        let start = self.rewards.len().saturating_sub(window);
        let recent = &self.rewards[start..];
        if recent.is_empty() {
            0.0
        } else {
            recent.iter().sum::<f64>() / recent.len() as f64
        }
    }
}

/// Drives a learner through episodes of a [`DungeonEnv`].
#[derive(Debug, Clone, PartialEq)]
pub struct Trainer {
    max_episodes: usize,
    max_steps: Option<usize>,
    log_interval: usize,
}

impl Trainer {
    /// Creates a trainer for `max_episodes` episodes without a step cap.
    ///
    /// # Arguments
    ///
    /// * `max_episodes`: Number of episodes [`Trainer::train`] runs.
    pub fn new(max_episodes: usize) -> Self {
        Self {
            max_episodes,
            max_steps: None,
            log_interval: 1000,
        }
    }

    /// Creates a trainer from the learning and training sections of a config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_episodes: config.learning.max_episodes,
            max_steps: config.training.max_steps,
            log_interval: config.training.log_interval.max(1),
        }
    }

    /// Sets the per-episode step cap.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = Some(v);
        self
    }

    /// Sets the progress logging interval in episodes.
    pub fn log_interval(mut self, v: usize) -> Self {
        self.log_interval = v.max(1);
        self
    }

    /// Runs one learning episode from a fresh reset.
    ///
    /// The last transition of the episode (terminal or truncated) carries the
    /// episode-end flag that advances the learner's exploration schedule.
    pub fn run_episode<L: Learner + ?Sized>(
        &self,
        env: &mut DungeonEnv,
        agent: &mut L,
        episode: usize,
    ) -> Result<EpisodeStats> {
        self.episode(env, agent, episode, self.max_steps, true)
    }

    /// Runs one episode without learning.
    ///
    /// The episode is truncated after `max_steps`, or [`DEFAULT_EVAL_STEPS`]
    /// when the trainer has no cap.
    pub fn evaluate_episode<L: Learner + ?Sized>(
        &self,
        env: &mut DungeonEnv,
        agent: &mut L,
        episode: usize,
    ) -> Result<EpisodeStats> {
        let cap = self.max_steps.unwrap_or(DEFAULT_EVAL_STEPS);
        self.episode(env, agent, episode, Some(cap), false)
    }

    fn episode<L: Learner + ?Sized>(
        &self,
        env: &mut DungeonEnv,
        agent: &mut L,
        episode: usize,
        max_steps: Option<usize>,
        learn: bool,
    ) -> Result<EpisodeStats> {
        let mut state = env.reset();
        let mut steps = 0;
        let mut total_reward = 0.0;

        loop {
            let action = agent.choose_action(&state)?;
            let outcome = env.step(action)?;
            steps += 1;
            total_reward += outcome.reward;

            let truncated = !outcome.is_terminal() && max_steps.is_some_and(|cap| steps >= cap);
            if learn {
                agent.learn(&Transition {
                    state,
                    action,
                    reward: outcome.reward,
                    next_state: outcome.observation,
                    episode_end: outcome.is_terminal() || truncated,
                })?;
            }
            state = outcome.observation;

            let result = if outcome.done {
                Some(EpisodeOutcome::Success)
            } else if outcome.terminated {
                Some(EpisodeOutcome::Lava)
            } else if truncated {
                Some(EpisodeOutcome::Truncated)
            } else {
                None
            };

            if let Some(outcome) = result {
                return Ok(EpisodeStats {
                    episode,
                    steps,
                    total_reward,
                    outcome,
                });
            }
        }
    }

    /// Trains for the configured number of episodes.
    pub fn train<L: Learner + ?Sized>(&self, env: &mut DungeonEnv, agent: &mut L) -> Result<TrainingSummary> {
        self.train_with(env, agent, |_| {})
    }

    /// Trains for the configured number of episodes, calling `observer` after each one.
    pub fn train_with<L, F>(&self, env: &mut DungeonEnv, agent: &mut L, mut observer: F) -> Result<TrainingSummary>
    where
        L: Learner + ?Sized,
        F: FnMut(&EpisodeStats),
    {
        info!(
            "Training {} agent for {} episodes",
            agent.name(),
            self.max_episodes
        );
        let mut summary = TrainingSummary::default();
        let mut window_successes = 0;

        for episode in 0..self.max_episodes {
            let stats = self.run_episode(env, agent, episode)?;
            summary.record(&stats);
            observer(&stats);

            if stats.outcome == EpisodeOutcome::Success {
                window_successes += 1;
                debug!(
                    "Episode {} reached the goal in {} steps (reward {:.2})",
                    episode + 1,
                    stats.steps,
                    stats.total_reward
                );
            }

            if (episode + 1) % self.log_interval == 0 || episode + 1 == self.max_episodes {
                let window = (episode % self.log_interval) + 1;
                let epsilons: Vec<String> = agent.epsilons().iter().map(|e| format!("{e:.3}")).collect();
                info!(
                    "Episode {}/{}: mean reward {:.2}, successes {}/{}, epsilon [{}]",
                    episode + 1,
                    self.max_episodes,
                    summary.recent_mean_reward(window),
                    window_successes,
                    window,
                    epsilons.join(", ")
                );
                window_successes = 0;
            }
        }

        info!(
            "Training finished: {} successes, {} lava, {} truncated over {} episodes",
            summary.successes, summary.lava_deaths, summary.truncations, summary.episodes
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::SinglePolicyAgent,
        config::LearningConfig,
        environment::{Action, CarryFlags, Observation},
        error::Error,
        layout::Layout,
        q_table::QTable,
    };

    /// Always plays the same action and records what it was taught.
    struct Scripted {
        action: Action,
        transitions: Vec<Transition>,
    }

    impl Learner for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn choose_action(&mut self, _observation: &Observation) -> Result<Action> {
            Ok(self.action)
        }

        fn learn(&mut self, transition: &Transition) -> Result<()> {
            self.transitions.push(*transition);
            Ok(())
        }

        fn epsilons(&self) -> Vec<f64> {
            Vec::new()
        }
    }

    fn scripted(action: Action) -> Scripted {
        Scripted {
            action,
            transitions: Vec::new(),
        }
    }

    #[test]
    fn test_lava_episode_marks_end() {
        let mut env = DungeonEnv::new(Layout::parse("A.L\n..G").unwrap());
        let mut agent = scripted(Action::Right);
        let stats = Trainer::new(1).run_episode(&mut env, &mut agent, 0).unwrap();

        assert_eq!(stats.outcome, EpisodeOutcome::Lava);
        assert_eq!(stats.steps, 2);
        assert!((stats.total_reward - (-10.1)).abs() < 1e-9);
        let ends: Vec<bool> = agent.transitions.iter().map(|t| t.episode_end).collect();
        assert_eq!(ends, vec![false, true]);
    }

    #[test]
    fn test_truncation_marks_end() {
        let mut env = DungeonEnv::new(Layout::parse("AW\n.G").unwrap());
        let mut agent = scripted(Action::Right);
        let stats = Trainer::new(1)
            .max_steps(5)
            .run_episode(&mut env, &mut agent, 0)
            .unwrap();

        assert_eq!(stats.outcome, EpisodeOutcome::Truncated);
        assert_eq!(stats.steps, 5);
        assert_eq!(agent.transitions.len(), 5);
        assert!(agent.transitions[4].episode_end);
        assert!(agent.transitions[..4].iter().all(|t| !t.episode_end));
    }

    #[test]
    fn test_evaluation_does_not_learn() {
        let mut env = DungeonEnv::new(Layout::parse("A.L\n..G").unwrap());
        let mut agent = scripted(Action::Right);
        let stats = Trainer::new(1)
            .evaluate_episode(&mut env, &mut agent, 0)
            .unwrap();
        assert_eq!(stats.outcome, EpisodeOutcome::Lava);
        assert!(agent.transitions.is_empty());
    }

    #[test]
    fn test_evaluation_of_cycling_policy_is_capped() {
        let at = |row, col| Observation {
            position: crate::Position::new(row, col),
            carrying: CarryFlags::default(),
        };
        let mut table = QTable::new(Action::COUNT);
        table.row_mut(&at(0, 0))[Action::Down.index()] = 1.0;
        table.row_mut(&at(1, 0))[Action::Up.index()] = 1.0;
        let mut agent = SinglePolicyAgent::from_table(table, &LearningConfig::default());
        let mut env = DungeonEnv::new(Layout::parse("A.\n.G\nLL").unwrap());

        let stats = Trainer::new(1)
            .evaluate_episode(&mut env, &mut agent, 0)
            .unwrap();
        assert_eq!(stats.outcome, EpisodeOutcome::Truncated);
        assert_eq!(stats.steps, DEFAULT_EVAL_STEPS);

        let stats = Trainer::new(1)
            .max_steps(7)
            .evaluate_episode(&mut env, &mut agent, 0)
            .unwrap();
        assert_eq!(stats.outcome, EpisodeOutcome::Truncated);
        assert_eq!(stats.steps, 7);
    }

    #[test]
    fn test_errors_propagate() {
        struct Broken;
        impl Learner for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn choose_action(&mut self, _: &Observation) -> Result<Action> {
                Action::try_from(7)
            }
            fn learn(&mut self, _: &Transition) -> Result<()> {
                Ok(())
            }
            fn epsilons(&self) -> Vec<f64> {
                Vec::new()
            }
        }

        let mut env = DungeonEnv::new(Layout::default());
        let err = Trainer::new(1).run_episode(&mut env, &mut Broken, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidAction(7)));
    }

    #[test]
    fn test_train_counts_episodes_and_decays() {
        let config = LearningConfig::default().max_episodes(20).seed(5);
        let mut env = DungeonEnv::new(Layout::default());
        let mut agent = SinglePolicyAgent::new(&config);
        let mut seen = 0;
        let summary = Trainer::new(20)
            .train_with(&mut env, &mut agent, |_| seen += 1)
            .unwrap();

        assert_eq!(seen, 20);
        assert_eq!(summary.episodes, 20);
        assert_eq!(summary.rewards.len(), 20);
        assert_eq!(
            summary.successes + summary.lava_deaths + summary.truncations,
            20
        );
        assert_eq!(agent.policy().epsilon_history().len(), 20);
    }

    #[test]
    fn test_summary_statistics() {
        let mut summary = TrainingSummary::default();
        for (episode, (reward, outcome)) in [
            (-10.0, EpisodeOutcome::Lava),
            (100.0, EpisodeOutcome::Success),
            (20.0, EpisodeOutcome::Truncated),
        ]
        .into_iter()
        .enumerate()
        {
            summary.record(&EpisodeStats {
                episode,
                steps: 3,
                total_reward: reward,
                outcome,
            });
        }
        assert_eq!(summary.total_steps, 9);
        assert!((summary.success_rate() - 1.0 / 3.0).abs() < 1e-12);
        assert!((summary.recent_mean_reward(2) - 60.0).abs() < 1e-12);
        assert!((summary.recent_mean_reward(10) - 110.0 / 3.0).abs() < 1e-12);
    }
}
