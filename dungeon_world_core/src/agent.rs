use log::debug;

use crate::{
    Position,
    config::{AgentKind, LearningConfig},
    environment::{Action, Observation},
    error::Result,
    policy::QLearningPolicy,
    q_table::QTable,
    selector::SubPolicy,
};

/// One environment transition handed to a learner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: Observation,
    pub action: Action,
    pub reward: f64,
    pub next_state: Observation,
    /// Last transition of an episode; advances the exploration schedule.
    pub episode_end: bool,
}

/// Trait defining the behavior of a learning agent.
pub trait Learner {
    fn name(&self) -> &str;

    /// Picks the next action for an observation.
    fn choose_action(&mut self, observation: &Observation) -> Result<Action>;

    /// Learns from one transition.
    fn learn(&mut self, transition: &Transition) -> Result<()>;

    /// Current exploration rate of every table the agent owns.
    fn epsilons(&self) -> Vec<f64>;
}

/// Agent with a single Q-table keyed by the full observation.
#[derive(Debug, Clone)]
pub struct SinglePolicyAgent {
    policy: QLearningPolicy<Observation>,
}

impl SinglePolicyAgent {
    /// One fresh policy over full observations.
    ///
    /// # Panics
    ///
    /// Panics if `config.action_space_size` is zero.
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            policy: QLearningPolicy::new(config),
        }
    }

    /// Rebuilds an agent from a saved table; it exploits only.
    pub fn from_table(q_table: QTable<Observation>, config: &LearningConfig) -> Self {
        Self {
            policy: QLearningPolicy::from_table(q_table, config),
        }
    }

    pub fn policy(&self) -> &QLearningPolicy<Observation> {
        &self.policy
    }
}

impl Learner for SinglePolicyAgent {
    fn name(&self) -> &str {
        "single-policy"
    }

    fn choose_action(&mut self, observation: &Observation) -> Result<Action> {
        Action::try_from(self.policy.get_action(observation))
    }

    fn learn(&mut self, t: &Transition) -> Result<()> {
        self.policy.update(
            &t.state,
            t.action.index(),
            t.reward,
            &t.next_state,
            t.episode_end,
        );
        Ok(())
    }

    fn epsilons(&self) -> Vec<f64> {
        vec![self.policy.epsilon()]
    }
}

/// Agent with three position-keyed Q-tables, one per key-possession phase.
///
/// The phase of the transition's starting state picks the table; the next
/// state is looked up in that same table even when a key was just picked up.
#[derive(Debug, Clone)]
pub struct MultiPolicyAgent {
    policies: [QLearningPolicy<Position>; SubPolicy::COUNT],
}

impl MultiPolicyAgent {
    /// Sub-policy `i` is seeded with `seed + i` when the config carries a seed.
    ///
    /// # Panics
    ///
    /// Panics if `config.action_space_size` is zero.
    pub fn new(config: &LearningConfig) -> Self {
        Self {
            policies: SubPolicy::ALL.map(|sub| Self::build(config, sub, QLearningPolicy::new)),
        }
    }

    /// Rebuilds an agent from saved tables, ordered by [`SubPolicy::index`].
    pub fn from_tables(tables: [QTable<Position>; SubPolicy::COUNT], config: &LearningConfig) -> Self {
        let [no_keys, one_key, both_keys] = tables;
        Self {
            policies: [
                Self::build(config, SubPolicy::NoKeys, |c| QLearningPolicy::from_table(no_keys, c)),
                Self::build(config, SubPolicy::OneKey, |c| QLearningPolicy::from_table(one_key, c)),
                Self::build(config, SubPolicy::BothKeys, |c| {
                    QLearningPolicy::from_table(both_keys, c)
                }),
            ],
        }
    }

    fn build<F>(config: &LearningConfig, sub: SubPolicy, make: F) -> QLearningPolicy<Position>
    where
        F: FnOnce(&LearningConfig) -> QLearningPolicy<Position>,
    {
        let policy = make(config);
        match config.seed {
            Some(seed) => policy.with_seed(seed.wrapping_add(sub.index() as u64)),
            None => policy,
        }
    }

    pub fn policy(&self, sub: SubPolicy) -> &QLearningPolicy<Position> {
        &self.policies[sub.index()]
    }

    fn select_policy(&mut self, observation: &Observation) -> Result<&mut QLearningPolicy<Position>> {
        let sub = SubPolicy::select(observation.carrying)?;
        Ok(&mut self.policies[sub.index()])
    }
}

impl Learner for MultiPolicyAgent {
    fn name(&self) -> &str {
        "multi-policy"
    }

    fn choose_action(&mut self, observation: &Observation) -> Result<Action> {
        let policy = self.select_policy(observation)?;
        Action::try_from(policy.get_action(&observation.position))
    }

    fn learn(&mut self, t: &Transition) -> Result<()> {
        let policy = self.select_policy(&t.state)?;
        policy.update(
            &t.state.position,
            t.action.index(),
            t.reward,
            &t.next_state.position,
            t.episode_end,
        );
        Ok(())
    }

    fn epsilons(&self) -> Vec<f64> {
        self.policies.iter().map(QLearningPolicy::epsilon).collect()
    }
}

/// Either agent variant, chosen at run time.
#[derive(Debug, Clone)]
pub enum AnyAgent {
    Single(SinglePolicyAgent),
    Multi(MultiPolicyAgent),
}

impl AnyAgent {
    /// Builds a fresh agent of the given kind.
    ///
    /// # Arguments
    ///
    /// * `kind`: Single observation-keyed table or three phase tables.
    /// * `config`: Hyperparameters shared by every table.
    ///
    /// # Panics
    ///
    /// Panics if `config.action_space_size` is zero; run
    /// [`LearningConfig::validate`] first on untrusted configs.
    pub fn new(kind: AgentKind, config: &LearningConfig) -> Self {
        debug!("Creating {:?} agent", kind);
        match kind {
            AgentKind::Single => AnyAgent::Single(SinglePolicyAgent::new(config)),
            AgentKind::Multi => AnyAgent::Multi(MultiPolicyAgent::new(config)),
        }
    }

    pub fn kind(&self) -> AgentKind {
        match self {
            AnyAgent::Single(_) => AgentKind::Single,
            AnyAgent::Multi(_) => AgentKind::Multi,
        }
    }

    fn inner(&self) -> &dyn Learner {
        match self {
            AnyAgent::Single(agent) => agent,
            AnyAgent::Multi(agent) => agent,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Learner {
        match self {
            AnyAgent::Single(agent) => agent,
            AnyAgent::Multi(agent) => agent,
        }
    }
}

impl Learner for AnyAgent {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn choose_action(&mut self, observation: &Observation) -> Result<Action> {
        self.inner_mut().choose_action(observation)
    }

    fn learn(&mut self, transition: &Transition) -> Result<()> {
        self.inner_mut().learn(transition)
    }

    fn epsilons(&self) -> Vec<f64> {
        self.inner().epsilons()
    }
}
