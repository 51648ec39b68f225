use dungeon_world_core::{
    AgentKind, AnyAgent, Config, DungeonEnv, EpisodeOutcome, Layout, Learner, LearningConfig,
    SinglePolicyAgent, Trainer, report,
};

/// One row: key, floor, start, floor, key, goal.
const CORRIDOR: &str = "K.A.KG";

fn corridor_config(episodes: usize) -> LearningConfig {
    LearningConfig::default()
        .max_episodes(episodes)
        .learning_rate(0.5)
        .discount_factor(0.9)
        .epsilon_schedule(1.0, 0.995, 0.05)
        .seed(42)
}

#[test]
fn test_single_agent_learns_corridor() {
    let mut env = DungeonEnv::new(Layout::parse(CORRIDOR).unwrap());
    let mut agent = SinglePolicyAgent::new(&corridor_config(3000));
    let trainer = Trainer::new(3000).max_steps(50);

    let summary = trainer.train(&mut env, &mut agent).unwrap();
    assert_eq!(summary.episodes, 3000);
    assert!(summary.successes > 0);
    assert!((agent.epsilons()[0] - 0.05).abs() < 1e-12);

    let mut greedy = SinglePolicyAgent::from_table(agent.policy().q_table().clone(), &corridor_config(1));
    let stats = trainer.evaluate_episode(&mut env, &mut greedy, 0).unwrap();
    assert_eq!(stats.outcome, EpisodeOutcome::Success);
    assert!(stats.total_reward > 100.0);
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let run = || {
        let mut env = DungeonEnv::new(Layout::default());
        let mut agent = AnyAgent::new(AgentKind::Single, &corridor_config(50));
        let summary = Trainer::new(50)
            .max_steps(100)
            .train(&mut env, &mut agent)
            .unwrap();
        (summary, agent.epsilons())
    };

    let (first, first_eps) = run();
    let (second, second_eps) = run();
    assert_eq!(first, second);
    assert_eq!(first_eps, second_eps);
}

#[test]
fn test_multi_agent_decays_one_phase_per_episode() {
    let mut config = Config::default();
    config.learning = LearningConfig::default().max_episodes(200).seed(3);
    config.training.agent = AgentKind::Multi;
    config.training.max_steps = Some(200);

    let mut env = DungeonEnv::from_config(&config.env).unwrap();
    let mut agent = AnyAgent::new(config.training.agent, &config.learning);
    let summary = Trainer::from_config(&config)
        .train(&mut env, &mut agent)
        .unwrap();

    assert_eq!(
        summary.successes + summary.lava_deaths + summary.truncations,
        200
    );
    let histories = report::epsilon_histories(&agent);
    assert_eq!(histories.len(), 3);
    assert_eq!(histories.iter().map(|h| h.len()).sum::<usize>(), 200);
    for history in histories {
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
    }
}
