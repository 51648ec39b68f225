use std::fs;

use dungeon_world_core::{
    AgentKind, AnyAgent, Config, DungeonEnv, Error, Learner, LearningConfig, Trainer,
    persistence::{self, CONFIG_FILE},
    q_table::argmax,
    report,
};

fn trained(kind: AgentKind) -> (Config, AnyAgent) {
    let mut config = Config::default();
    config.learning = LearningConfig::default()
        .max_episodes(100)
        .learning_rate(0.2)
        .seed(11);
    config.training.agent = kind;
    config.training.max_steps = Some(100);

    let mut env = DungeonEnv::from_config(&config.env).unwrap();
    let mut agent = AnyAgent::new(kind, &config.learning);
    Trainer::from_config(&config)
        .train(&mut env, &mut agent)
        .unwrap();
    (config, agent)
}

#[test]
fn test_experiment_roundtrip_preserves_greedy_actions() -> dungeon_world_core::Result<()> {
    for kind in [AgentKind::Single, AgentKind::Multi] {
        let (config, agent) = trained(kind);
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");

        let written = persistence::save_experiment(&agent, &config, 11, 11, &run_dir)?;
        assert!(written.iter().all(|path| path.is_file()));

        let loaded = persistence::load_agent(&run_dir, &config.learning)?;
        assert_eq!(loaded.kind(), kind);
        assert!(loaded.epsilons().iter().all(|&e| e == 0.0));
        assert_eq!(
            report::action_grids(&loaded, 11, 11),
            report::action_grids(&agent, 11, 11)
        );

        let saved_config = Config::load(run_dir.join(CONFIG_FILE))?;
        assert_eq!(saved_config, config);
    }
    Ok(())
}

#[test]
fn test_reloaded_table_keeps_every_ranking() -> dungeon_world_core::Result<()> {
    let (config, agent) = trained(AgentKind::Single);
    let dir = tempfile::tempdir().unwrap();
    persistence::save_agent(&agent, dir.path())?;
    let loaded = persistence::load_agent(dir.path(), &config.learning)?;

    let (AnyAgent::Single(original), AnyAgent::Single(loaded)) = (&agent, &loaded) else {
        panic!("expected single-policy agents");
    };
    let original = original.policy().q_table();
    let loaded = loaded.policy().q_table();
    assert_eq!(loaded.len(), original.len());
    for (state, values) in original.iter() {
        let reloaded = loaded.get(state).unwrap();
        assert_eq!(argmax(reloaded), argmax(values), "ranking changed at {state:?}");
    }
    Ok(())
}

#[test]
fn test_experiment_reports() -> dungeon_world_core::Result<()> {
    let (config, agent) = trained(AgentKind::Multi);
    let dir = tempfile::tempdir().unwrap();
    persistence::save_experiment(&agent, &config, 11, 11, dir.path())?;

    let grid = fs::read_to_string(dir.path().join("action_grid_0.txt")).unwrap();
    let mut lines = grid.lines();
    assert_eq!(lines.next(), Some("Best action, no keys (policy 0)"));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 11);
    assert!(rows.iter().all(|row| row.split(' ').count() == 11));
    // The start cell is always visited by the no-keys table.
    assert_ne!(rows[5].split(' ').nth(2), Some("."));

    for index in 0..3 {
        let csv = fs::read_to_string(dir.path().join(format!("epsilon_{index}.csv"))).unwrap();
        assert_eq!(csv.lines().next(), Some("episode,epsilon"));
    }
    Ok(())
}

#[test]
fn test_corrupt_table_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(persistence::SINGLE_TABLE_FILE), b"not a table").unwrap();
    let err = persistence::load_agent(dir.path(), &LearningConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}
