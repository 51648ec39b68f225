mod tui;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use dungeon_world_core::{
    AgentKind, AnyAgent, Config, DEFAULT_EVAL_STEPS, DungeonEnv, Trainer,
    persistence::{self, CONFIG_FILE},
};
use log::info;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::tui::App;

#[derive(Parser, Debug)]
#[command(version, about = "Q-learning agents in a key-and-lava dungeon", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train an agent and save the results
    Train(TrainArgs),
    /// Watch a trained agent play greedily
    Eval(EvalArgs),
    /// Drive the agent yourself with the arrow keys
    Play(PlayArgs),
}

#[derive(clap::Args, Debug)]
struct TrainArgs {
    /// YAML config file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Agent variant to train
    #[arg(short, long, value_enum)]
    agent: Option<AgentArg>,
    /// Number of training episodes
    #[arg(short, long)]
    episodes: Option<usize>,
    /// Seed for exploration
    #[arg(short, long)]
    seed: Option<u64>,
    /// Truncate episodes after this many steps
    #[arg(long)]
    max_steps: Option<usize>,
    /// Parent directory for experiment results
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,
    /// Don't write Q-tables or reports
    #[arg(long)]
    no_save: bool,
}

#[derive(clap::Args, Debug)]
struct EvalArgs {
    /// Experiment directory written by `train`
    #[arg(short, long, value_name = "DIR")]
    experiment: PathBuf,
    /// YAML config file; defaults to the experiment's own config
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
    /// Milliseconds between steps
    #[arg(long, default_value_t = 200)]
    tick_ms: u64,
    /// Give up on an episode after this many steps
    #[arg(long)]
    max_steps: Option<usize>,
}

#[derive(clap::Args, Debug)]
struct PlayArgs {
    /// YAML config file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum AgentArg {
    Single,
    Multi,
}

impl From<AgentArg> for AgentKind {
    fn from(arg: AgentArg) -> Self {
        match arg {
            AgentArg::Single => AgentKind::Single,
            AgentArg::Multi => AgentKind::Multi,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();
    match args.command {
        Command::Train(args) => train(args),
        Command::Eval(args) => eval(args),
        Command::Play(args) => play(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Applies command line overrides on top of the loaded config.
fn train_config(args: &TrainArgs) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(agent) = args.agent {
        config.training.agent = agent.into();
    }
    if let Some(episodes) = args.episodes {
        config.learning.max_episodes = episodes;
    }
    if let Some(seed) = args.seed {
        config.learning.seed = Some(seed);
    }
    if let Some(max_steps) = args.max_steps {
        config.training.max_steps = Some(max_steps);
    }
    if let Some(dir) = &args.results_dir {
        config.training.results_dir = dir.clone();
    }
    if args.no_save {
        config.training.save_results = false;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn train(args: TrainArgs) -> Result<()> {
    let config = train_config(&args)?;
    let mut env = DungeonEnv::from_config(&config.env).context("Failed to load layout")?;
    let mut agent = AnyAgent::new(config.training.agent, &config.learning);

    let summary = Trainer::from_config(&config)
        .train(&mut env, &mut agent)
        .context("Training failed")?;
    info!(
        "Success rate {:.1}% over {} episodes, mean reward of the last 100: {:.2}",
        summary.success_rate() * 100.0,
        summary.episodes,
        summary.recent_mean_reward(100)
    );

    if config.training.save_results {
        let dir = config
            .training
            .results_dir
            .join(Local::now().format("%Y%m%d-%H%M%S").to_string());
        let layout = env.layout();
        persistence::save_experiment(&agent, &config, layout.rows(), layout.cols(), &dir)
            .with_context(|| format!("Failed to save experiment to {}", dir.display()))?;
        info!("Experiment saved to {}", dir.display());
    }
    Ok(())
}

fn eval(args: EvalArgs) -> Result<()> {
    let config = match args.config.as_deref() {
        Some(path) => load_config(Some(path))?,
        None => {
            let saved = args.experiment.join(CONFIG_FILE);
            if saved.is_file() {
                load_config(Some(saved.as_path()))?
            } else {
                Config::default()
            }
        }
    };

    let agent = persistence::load_agent(&args.experiment, &config.learning)
        .with_context(|| format!("Failed to load agent from {}", args.experiment.display()))?;
    let env = DungeonEnv::from_config(&config.env).context("Failed to load layout")?;
    let max_steps = args
        .max_steps
        .or(config.training.max_steps)
        .unwrap_or(DEFAULT_EVAL_STEPS);

    let app = App::eval(env, agent, max_steps);
    tui::run(app, Duration::from_millis(args.tick_ms))
}

fn play(args: PlayArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let env = DungeonEnv::from_config(&config.env).context("Failed to load layout")?;
    tui::run(App::play(env), Duration::from_millis(250))
}
