//! Saving and loading learned Q-tables and experiment results.
//!
//! Tables are written as MessagePack, one file per table:
//! `q_table.msgpack` for the single-policy agent and
//! `q_table_policy_{0,1,2}.msgpack` for the multi-policy agent.

use std::{
    fs::{self, File},
    hash::Hash,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Position,
    agent::{AnyAgent, MultiPolicyAgent, SinglePolicyAgent},
    config::{Config, LearningConfig},
    environment::{Action, Observation},
    error::{Error, Result},
    q_table::QTable,
    report,
    selector::SubPolicy,
};

pub const SINGLE_TABLE_FILE: &str = "q_table.msgpack";
pub const CONFIG_FILE: &str = "config.yaml";

/// File name of the table for one sub-policy.
pub fn policy_table_file(sub: SubPolicy) -> String {
    format!("q_table_policy_{}.msgpack", sub.index())
}

const FORMAT_VERSION: u32 = 1;

/// Versioned envelope around a saved table; `T` is a table or a reference to one.
#[derive(Debug, Serialize, Deserialize)]
struct SavedQTable<T> {
    version: u32,
    q_table: T,
}

pub fn save_table<S: Serialize>(table: &QTable<S>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| Error::io("create", path, e))?;
    let mut writer = BufWriter::new(file);

    let saved = SavedQTable {
        version: FORMAT_VERSION,
        q_table: table,
    };
    rmp_serde::encode::write(&mut writer, &saved)?;
    writer.flush().map_err(|e| Error::io("write", path, e))?;
    Ok(())
}

/// Reads a table written by [`save_table`].
///
/// # Errors
///
/// Fails on I/O and decode errors, on a foreign format version, and on a
/// table whose rows hold no actions or more than [`Action::COUNT`].
pub fn load_table<S>(path: impl AsRef<Path>) -> Result<QTable<S>>
where
    S: DeserializeOwned + Eq + Hash + Clone,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io("open", path, e))?;
    let saved: SavedQTable<QTable<S>> = rmp_serde::decode::from_read(BufReader::new(file))?;
    if saved.version != FORMAT_VERSION {
        return Err(Error::UnsupportedFormat {
            found: saved.version,
            expected: FORMAT_VERSION,
        });
    }
    let found = saved.q_table.action_count();
    if found == 0 || found > Action::COUNT {
        return Err(Error::InvalidActionCount {
            path: path.to_path_buf(),
            found,
        });
    }
    Ok(saved.q_table)
}

/// Writes the agent's table files into `dir`, returning the paths written.
pub fn save_agent(agent: &AnyAgent, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut written = Vec::new();
    match agent {
        AnyAgent::Single(agent) => {
            let path = dir.join(SINGLE_TABLE_FILE);
            save_table(agent.policy().q_table(), &path)?;
            written.push(path);
        }
        AnyAgent::Multi(agent) => {
            for sub in SubPolicy::ALL {
                let path = dir.join(policy_table_file(sub));
                save_table(agent.policy(sub).q_table(), &path)?;
                written.push(path);
            }
        }
    }
    info!("Saved {} Q-table(s) in {}", written.len(), dir.display());
    Ok(written)
}

/// Loads an agent for evaluation from an experiment directory.
///
/// A single-policy table wins if present; otherwise all three sub-policy
/// tables must exist. The returned agent does not explore.
pub fn load_agent(dir: impl AsRef<Path>, config: &LearningConfig) -> Result<AnyAgent> {
    let dir = dir.as_ref();

    let single = dir.join(SINGLE_TABLE_FILE);
    if single.is_file() {
        let table: QTable<Observation> = load_table(&single)?;
        info!("Loaded single-policy table ({} states) from {}", table.len(), single.display());
        return Ok(AnyAgent::Single(SinglePolicyAgent::from_table(table, config)));
    }

    let paths = SubPolicy::ALL.map(|sub| dir.join(policy_table_file(sub)));
    let missing: Vec<String> = SubPolicy::ALL
        .iter()
        .zip(&paths)
        .filter(|(_, path)| !path.is_file())
        .map(|(sub, _)| policy_table_file(*sub))
        .collect();
    if missing.len() == SubPolicy::COUNT {
        return Err(Error::NoTablesFound {
            dir: dir.to_path_buf(),
        });
    }
    if !missing.is_empty() {
        return Err(Error::IncompleteTables {
            dir: dir.to_path_buf(),
            missing,
        });
    }

    let [p0, p1, p2] = &paths;
    let tables: [QTable<Position>; SubPolicy::COUNT] =
        [load_table(p0)?, load_table(p1)?, load_table(p2)?];
    info!(
        "Loaded multi-policy tables ({} / {} / {} states) from {}",
        tables[0].len(),
        tables[1].len(),
        tables[2].len(),
        dir.display()
    );
    Ok(AnyAgent::Multi(MultiPolicyAgent::from_tables(tables, config)))
}

/// Writes everything a finished run produces into `dir`: table files, the
/// config used, best-action grids and epsilon histories.
pub fn save_experiment(
    agent: &AnyAgent,
    config: &Config,
    rows: usize,
    cols: usize,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::io("create directory", dir, e))?;

    let mut written = save_agent(agent, dir)?;

    let config_path = dir.join(CONFIG_FILE);
    config.save(&config_path)?;
    written.push(config_path);

    for (index, (label, grid)) in report::action_grids(agent, rows, cols).into_iter().enumerate() {
        let path = dir.join(format!("action_grid_{index}.txt"));
        fs::write(&path, format!("{label}\n{grid}")).map_err(|e| Error::io("write", &path, e))?;
        written.push(path);
    }

    for (index, history) in report::epsilon_histories(agent).into_iter().enumerate() {
        let path = dir.join(format!("epsilon_{index}.csv"));
        report::write_epsilon_history(&path, history)?;
        written.push(path);
    }

    info!("Wrote {} result files to {}", written.len(), dir.display());
    Ok(written)
}
