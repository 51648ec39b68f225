//! Plain-text views of what an agent has learned.

use std::path::Path;

use crate::{
    Position,
    agent::AnyAgent,
    environment::{Action, Observation},
    error::Result,
    q_table::{QTable, argmax},
    selector::SubPolicy,
};

/// Glyph for positions the table has never visited.
pub const UNVISITED: char = '.';

/// Renders a best-action arrow per cell, using `best(position)` to look the
/// action up. Cells without an action show [`UNVISITED`].
fn render_grid<F>(rows: usize, cols: usize, mut best: F) -> String
where
    F: FnMut(Position) -> Option<usize>,
{
    let mut out = String::with_capacity(rows * (cols * 2 + 1));
    for row in 0..rows {
        let line: Vec<String> = (0..cols)
            .map(|col| {
                best(Position { row, col })
                    .and_then(|index| Action::try_from(index).ok())
                    .map_or(UNVISITED, Action::arrow)
                    .to_string()
            })
            .collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

/// Best-action grid of a position-keyed table.
pub fn action_grid(table: &QTable<Position>, rows: usize, cols: usize) -> String {
    render_grid(rows, cols, |position| table.get(&position).map(argmax))
}

/// Best-action grid of an observation-keyed table, restricted to one phase.
pub fn phase_action_grid(
    table: &QTable<Observation>,
    sub: SubPolicy,
    rows: usize,
    cols: usize,
) -> String {
    let carrying = sub.flags();
    render_grid(rows, cols, |position| {
        table.get(&Observation { position, carrying }).map(argmax)
    })
}

/// One labelled grid per key-possession phase, for either agent variant.
pub fn action_grids(agent: &AnyAgent, rows: usize, cols: usize) -> Vec<(String, String)> {
    SubPolicy::ALL
        .iter()
        .map(|&sub| {
            let grid = match agent {
                AnyAgent::Single(agent) => phase_action_grid(agent.policy().q_table(), sub, rows, cols),
                AnyAgent::Multi(agent) => action_grid(agent.policy(sub).q_table(), rows, cols),
            };
            (format!("Best action, {} (policy {})", sub.label(), sub.index()), grid)
        })
        .collect()
}

/// Epsilon history of every table the agent owns.
pub fn epsilon_histories(agent: &AnyAgent) -> Vec<&[f64]> {
    match agent {
        AnyAgent::Single(agent) => vec![agent.policy().epsilon_history()],
        AnyAgent::Multi(agent) => SubPolicy::ALL
            .iter()
            .map(|&sub| agent.policy(sub).epsilon_history())
            .collect(),
    }
}

/// Writes an epsilon history as CSV with an `episode,epsilon` header.
pub fn write_epsilon_history(path: impl AsRef<Path>, history: &[f64]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["episode", "epsilon"])?;
    for (episode, epsilon) in history.iter().enumerate() {
        writer.write_record([episode.to_string(), epsilon.to_string()])?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}
