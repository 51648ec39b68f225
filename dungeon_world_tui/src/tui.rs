//! Terminal front end for watching a trained agent or playing by hand.

use anyhow::Result;
use dungeon_world_core::{
    Action, AnyAgent, CellKind, DungeonEnv, EpisodeOutcome, Learner, StepOutcome,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    time::{Duration, Instant},
};

/// Who picks the actions.
enum Mode {
    /// A loaded agent plays greedily, one step per tick.
    Eval {
        agent: AnyAgent,
        max_steps: usize,
        paused: bool,
    },
    /// Arrow keys move the agent.
    Play,
}

pub struct App {
    /// The dungeon being shown.
    env: DungeonEnv,
    mode: Mode,
    episode: usize,
    step: usize,
    total_reward: f64,
    last_step: Option<(Action, StepOutcome)>,
    last_outcome: Option<EpisodeOutcome>,
    successes: usize,
    /// The current episode is over and waits for a reset.
    finished: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(mut env: DungeonEnv, mode: Mode) -> Self {
        env.reset();
        App {
            env,
            mode,
            episode: 1,
            step: 0,
            total_reward: 0.0,
            last_step: None,
            last_outcome: None,
            successes: 0,
            finished: false,
            should_quit: false,
        }
    }

    pub fn eval(env: DungeonEnv, agent: AnyAgent, max_steps: usize) -> Self {
        Self::new(
            env,
            Mode::Eval {
                agent,
                max_steps,
                paused: false,
            },
        )
    }

    pub fn play(env: DungeonEnv) -> Self {
        Self::new(env, Mode::Play)
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) -> Result<()> {
        if self.finished {
            if let Mode::Eval { paused: false, .. } = self.mode {
                self.restart();
            }
            return Ok(());
        }
        let action = match &mut self.mode {
            Mode::Eval { paused: true, .. } | Mode::Play => return Ok(()),
            Mode::Eval { agent, .. } => agent.choose_action(&self.env.observation())?,
        };
        self.apply(action)
    }

    fn apply(&mut self, action: Action) -> Result<()> {
        let outcome = self.env.step(action)?;
        self.step += 1;
        self.total_reward += outcome.reward;
        self.last_step = Some((action, outcome));

        let step_cap = match self.mode {
            Mode::Eval { max_steps, .. } => Some(max_steps),
            Mode::Play => None,
        };
        let result = if outcome.done {
            Some(EpisodeOutcome::Success)
        } else if outcome.terminated {
            Some(EpisodeOutcome::Lava)
        } else if step_cap.is_some_and(|cap| self.step >= cap) {
            Some(EpisodeOutcome::Truncated)
        } else {
            None
        };

        if let Some(result) = result {
            if result == EpisodeOutcome::Success {
                self.successes += 1;
            }
            self.last_outcome = Some(result);
            self.finished = true;
        }
        Ok(())
    }

    fn restart(&mut self) {
        self.env.reset();
        self.episode += 1;
        self.step = 0;
        self.total_reward = 0.0;
        self.last_step = None;
        self.finished = false;
    }

    fn on_key(&mut self, code: KeyCode) -> Result<()> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Char('r') => self.restart(),
            KeyCode::Char(' ') => {
                if let Mode::Eval { paused, .. } = &mut self.mode {
                    *paused = !*paused;
                }
            }
            _ => {
                let action = match code {
                    KeyCode::Up => Action::Up,
                    KeyCode::Down => Action::Down,
                    KeyCode::Left => Action::Left,
                    KeyCode::Right => Action::Right,
                    _ => return Ok(()),
                };
                if matches!(self.mode, Mode::Play) && !self.finished {
                    self.apply(action)?;
                }
            }
        }
        Ok(())
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

/// Takes over the terminal, runs `app` until the user quits, then restores it.
pub fn run(mut app: App, tick_rate: Duration) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, tick_rate);
    restore_terminal(&mut terminal)?;
    result
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key.code)?;
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick()?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(app.env.grid().rows() as u16 + 2), // Map
            Constraint::Length(8),                              // Status
            Constraint::Length(2),                              // Help
        ])
        .split(frame.area());

    render_map(frame, main_layout[0], &app.env);
    render_status(frame, main_layout[1], app);

    let help_text = match app.mode {
        Mode::Eval { .. } => "Space: pause/resume  r: restart episode  q/Esc: quit",
        Mode::Play => "Arrows: move  r: restart episode  q/Esc: quit",
    };
    let help = Paragraph::new(help_text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help, main_layout[2]);
}

fn cell_span(kind: CellKind) -> Span<'static> {
    match kind {
        CellKind::Lava => Span::styled("~", Style::default().fg(Color::Red)),
        CellKind::Wall => Span::styled("#", Style::default().fg(Color::DarkGray)),
        CellKind::Walkable => Span::raw(" "),
        CellKind::Agent => Span::styled("@", Style::default().fg(Color::Cyan).bold()),
        CellKind::Key => Span::styled("k", Style::default().fg(Color::Yellow)),
        CellKind::Goal => Span::styled("g", Style::default().fg(Color::Green)),
    }
}

fn render_map(frame: &mut Frame, area: Rect, env: &DungeonEnv) {
    let lines: Vec<Line> = env
        .grid()
        .row_slices()
        .map(|row| Line::from(row.iter().map(|&kind| cell_span(kind)).collect::<Vec<_>>()))
        .collect();

    let map = Paragraph::new(lines)
        .block(Block::default().title("Dungeon").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map, area);
}

fn key_span(held: bool) -> Span<'static> {
    if held {
        Span::styled("k", Style::default().fg(Color::Yellow).bold())
    } else {
        Span::styled("-", Style::default().fg(Color::DarkGray))
    }
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let mode = match &app.mode {
        Mode::Eval { agent, paused, .. } => {
            let state = if *paused { ", paused" } else { "" };
            format!("eval ({}{})", agent.name(), state)
        }
        Mode::Play => "play".to_string(),
    };
    let step = match app.mode {
        Mode::Eval { max_steps, .. } => format!("{}/{}", app.step, max_steps),
        Mode::Play => app.step.to_string(),
    };
    let last = match app.last_step {
        Some((action, outcome)) => format!("{:?} {:+.1}", action, outcome.reward),
        None => "-".to_string(),
    };
    let outcome = match app.last_outcome {
        Some(EpisodeOutcome::Success) => Span::styled("goal reached", Style::default().fg(Color::Green)),
        Some(EpisodeOutcome::Lava) => Span::styled("burned in lava", Style::default().fg(Color::Red)),
        Some(EpisodeOutcome::Truncated) => Span::styled("out of steps", Style::default().fg(Color::Yellow)),
        None => Span::raw("-"),
    };
    let carrying = app.env.carrying();

    let completed = app.episode - usize::from(!app.finished);
    let lines = vec![
        Line::from(format!("Mode: {mode}")),
        Line::from(format!("Episode: {}  Step: {}", app.episode, step)),
        Line::from(format!("Reward: {:.1}  Last: {}", app.total_reward, last)),
        Line::from(vec![
            Span::raw("Keys: "),
            key_span(carrying.first),
            Span::raw(" "),
            key_span(carrying.second),
            Span::raw(format!(
                "  ({}/{} collected)",
                carrying.count(),
                app.env.layout().key_count()
            )),
        ]),
        Line::from(vec![Span::raw("Last outcome: "), outcome]),
        Line::from(format!("Successes: {}/{}", app.successes, completed)),
    ];

    let status = List::new(lines.into_iter().map(ListItem::from).collect::<Vec<_>>())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(status, area);
}
