mod ui;

use std::{
    io::{self, stdin},
    path::PathBuf,
    time::Instant,
};

use anyhow::Context;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use voicetrainer::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::{HistoryDb, SessionSummary},
    logging,
    recorder::{MemoryRecorder, SessionRecorder},
    runtime::{speech_callback, CrosstermEventSource, FixedTicker, Runner, TrainerEvent},
    scripts::Script,
    session::split_lines,
    speech::{CommandSpeechDriver, SimulatedSpeechDriver, SpeechDriver},
    util::format_clock,
    SessionConfig, SessionStateMachine,
};

use crate::ui::screen::current_screen;

/// Reading speed assumed by `--silent`.
const SILENT_WORDS_PER_MINUTE: u32 = 160;

/// read-aloud training coach: timed rounds of spoken cues with rests and cooldown
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Speaks training cues line by line through timed rounds, with a startup countdown, spoken rest countdowns, an optional cooldown and a history of completed sessions."
)]
pub struct Cli {
    /// text file with one cue per line (blank lines are ignored)
    script: Option<PathBuf>,

    /// cues given inline, one per line
    #[clap(short = 't', long, conflicts_with = "script")]
    text: Option<String>,

    /// use a built-in script (see --list-builtin)
    #[clap(short = 'b', long, conflicts_with_all = ["script", "text"])]
    builtin: Option<String>,

    /// list the built-in scripts and exit
    #[clap(long)]
    list_builtin: bool,

    /// number of rounds
    #[clap(short = 'r', long)]
    rounds: Option<u32>,

    /// length of each round in seconds, reading time included
    #[clap(short = 'd', long)]
    round_secs: Option<u32>,

    /// rest between rounds in seconds (0 for none)
    #[clap(long)]
    rest_secs: Option<u32>,

    /// minimum gap between cues in seconds
    #[clap(long)]
    delay_secs: Option<u32>,

    /// quiet cooldown after the last round, in minutes
    #[clap(long)]
    cooldown_mins: Option<u32>,

    /// spoken countdown before the first round, in seconds
    #[clap(long)]
    startup_secs: Option<u32>,

    /// speak the rest countdown once this many seconds remain
    #[clap(long)]
    rest_warning_secs: Option<u32>,

    /// shuffle cues (sampled independently, repeats allowed)
    #[clap(long)]
    random: bool,

    /// speak cues in script order
    #[clap(long, conflicts_with = "random")]
    in_order: bool,

    /// text-to-speech program; the cue is appended as the last argument
    #[clap(long)]
    speech_command: Option<String>,

    /// no audio: cues are only shown, paced by estimated reading time
    #[clap(long)]
    silent: bool,

    /// remember these settings as the new defaults
    #[clap(long)]
    save: bool,

    /// print recently completed sessions and exit
    #[clap(long)]
    history: bool,

    /// delete every recorded session and exit
    #[clap(long, conflicts_with_all = ["history", "export_history"])]
    clear_history: bool,

    /// write the session history to a CSV file and exit
    #[clap(long, value_name = "CSV")]
    export_history: Option<PathBuf>,

    /// settings file to use instead of the default location
    #[clap(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// log file (defaults to the state directory)
    #[clap(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Overlay command line flags onto stored settings.
    fn apply_to(&self, cfg: &mut Config) {
        if let Some(v) = self.rounds {
            cfg.round_count = v;
        }
        if let Some(v) = self.round_secs {
            cfg.round_duration_secs = v;
        }
        if let Some(v) = self.rest_secs {
            cfg.rest_duration_secs = v;
        }
        if let Some(v) = self.delay_secs {
            cfg.delay_between_lines_secs = v;
        }
        if let Some(v) = self.cooldown_mins {
            cfg.cooldown_minutes = v;
        }
        if let Some(v) = self.startup_secs {
            cfg.startup_warning_secs = v;
        }
        if let Some(v) = self.rest_warning_secs {
            cfg.rest_warning_secs = v;
        }
        if self.random {
            cfg.random_order = true;
        }
        if self.in_order {
            cfg.random_order = false;
        }
        if let Some(cmd) = &self.speech_command {
            cfg.speech_command = Some(cmd.clone());
        }
        if self.silent {
            cfg.silent = true;
        }
    }

    /// The script title and its raw lines.
    fn script_lines(&self) -> anyhow::Result<(String, Vec<String>)> {
        if let Some(text) = &self.text {
            return Ok(("Custom cues".to_string(), split_lines(text)));
        }
        if let Some(path) = &self.script {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read script {}", path.display()))?;
            let title = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Script".to_string());
            return Ok((title, split_lines(&text)));
        }
        let name = self.builtin.as_deref().unwrap_or(Script::default_name());
        let script = Script::builtin(name)?;
        Ok((script.title, script.lines))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Training,
    History,
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    None,
    Restart,
    Quit,
}

pub type Machine = SessionStateMachine<Box<dyn SpeechDriver>, Box<dyn SessionRecorder>>;

pub struct App {
    pub machine: Machine,
    pub session_config: SessionConfig,
    pub script_title: String,
    pub state: AppState,
    pub history: Vec<SessionSummary>,
    pub history_scroll: usize,
}

impl App {
    pub fn new(machine: Machine, session_config: SessionConfig, script_title: String) -> Self {
        Self {
            machine,
            session_config,
            script_title,
            state: AppState::Training,
            history: Vec::new(),
            history_scroll: 0,
        }
    }

    pub fn start_session(&mut self) {
        self.state = AppState::Training;
        self.machine.start(self.session_config.clone());
    }

    pub fn open_history(&mut self) {
        self.history = match HistoryDb::new().and_then(|db| db.recent_sessions(100)) {
            Ok(sessions) => sessions,
            Err(e) => {
                log::warn!("cannot load history: {}", e);
                Vec::new()
            }
        };
        self.history_scroll = 0;
        self.state = AppState::History;
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = cli.log_file.clone().or_else(AppDirs::log_path);
    if let Some(path) = &log_path {
        if let Err(e) = logging::init_file_logger(path) {
            eprintln!("warning: logging disabled ({}): {}", path.display(), e);
        }
    }

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut config = store.load();
    cli.apply_to(&mut config);

    if cli.list_builtin {
        for name in Script::builtin_names() {
            let script = Script::builtin(&name)?;
            println!("{:<12} {} ({} cues)", name, script.title, script.lines.len());
        }
        return Ok(());
    }

    if cli.history || cli.clear_history || cli.export_history.is_some() {
        return print_or_export_history(&cli);
    }

    let (script_title, lines) = match cli.script_lines() {
        Ok(found) => found,
        Err(e) => Cli::command().error(ErrorKind::Io, format!("{e:#}")).exit(),
    };
    let session_config = match config.session_config(lines) {
        Ok(session_config) => session_config,
        Err(e) => Cli::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    if cli.save {
        store
            .save(&config)
            .with_context(|| format!("cannot save settings to {}", store.path().display()))?;
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &config, session_config, script_title);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn print_or_export_history(cli: &Cli) -> anyhow::Result<()> {
    let db = HistoryDb::new().context("cannot open session history")?;

    if cli.clear_history {
        db.clear_all()?;
        println!("session history cleared");
        return Ok(());
    }

    if let Some(path) = &cli.export_history {
        let rows = db.export_csv(path)?;
        println!("exported {} sessions to {}", rows, path.display());
        return Ok(());
    }

    let sessions = db.recent_sessions(20)?;
    if sessions.is_empty() {
        println!("No sessions recorded yet.");
    }
    for session in sessions {
        println!(
            "{}  {:>8}  {:>4} cues",
            session.completed_at.format("%Y-%m-%d %H:%M"),
            format_clock(session.duration_secs),
            session.line_count
        );
    }
    Ok(())
}

fn build_driver(config: &Config, events: &CrosstermEventSource) -> Box<dyn SpeechDriver> {
    let on_finished = speech_callback(events.sender());
    if config.silent {
        return Box::new(SimulatedSpeechDriver::new(SILENT_WORDS_PER_MINUTE, on_finished));
    }

    let command = config
        .speech_command
        .as_deref()
        .unwrap_or(CommandSpeechDriver::default_command());
    match CommandSpeechDriver::new(command, on_finished.clone()) {
        Some(driver) => Box::new(driver),
        None => {
            log::warn!("empty speech command, falling back to silent mode");
            Box::new(SimulatedSpeechDriver::new(SILENT_WORDS_PER_MINUTE, on_finished))
        }
    }
}

fn build_recorder() -> Box<dyn SessionRecorder> {
    match HistoryDb::new() {
        Ok(db) => Box::new(db),
        Err(e) => {
            log::error!("history database unavailable, sessions will not be saved: {}", e);
            Box::new(MemoryRecorder::new())
        }
    }
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
    session_config: SessionConfig,
    script_title: String,
) -> anyhow::Result<()> {
    let events = CrosstermEventSource::new();
    let machine = SessionStateMachine::new(build_driver(config, &events), build_recorder());
    let mut app = App::new(machine, session_config, script_title);
    let mut runner = Runner::new(events, FixedTicker::seconds());

    app.start_session();
    runner.clock_mut().reset(Instant::now());

    loop {
        terminal.draw(|f| current_screen(&app).render(&app, f))?;

        let Some(event) = runner.step() else {
            continue;
        };

        match event {
            TrainerEvent::Tick => app.machine.on_tick(),
            TrainerEvent::SpeechFinished(id) => app.machine.on_speech_finished(id),
            TrainerEvent::Resize => {}
            TrainerEvent::Key(key) => match handle_key(&mut app, key) {
                Action::Quit => break,
                Action::Restart => {
                    app.start_session();
                    runner.clock_mut().reset(Instant::now());
                }
                Action::None => {}
            },
        }

        // The clock follows the session's pause state.
        let paused = app.machine.state().is_paused;
        if paused != runner.clock().is_paused() {
            if paused {
                runner.clock_mut().pause();
            } else {
                runner.clock_mut().resume(Instant::now());
            }
        }
    }

    app.machine.stop();
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) -> Action {
    let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
    if ctrl_c || key.code == KeyCode::Esc || key.code == KeyCode::Char('q') {
        return Action::Quit;
    }

    current_screen(app).on_key(key, app)
}
