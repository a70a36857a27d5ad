use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use voicetrainer::Phase;

use crate::{
    ui::{history::render_history, render_summary},
    Action, App, AppState,
};

/// A UI Screen boundary: responsible for rendering and key handling
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
    /// Per-screen key handling; global keys are handled by the caller.
    fn on_key(&self, _key: KeyEvent, _app: &mut App) -> Action {
        Action::None
    }
}

/// Running session - renders the App widget
pub struct TrainingScreen;

impl Screen for TrainingScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        f.render_widget(app, f.area());
    }

    fn on_key(&self, key: KeyEvent, app: &mut App) -> Action {
        match key.code {
            KeyCode::Char(' ') => app.machine.toggle_pause(),
            KeyCode::Char('n') => app.machine.force_round_complete(),
            KeyCode::Char('s') => app.machine.stop(),
            KeyCode::Char('r') => return Action::Restart,
            KeyCode::Char('h') => app.open_history(),
            _ => {}
        }
        Action::None
    }
}

/// Finished or stopped session
pub struct SummaryScreen;

impl Screen for SummaryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_summary(app, area, f.buffer_mut());
    }

    fn on_key(&self, key: KeyEvent, app: &mut App) -> Action {
        match key.code {
            KeyCode::Char('r') | KeyCode::Enter => return Action::Restart,
            KeyCode::Char('h') => app.open_history(),
            _ => {}
        }
        Action::None
    }
}

/// Past sessions - uses dedicated renderer
pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        render_history(app, f);
    }

    fn on_key(&self, key: KeyEvent, app: &mut App) -> Action {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                app.history_scroll = app.history_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if app.history_scroll + 1 < app.history.len() {
                    app.history_scroll += 1;
                }
            }
            KeyCode::Char('b') | KeyCode::Backspace => app.state = AppState::Training,
            _ => {}
        }
        Action::None
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(app: &App) -> Box<dyn Screen> {
    match app.state {
        AppState::History => Box::new(HistoryScreen),
        AppState::Training => match app.machine.phase() {
            Phase::Idle | Phase::Completed => Box::new(SummaryScreen),
            _ => Box::new(TrainingScreen),
        },
    }
}
