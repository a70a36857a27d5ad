pub mod history;
pub mod screen;

use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;
use voicetrainer::{util::format_clock, util::truncate, Phase, RoundEnd};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Recently spoken lines shown under the current one.
const RECENT_LINES: usize = 3;

/// Training screen.
impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.machine.state();

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let paused_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD | Modifier::ITALIC);

        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let current = state.current_line.as_deref().unwrap_or_default();
        let line_rows = match current.width() as u16 {
            w if w <= max_chars_per_line => 1,
            w => w.div_ceil(max_chars_per_line) + 1,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1),               // header
                Constraint::Min(1),                  // spacer
                Constraint::Length(1),               // main timer
                Constraint::Length(1),               // gap countdown
                Constraint::Length(1),               // padding
                Constraint::Length(line_rows),       // current line
                Constraint::Length(1),               // padding
                Constraint::Length(RECENT_LINES as u16), // recent lines
                Constraint::Min(1),                  // spacer
                Constraint::Length(1),               // up next
                Constraint::Length(1),               // legend
            ])
            .split(area);

        let mut header = vec![
            Span::styled(self.script_title.clone(), bold_style),
            Span::raw("   "),
            Span::raw(round_label(self)),
            Span::raw("   "),
            Span::styled(state.phase.to_string(), italic_style),
        ];
        if state.is_paused {
            header.push(Span::raw("   "));
            header.push(Span::styled("PAUSED", paused_style));
        }
        Paragraph::new(Line::from(header))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        if let Some(secs) = state.active_countdown() {
            let label = timer_label(state.phase);
            Paragraph::new(Line::from(vec![
                Span::styled(format_clock(secs as u64), bold_style),
                Span::styled(format!(" {label}"), dim_style),
            ]))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
        }

        if let Some(gap) = state.next_line_gap_countdown {
            Paragraph::new(Span::styled(format!("next line in {gap}s"), dim_style))
                .alignment(Alignment::Center)
                .render(chunks[3], buf);
        }

        let current_style = if state.phase == Phase::Speaking {
            bold_style.fg(Color::Green)
        } else {
            bold_style
        };
        Paragraph::new(Span::styled(current.to_string(), current_style))
            .alignment(if line_rows == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: true })
            .render(chunks[5], buf);

        let recent = state
            .spoken_line_history
            .iter()
            .take(RECENT_LINES)
            .map(|line| {
                Line::from(Span::styled(
                    truncate(line, max_chars_per_line as usize),
                    dim_style.patch(italic_style),
                ))
            })
            .collect_vec();
        Paragraph::new(recent)
            .alignment(Alignment::Center)
            .render(chunks[7], buf);

        if !state.upcoming_preview.is_empty() {
            let preview = format!("up next: {}", state.upcoming_preview.iter().join(" · "));
            Paragraph::new(Span::styled(
                truncate(&preview, max_chars_per_line as usize),
                dim_style,
            ))
            .render(chunks[9], buf);
        }

        let legend = format!(
            "{} elapsed · {} lines   (space) {} / (n)ext round / (s)top / (h)istory / (esc)ape",
            format_clock(state.elapsed_secs),
            state.total_lines_spoken,
            if state.is_paused { "resume" } else { "pause" },
        );
        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[10], buf);
    }
}

fn round_label(app: &App) -> String {
    let state = app.machine.state();
    match state.current_round {
        0 => format!("{} rounds", app.session_config.round_count),
        n => format!("Round {}/{}", n, app.session_config.round_count),
    }
}

fn timer_label(phase: Phase) -> &'static str {
    match phase {
        Phase::StartupCountdown => "until start",
        Phase::Speaking | Phase::InterLineGap => "left in round",
        Phase::Completing(RoundEnd::Rest) | Phase::Resting => "rest",
        Phase::CoolingDown => "cooldown",
        _ => "",
    }
}

/// Shown once a session has finished or was stopped.
pub fn render_summary(app: &App, area: Rect, buf: &mut Buffer) {
    let state = app.machine.state();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area);

    let (title, stats) = match state.phase {
        Phase::Completed => (
            Span::styled("Session complete", bold_style.fg(Color::Green)),
            format!(
                "{} rounds   {} lines   {}",
                app.session_config.round_count,
                state.total_lines_spoken,
                format_clock(state.elapsed_secs)
            ),
        ),
        _ => (
            Span::styled("Session stopped", bold_style.fg(Color::Yellow)),
            "nothing was recorded".to_string(),
        ),
    };

    Paragraph::new(title)
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    Paragraph::new(Span::raw(stats))
        .alignment(Alignment::Center)
        .render(chunks[3], buf);
    Paragraph::new(Span::styled(
        "(r)estart / (h)istory / (esc)ape",
        italic_style,
    ))
    .render(chunks[5], buf);
}
