use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use voicetrainer::{history::SessionSummary, util::format_clock};

use crate::App;

/// Pure presenter for a single history row
pub fn present_row(session: &SessionSummary) -> Row<'static> {
    Row::new(vec![
        Cell::from(session.completed_at.format("%Y-%m-%d %H:%M").to_string())
            .style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format_clock(session.duration_secs)),
        Cell::from(session.line_count.to_string()),
    ])
}

pub fn render_history(app: &App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(5),    // table
            Constraint::Length(2), // instructions
        ])
        .split(area);

    let title = Paragraph::new("Session history")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    if app.history.is_empty() {
        let empty = Paragraph::new("No sessions recorded yet. Finish a session to see it here.")
            .style(Style::default().fg(Color::Yellow))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, chunks[1]);
    } else {
        // rows visible inside the table borders, minus the header
        let visible = chunks[1].height.saturating_sub(3) as usize;
        let rows: Vec<Row> = app
            .history
            .iter()
            .skip(app.history_scroll)
            .take(visible.max(1))
            .map(present_row)
            .collect();

        let header = Row::new(vec!["Completed", "Duration", "Lines"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let table = Table::new(
            rows,
            [
                Constraint::Length(18),
                Constraint::Length(10),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(format!(
            " {} sessions ",
            app.history.len()
        )));
        f.render_widget(table, chunks[1]);
    }

    let instructions = Paragraph::new("(↑/↓) scroll / (b)ack / (esc)ape")
        .style(Style::default().add_modifier(Modifier::ITALIC))
        .alignment(Alignment::Center);
    f.render_widget(instructions, chunks[2]);
}

