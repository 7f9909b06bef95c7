//! Main dashboard layout

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::session::{Session, SessionMode, Snapshot};

use super::cores;

/// Render the dashboard as a pure projection of the session state.
pub fn render(frame: &mut Frame, session: &Session) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    render_header(frame, chunks[0], session);

    match session.snapshot() {
        Some(snapshot) => {
            let content = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(7)])
                .split(chunks[1]);

            cores::render(frame, content[0], session);
            render_analysis(frame, content[1], snapshot);
        }
        None => cores::render(frame, chunks[1], session),
    }

    render_footer(frame, chunks[2], session);
}

/// Render header with title and mode badge
fn render_header(frame: &mut Frame, area: Rect, session: &Session) {
    let badge = match session.mode() {
        SessionMode::Live => Span::styled("● LIVE", Style::default().fg(Color::Green)),
        SessionMode::Frozen => Span::styled(
            "⏸ FROZEN",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Corewatch",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | per-core telemetry | "),
        badge,
    ]))
    .block(Block::default().borders(Borders::ALL));

    frame.render_widget(header, area);
}

/// Render the analysis panel shown while a snapshot is active
fn render_analysis(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let body = match snapshot.analysis() {
        Some(text) => Span::raw(text),
        None if snapshot.sample().is_empty() => Span::styled(
            "nothing captured: no sample had been rendered yet",
            Style::default().fg(Color::DarkGray),
        ),
        None => Span::styled(
            "awaiting analysis…",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ),
    };

    let panel = Paragraph::new(Line::from(body))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Analysis"));

    frame.render_widget(panel, area);
}

/// Render footer with status and keybindings
fn render_footer(frame: &mut Frame, area: Rect, session: &Session) {
    let mut footer_text = vec![
        Span::raw(format!("{}: ", session.toggle_label())),
        Span::styled("Space", Style::default().fg(Color::Yellow)),
        Span::raw(" | Clear: "),
        Span::styled("C", Style::default().fg(Color::Yellow)),
        Span::raw(" | Quit: "),
        Span::styled("Q", Style::default().fg(Color::Yellow)),
        Span::raw(" | "),
    ];

    // Connection status: the live channel is intentionally closed while
    // frozen, so show the frozen state instead of "disconnected".
    if session.is_frozen() {
        footer_text.push(Span::styled("⏸ Frozen", Style::default().fg(Color::Yellow)));
    } else if session.connected {
        footer_text.push(Span::styled(
            "● Connected",
            Style::default().fg(Color::Green),
        ));
    } else {
        footer_text.push(Span::styled(
            "○ Disconnected",
            Style::default().fg(Color::Red),
        ));
    }

    if let Some(last_update) = session.last_update {
        footer_text.push(Span::raw(format!(
            " | Last: {}",
            last_update.format("%H:%M:%S")
        )));
    }

    // Error message
    if let Some(error) = &session.error_message {
        footer_text.push(Span::raw(" | "));
        footer_text.push(Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        ));
    }

    let footer =
        Paragraph::new(Line::from(footer_text)).block(Block::default().borders(Borders::ALL));

    frame.render_widget(footer, area);
}
