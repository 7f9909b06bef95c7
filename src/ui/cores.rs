//! Per-core utilization bars with their descriptive sentences

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
};

use crate::session::Session;

/// Render one gauge plus sentence line per core.
pub fn render(frame: &mut Frame, area: Rect, session: &Session) {
    let sample = match session.displayed_sample() {
        Some(sample) if !sample.is_empty() => sample,
        _ => {
            let placeholder = Paragraph::new("waiting for first sample…")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL).title("CPU Cores"));
            frame.render_widget(placeholder, area);
            return;
        }
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("CPU Cores ({})", sample.cpus.len()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Two rows per core; show as many cores as fit.
    let visible = (inner.height as usize / 2).min(sample.cpus.len());
    if visible == 0 {
        return;
    }

    let mut constraints = Vec::with_capacity(visible * 2 + 1);
    for _ in 0..visible {
        constraints.push(Constraint::Length(1));
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Min(0));

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (i, (usage, sentence)) in sample
        .cpus
        .iter()
        .zip(&sample.sentences)
        .take(visible)
        .enumerate()
    {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(usage_color(*usage)))
            .ratio(f64::from(usage / 100.0).clamp(0.0, 1.0))
            .label(format!("{usage:.2}%"));
        frame.render_widget(gauge, rows[i * 2]);

        let words = Paragraph::new(sentence.as_str()).style(Style::default().fg(Color::Gray));
        frame.render_widget(words, rows[i * 2 + 1]);
    }
}

fn usage_color(usage: f32) -> Color {
    if usage < 50.0 {
        Color::Green
    } else if usage < 80.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}
