use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{status_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(plan) = &app.plan else {
        let block = Block::default().borders(Borders::ALL).title(" Plan ");
        let paragraph = Paragraph::new("No study plan for this student").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let items: Vec<ListItem> = app
        .plan_topics
        .items
        .iter()
        .map(|t| {
            let overdue = app.overdue.iter().any(|o| o.topic_id == t.topic_id);
            let date_color = if overdue { Color::Red } else { Color::White };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<12}", t.target_date.format("%a %b %d")),
                    Style::default().fg(date_color),
                ),
                Span::styled(
                    format!("{:<26}", truncate(&t.name, 24)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<13}", t.status.label()),
                    Style::default().fg(status_color(t.status)),
                ),
                Span::styled(
                    format!("{:<8}", t.priority.as_str()),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    format!("{}/{} min  {} sessions", t.minutes_studied(), t.estimated_minutes, t.sessions.len()),
                    Style::default().fg(Color::Cyan),
                ),
            ]))
        })
        .collect();

    let title = format!(
        " Plan ({}, {:.0}% complete) ",
        plan.status.label(),
        plan.stats.completion_rate()
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.plan_topics.selected);

    f.render_stateful_widget(list, area, &mut state);
}
