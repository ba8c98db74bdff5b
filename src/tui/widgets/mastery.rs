use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{create_mastery_bar, mastery_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .mastery
        .items
        .iter()
        .map(|row| {
            let attempts = row.state.as_ref().map_or(0, |s| s.attempts);
            let accuracy = row
                .state
                .as_ref()
                .filter(|s| s.attempts > 0)
                .map(|s| format!("{:.0}%", s.accuracy() * 100.0))
                .unwrap_or_else(|| "-".to_string());

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<26}", truncate(&row.topic.name, 24)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("T{}  ", row.topic.difficulty),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    create_mastery_bar(row.mastery),
                    Style::default().fg(mastery_color(row.mastery)),
                ),
                Span::styled(
                    format!(" {:>3.0}%  ", row.mastery * 100.0),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(format!("{:<9}", attempts), Style::default().fg(Color::Cyan)),
                Span::styled(accuracy, Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Mastery ")
        .title_style(Style::default().fg(Color::Cyan));

    let bold = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<26}", "Topic"), bold),
        Span::styled("Tier", bold),
        Span::styled(format!("{:<18}", "  Mastery"), bold),
        Span::styled(format!("{:<9}", "Attempts"), bold),
        Span::styled("Accuracy", bold),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.mastery.selected);

    let header_area = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
