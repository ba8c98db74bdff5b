use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{dashboard, mastery, plan, topic_detail};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let tab_titles = vec!["Dashboard", "Mastery", "Plan"];
    let selected = match app.view {
        View::Dashboard => 0,
        View::Mastery => 1,
        View::Plan => 2,
        View::TopicDetail => match app.detail.as_ref().map(|d| d.back_to) {
            Some(View::Plan) => 2,
            _ => 1,
        },
    };

    let title = format!(" Pathwise: {} ", app.student_id);
    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(title))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Mastery => mastery::draw(f, app, area),
        View::Plan => plan::draw(f, app, area),
        View::TopicDetail => topic_detail::draw(f, app, area),
    }
}

fn key_hint(key: &'static str, label: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(key, Style::default().fg(Color::Cyan)),
        Span::raw(label),
    ]
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let mut spans: Vec<Span> = Vec::new();

    match app.view {
        View::Dashboard => {
            spans.extend(key_hint("h/l", " Views  "));
        }
        View::Mastery | View::Plan => {
            spans.extend(key_hint("h/l", " Views  "));
            spans.extend(key_hint("j/k", " Nav  "));
            spans.extend(key_hint("g/G", " Top/Bot  "));
            spans.extend(key_hint("<CR>", " Open  "));
        }
        View::TopicDetail => {
            spans.extend(key_hint("h/<Esc>", " Back  "));
        }
    }
    spans.extend(key_hint("^r", " Refresh  "));
    spans.extend(key_hint("q", " Quit"));

    let help = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
