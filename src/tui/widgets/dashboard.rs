use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use pathwise::models::PlanTopic;

use super::{create_mastery_bar, mastery_color, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // Plan stats + recommendations
            Constraint::Min(0),     // Today and overdue
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    draw_stats(f, app, top_chunks[0]);
    draw_recommended(f, app, top_chunks[1]);
    draw_plan_topics(f, " Today ", Color::Yellow, &app.todays, bottom_chunks[0]);
    draw_plan_topics(f, " Overdue ", Color::Red, &app.overdue, bottom_chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.plan {
        Some(plan) => {
            let stats = &plan.stats;
            vec![
                Line::from(vec![
                    Span::styled("Plan: ", Style::default().fg(Color::Gray)),
                    Span::styled(
                        plan.status.label(),
                        Style::default()
                            .fg(Color::White)
                            .add_modifier(Modifier::BOLD),
                    ),
                ]),
                stat_line(
                    "Completed",
                    format!(
                        "{}/{} ({:.0}%)",
                        stats.completed_topics,
                        stats.total_topics,
                        stats.completion_rate()
                    ),
                    Color::Green,
                ),
                stat_line(
                    "In progress",
                    format!("{} ({} skipped)", stats.in_progress_topics, stats.skipped_topics),
                    Color::Cyan,
                ),
                stat_line(
                    "Sessions",
                    format!("{} ({} min)", stats.total_sessions, stats.total_minutes),
                    Color::White,
                ),
                stat_line(
                    "Streak",
                    format!("{} days (best {})", stats.streak_days, stats.longest_streak),
                    if stats.streak_days > 0 { Color::Yellow } else { Color::White },
                ),
                stat_line(
                    "Last studied",
                    stats
                        .last_study_date
                        .map(|d| d.format("%b %d").to_string())
                        .unwrap_or_else(|| "never".to_string()),
                    Color::White,
                ),
            ]
        }
        None => vec![
            Line::from(Span::styled("No study plan yet.", Style::default().fg(Color::Gray))),
            Line::from(Span::styled(
                "Create one with `pathwise plan create`.",
                Style::default().fg(Color::DarkGray),
            )),
        ],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Plan ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_recommended(f: &mut Frame, app: &App, area: Rect) {
    let mut items: Vec<ListItem> = vec![ListItem::new(Line::from(vec![
        Span::styled("Next: ", Style::default().fg(Color::Gray)),
        Span::styled(
            app.next_topic.clone(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
    ]))];

    items.extend(app.recommended.iter().enumerate().map(|(i, topic)| {
        let mastery = app
            .mastery
            .items
            .iter()
            .find(|r| r.topic.id == topic.id)
            .map_or(0.0, |r| r.mastery);

        ListItem::new(Line::from(vec![
            Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:<22}", truncate(&topic.name, 20)), Style::default().fg(Color::White)),
            Span::styled(create_mastery_bar(mastery), Style::default().fg(mastery_color(mastery))),
        ]))
    }));

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Recommended ")
        .title_style(Style::default().fg(Color::Yellow));

    f.render_widget(List::new(items).block(block), area);
}

fn draw_plan_topics(f: &mut Frame, title: &str, color: Color, topics: &[PlanTopic], area: Rect) {
    let items: Vec<ListItem> = topics
        .iter()
        .map(|t| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<8}", t.target_date.format("%b %d")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:<22}", truncate(&t.name, 20)), Style::default().fg(color)),
                Span::styled(format!("{} min", t.estimated_minutes), Style::default().fg(Color::Gray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string())
        .title_style(Style::default().fg(color));

    f.render_widget(List::new(items).block(block), area);
}
