use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use pathwise::models::PlanTopic;

use super::{create_mastery_bar, mastery_color, status_color};
use crate::tui::{App, TopicDetail};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(detail) = &app.detail else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Topic Detail ");
        let paragraph = Paragraph::new("No topic selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Length(7), // Mastery + advice
            Constraint::Min(0),    // Sessions
        ])
        .split(area);

    draw_header(f, detail, chunks[0]);
    draw_mastery(f, detail, chunks[1]);
    draw_sessions(f, detail.plan_topic.as_ref(), chunks[2]);
}

fn draw_header(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let topic = &detail.topic;
    let prerequisites = if topic.prerequisites.is_empty() {
        "None".to_string()
    } else {
        topic.prerequisites.join(", ")
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Description: ", Style::default().fg(Color::Gray)),
            Span::styled(
                topic.description.as_deref().unwrap_or("No description"),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Tier: ", Style::default().fg(Color::Gray)),
            Span::styled(topic.difficulty.to_string(), Style::default().fg(Color::White)),
            Span::styled("   Prerequisites: ", Style::default().fg(Color::Gray)),
            Span::styled(prerequisites, Style::default().fg(Color::Cyan)),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", topic.name))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), area);
}

fn draw_mastery(f: &mut Frame, detail: &TopicDetail, area: Rect) {
    let advice = &detail.advice;
    let mastery = advice.difficulty.mastery;
    let (attempts, correct) = detail
        .state
        .as_ref()
        .map_or((0, 0), |s| (s.attempts, s.correct));
    let recent = advice
        .recent_accuracy
        .map(|a| format!("{:.0}%", a * 100.0))
        .unwrap_or_else(|| "-".to_string());

    let mut text = vec![
        Line::from(vec![
            Span::styled("Mastery: ", Style::default().fg(Color::Gray)),
            Span::styled(create_mastery_bar(mastery), Style::default().fg(mastery_color(mastery))),
            Span::styled(
                format!(" {:.1}% ({})", mastery * 100.0, advice.difficulty.level.label()),
                Style::default().fg(Color::Yellow),
            ),
        ]),
        Line::from(vec![
            Span::styled("Answers: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{} correct, recent {}", correct, attempts, recent),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Next: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} for {} min", advice.activity.as_str(), advice.minutes),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(Span::styled(
            advice.difficulty.recommendation.description(),
            Style::default().fg(Color::White),
        )),
    ];

    if let Some(plan_topic) = &detail.plan_topic {
        text.push(Line::from(vec![
            Span::styled("Plan: ", Style::default().fg(Color::Gray)),
            Span::styled(
                plan_topic.status.label(),
                Style::default().fg(status_color(plan_topic.status)),
            ),
            Span::styled(
                format!(" due {}", plan_topic.target_date.format("%b %d")),
                Style::default().fg(Color::White),
            ),
        ]));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Progress ")
        .title_style(Style::default().fg(Color::Green));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_sessions(f: &mut Frame, plan_topic: Option<&PlanTopic>, area: Rect) {
    let items: Vec<ListItem> = plan_topic
        .map(|t| t.sessions.as_slice())
        .unwrap_or_default()
        .iter()
        .rev()
        .map(|s| {
            let score = s
                .score
                .map(|v| format!("{:.0}", v))
                .unwrap_or_else(|| "-".to_string());
            let (done_text, done_color) = if s.completed {
                ("done", Color::Green)
            } else {
                ("partial", Color::Yellow)
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<14}", s.started_at.format("%b %d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<8}", s.session_type.as_str()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:>4} min  ", s.duration_minutes),
                    Style::default().fg(Color::White),
                ),
                Span::styled(format!("score {:<5}", score), Style::default().fg(Color::Yellow)),
                Span::styled(done_text, Style::default().fg(done_color)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Sessions ")
        .title_style(Style::default().fg(Color::Magenta));

    f.render_widget(List::new(items).block(block), area);
}
