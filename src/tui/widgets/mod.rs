pub mod dashboard;
pub mod mastery;
pub mod plan;
pub mod topic_detail;

use ratatui::style::Color;

use pathwise::models::TopicStatus;

const BAR_WIDTH: usize = 10;

/// Ten-cell bar for a probability in [0, 1].
pub fn create_mastery_bar(mastery: f64) -> String {
    let filled = ((mastery.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

pub fn mastery_color(mastery: f64) -> Color {
    if mastery < 0.3 {
        Color::Red
    } else if mastery < 0.7 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub fn status_color(status: TopicStatus) -> Color {
    match status {
        TopicStatus::Pending => Color::White,
        TopicStatus::InProgress => Color::Cyan,
        TopicStatus::Completed => Color::Green,
        TopicStatus::Skipped => Color::DarkGray,
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
