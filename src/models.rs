use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Topic id to mastery probability, the shape every scoring function reads.
pub type MasteryMap = BTreeMap<String, f64>;

/// Opaque key/value bag carried on interactions and sessions.
pub type Metadata = BTreeMap<String, MetaValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// False for NaN and infinite floats, which JSON cannot carry.
    pub fn is_finite(&self) -> bool {
        match self {
            MetaValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Bool(v)
    }
}

/// Generates ids like `plan_1760700000000_9f3a01bc`.
pub fn new_id(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}_{}_{:08x}", prefix, Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Tier 1 (introductory) to 3 (hardest).
    pub difficulty: u8,
    #[serde(default)]
    pub description: Option<String>,
}

// Mastery-derived difficulty label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub fn from_mastery(mastery: f64, beginner_below: f64, intermediate_below: f64) -> Self {
        if mastery < beginner_below {
            DifficultyLevel::Beginner
        } else if mastery < intermediate_below {
            DifficultyLevel::Intermediate
        } else {
            DifficultyLevel::Advanced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "Beginner",
            DifficultyLevel::Intermediate => "Intermediate",
            DifficultyLevel::Advanced => "Advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Quiz,
    Practice,
    Review,
    Chat,
    Study,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::Quiz => "quiz",
            InteractionType::Practice => "practice",
            InteractionType::Review => "review",
            InteractionType::Chat => "chat",
            InteractionType::Study => "study",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "quiz" | "q" => Some(InteractionType::Quiz),
            "practice" | "p" => Some(InteractionType::Practice),
            "review" | "r" => Some(InteractionType::Review),
            "chat" | "c" => Some(InteractionType::Chat),
            "study" | "s" => Some(InteractionType::Study),
            _ => None,
        }
    }
}

// One observed answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub timestamp: DateTime<Utc>,
    pub correct: bool,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryState {
    pub topic_id: String,
    pub mastery: f64,
    pub attempts: u32,
    pub correct: u32,
    pub difficulty: DifficultyLevel,
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl MasteryState {
    /// Share of correct answers, 0.0 when nothing has been attempted.
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }

    /// Accuracy over the last `window` interactions, `None` without history.
    pub fn recent_accuracy(&self, window: usize) -> Option<f64> {
        if self.interactions.is_empty() || window == 0 {
            return None;
        }
        let recent: Vec<&Interaction> = self.interactions.iter().rev().take(window).collect();
        let correct = recent.iter().filter(|i| i.correct).count();
        Some(correct as f64 / recent.len() as f64)
    }
}

// Plan topic lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl TopicStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TopicStatus::Completed | TopicStatus::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Pending => "pending",
            TopicStatus::InProgress => "in_progress",
            TopicStatus::Completed => "completed",
            TopicStatus::Skipped => "skipped",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TopicStatus::Pending => "Pending",
            TopicStatus::InProgress => "In Progress",
            TopicStatus::Completed => "Completed",
            TopicStatus::Skipped => "Skipped",
        }
    }
}

impl std::fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Paused => "paused",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(PlanStatus::Active),
            "paused" | "pause" => Some(PlanStatus::Paused),
            "completed" | "complete" => Some(PlanStatus::Completed),
            "cancelled" | "canceled" | "cancel" => Some(PlanStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlanStatus::Active => "Active",
            PlanStatus::Paused => "Paused",
            PlanStatus::Completed => "Completed",
            PlanStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" | "l" => Some(Priority::Low),
            "medium" | "m" | "normal" => Some(Priority::Medium),
            "high" | "h" => Some(Priority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Study,
    Quiz,
    Chat,
    Review,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Study => "study",
            SessionType::Quiz => "quiz",
            SessionType::Chat => "chat",
            SessionType::Review => "review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "study" | "s" => Some(SessionType::Study),
            "quiz" | "q" => Some(SessionType::Quiz),
            "chat" | "c" => Some(SessionType::Chat),
            "review" | "r" => Some(SessionType::Review),
            _ => None,
        }
    }
}

// A recorded study session, never mutated after it is appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub session_type: SessionType,
    pub score: Option<f64>,
    pub completed: bool,
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTopic {
    pub topic_id: String,
    pub name: String,
    pub target_date: NaiveDate,
    pub status: TopicStatus,
    pub estimated_minutes: u32,
    pub priority: Priority,
    pub notes: Option<String>,
    #[serde(default)]
    pub sessions: Vec<StudySession>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PlanTopic {
    pub fn completed_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.completed).count()
    }

    pub fn best_quiz_score(&self) -> Option<f64> {
        self.sessions
            .iter()
            .filter(|s| s.session_type == SessionType::Quiz)
            .filter_map(|s| s.score)
            .fold(None, |best, score| match best {
                Some(b) if b >= score => Some(b),
                _ => Some(score),
            })
    }

    pub fn minutes_studied(&self) -> u32 {
        self.sessions.iter().map(|s| s.duration_minutes).sum()
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSettings {
    pub reminder_time: NaiveTime,
    pub auto_advance: bool,
    pub include_weekends: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStats {
    pub total_topics: u32,
    pub pending_topics: u32,
    pub in_progress_topics: u32,
    pub completed_topics: u32,
    pub skipped_topics: u32,
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub streak_days: u32,
    pub longest_streak: u32,
    pub last_study_date: Option<NaiveDate>,
}

impl PlanStats {
    pub fn completion_rate(&self) -> f64 {
        if self.total_topics == 0 {
            0.0
        } else {
            (self.completed_topics as f64 / self.total_topics as f64) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: String,
    pub student_id: String,
    pub topics: Vec<PlanTopic>,
    pub settings: PlanSettings,
    pub stats: PlanStats,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyPlan {
    pub fn topic(&self, topic_id: &str) -> Option<&PlanTopic> {
        self.topics.iter().find(|t| t.topic_id == topic_id)
    }

    pub fn topic_mut(&mut self, topic_id: &str) -> Option<&mut PlanTopic> {
        self.topics.iter_mut().find(|t| t.topic_id == topic_id)
    }

    pub fn is_finished(&self) -> bool {
        !self.topics.is_empty() && self.topics.iter().all(|t| t.status.is_terminal())
    }

    /// Recounts the per-status topic totals; session totals are left alone.
    pub fn refresh_topic_counts(&mut self) {
        let count = |status: TopicStatus| {
            self.topics.iter().filter(|t| t.status == status).count() as u32
        };
        let pending = count(TopicStatus::Pending);
        let in_progress = count(TopicStatus::InProgress);
        let completed = count(TopicStatus::Completed);
        let skipped = count(TopicStatus::Skipped);

        self.stats.total_topics = self.topics.len() as u32;
        self.stats.pending_topics = pending;
        self.stats.in_progress_topics = in_progress;
        self.stats.completed_topics = completed;
        self.stats.skipped_topics = skipped;
    }

    /// Keeps topics ordered by target date; equal dates keep their relative order.
    pub fn sort_topics(&mut self) {
        self.topics.sort_by_key(|t| t.target_date);
    }
}

/// Everything persisted for one student, read and written as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    #[serde(default)]
    pub mastery: BTreeMap<String, MasteryState>,
    #[serde(default)]
    pub plan: Option<StudyPlan>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StudentRecord {
    pub fn new(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            mastery: BTreeMap::new(),
            plan: None,
            updated_at: None,
        }
    }

    pub fn mastery_map(&self) -> MasteryMap {
        self.mastery
            .iter()
            .map(|(id, state)| (id.clone(), state.mastery))
            .collect()
    }
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(session_type: SessionType, score: Option<f64>, completed: bool) -> StudySession {
        let now = Utc::now();
        StudySession {
            id: new_id("session"),
            started_at: now,
            ended_at: now,
            duration_minutes: 30,
            session_type,
            score,
            completed,
            notes: None,
            metadata: Metadata::new(),
        }
    }

    fn make_plan_topic(sessions: Vec<StudySession>) -> PlanTopic {
        PlanTopic {
            topic_id: "algebra".to_string(),
            name: "Algebra".to_string(),
            target_date: NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            status: TopicStatus::Pending,
            estimated_minutes: 45,
            priority: Priority::Medium,
            notes: None,
            sessions,
            completed_at: None,
        }
    }

    mod mastery_state_tests {
        use super::*;

        fn make_state(attempts: u32, correct: u32, pattern: &[bool]) -> MasteryState {
            MasteryState {
                topic_id: "algebra".to_string(),
                mastery: 0.1,
                attempts,
                correct,
                difficulty: DifficultyLevel::Beginner,
                last_update: None,
                interactions: pattern
                    .iter()
                    .map(|&correct| Interaction {
                        timestamp: Utc::now(),
                        correct,
                        interaction_type: InteractionType::Quiz,
                        metadata: Metadata::new(),
                    })
                    .collect(),
            }
        }

        #[test]
        fn accuracy_zero_attempts() {
            assert_eq!(make_state(0, 0, &[]).accuracy(), 0.0);
        }

        #[test]
        fn accuracy_partial() {
            assert_eq!(make_state(4, 3, &[]).accuracy(), 0.75);
        }

        #[test]
        fn recent_accuracy_uses_window() {
            let state = make_state(4, 2, &[true, true, false, false]);
            assert_eq!(state.recent_accuracy(2), Some(0.0));
            assert_eq!(state.recent_accuracy(10), Some(0.5));
        }

        #[test]
        fn recent_accuracy_without_history() {
            assert_eq!(make_state(0, 0, &[]).recent_accuracy(5), None);
        }
    }

    mod difficulty_level_tests {
        use super::*;

        #[test]
        fn from_mastery_thresholds() {
            assert_eq!(DifficultyLevel::from_mastery(0.29, 0.3, 0.7), DifficultyLevel::Beginner);
            assert_eq!(DifficultyLevel::from_mastery(0.3, 0.3, 0.7), DifficultyLevel::Intermediate);
            assert_eq!(DifficultyLevel::from_mastery(0.69, 0.3, 0.7), DifficultyLevel::Intermediate);
            assert_eq!(DifficultyLevel::from_mastery(0.7, 0.3, 0.7), DifficultyLevel::Advanced);
        }

        #[test]
        fn serializes_snake_case() {
            let json = serde_json::to_string(&DifficultyLevel::Intermediate).unwrap();
            assert_eq!(json, "\"intermediate\"");
        }
    }

    mod plan_topic_tests {
        use super::*;

        #[test]
        fn completed_sessions_counts_only_completed() {
            let topic = make_plan_topic(vec![
                make_session(SessionType::Study, None, true),
                make_session(SessionType::Study, None, false),
                make_session(SessionType::Review, None, true),
            ]);
            assert_eq!(topic.completed_sessions(), 2);
        }

        #[test]
        fn best_quiz_score_ignores_other_types() {
            let topic = make_plan_topic(vec![
                make_session(SessionType::Study, Some(99.0), true),
                make_session(SessionType::Quiz, Some(60.0), true),
                make_session(SessionType::Quiz, Some(85.0), true),
                make_session(SessionType::Quiz, None, true),
            ]);
            assert_eq!(topic.best_quiz_score(), Some(85.0));
        }

        #[test]
        fn best_quiz_score_none_without_quiz() {
            let topic = make_plan_topic(vec![make_session(SessionType::Study, None, true)]);
            assert_eq!(topic.best_quiz_score(), None);
        }

        #[test]
        fn minutes_studied_sums_durations() {
            let topic = make_plan_topic(vec![
                make_session(SessionType::Study, None, true),
                make_session(SessionType::Chat, None, true),
            ]);
            assert_eq!(topic.minutes_studied(), 60);
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn terminal_statuses() {
            assert!(!TopicStatus::Pending.is_terminal());
            assert!(!TopicStatus::InProgress.is_terminal());
            assert!(TopicStatus::Completed.is_terminal());
            assert!(TopicStatus::Skipped.is_terminal());
        }

        #[test]
        fn plan_status_round_trips_through_as_str() {
            for status in [
                PlanStatus::Active,
                PlanStatus::Paused,
                PlanStatus::Completed,
                PlanStatus::Cancelled,
            ] {
                assert_eq!(PlanStatus::from_str(status.as_str()), Some(status));
            }
        }

        #[test]
        fn session_type_from_str_short_forms() {
            assert_eq!(SessionType::from_str("q"), Some(SessionType::Quiz));
            assert_eq!(SessionType::from_str("Study"), Some(SessionType::Study));
            assert_eq!(SessionType::from_str("lecture"), None);
        }

        #[test]
        fn priority_orders_low_to_high() {
            assert!(Priority::Low < Priority::Medium);
            assert!(Priority::Medium < Priority::High);
            assert_eq!(Priority::default(), Priority::Medium);
        }
    }

    mod metadata_tests {
        use super::*;

        #[test]
        fn metadata_serializes_as_plain_values() {
            let mut metadata = Metadata::new();
            metadata.insert("source".to_string(), "quiz-generator".into());
            metadata.insert("questions".to_string(), 10i64.into());
            metadata.insert("hinted".to_string(), false.into());

            let json = serde_json::to_string(&metadata).unwrap();
            assert_eq!(
                json,
                r#"{"hinted":false,"questions":10,"source":"quiz-generator"}"#
            );

            let back: Metadata = serde_json::from_str(&json).unwrap();
            assert_eq!(back, metadata);
        }

        #[test]
        fn new_id_has_prefix_and_is_unique() {
            let a = new_id("plan");
            let b = new_id("plan");
            assert!(a.starts_with("plan_"));
            assert_ne!(a, b);
        }
    }

    mod plan_stats_tests {
        use super::*;

        #[test]
        fn completion_rate_empty_plan() {
            assert_eq!(PlanStats::default().completion_rate(), 0.0);
        }

        #[test]
        fn completion_rate_half() {
            let stats = PlanStats {
                total_topics: 4,
                completed_topics: 2,
                ..Default::default()
            };
            assert_eq!(stats.completion_rate(), 50.0);
        }
    }

    mod json_output_tests {
        use super::*;

        #[test]
        fn ok_with_number() {
            let output = JsonOutput::ok(42);
            assert!(output.success);
            assert_eq!(output.data, Some(42));
            assert!(output.error.is_none());
        }

        #[test]
        fn err_with_string() {
            let output = JsonOutput::<()>::err("something went wrong");
            assert!(!output.success);
            assert!(output.data.is_none());
            assert_eq!(output.error, Some("something went wrong".to_string()));
        }

        #[test]
        fn serializes_err_correctly() {
            let output = JsonOutput::<()>::err("error");
            let json = serde_json::to_string(&output).unwrap();
            assert!(json.contains("\"success\":false"));
            assert!(json.contains("\"data\":null"));
            assert!(json.contains("\"error\":\"error\""));
        }
    }
}
