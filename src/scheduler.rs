//! Turns topic requests into a dated study plan, edits plans, and lays a
//! prioritized topic sequence out over calendar days.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::TopicCatalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::models::{
    new_id, PlanSettings, PlanStats, PlanStatus, PlanTopic, Priority, StudyPlan, TopicStatus,
};

/// One topic the caller wants in a plan. Without `target_date` or
/// `days_ahead` the topic lands `index` days from today.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicRequest {
    pub topic_id: String,
    pub target_date: Option<NaiveDate>,
    pub days_ahead: Option<u32>,
    pub estimated_minutes: Option<u32>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
}

impl TopicRequest {
    pub fn new(topic_id: &str) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            ..Default::default()
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.target_date = Some(date);
        self
    }

    pub fn in_days(mut self, days: u32) -> Self {
        self.days_ahead = Some(days);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    pub reminder_time: Option<NaiveTime>,
    pub auto_advance: Option<bool>,
    pub include_weekends: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicTransition {
    Skip,
    Reset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicEdit {
    pub topic_id: String,
    pub target_date: Option<NaiveDate>,
    pub estimated_minutes: Option<u32>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub transition: Option<TopicTransition>,
}

impl TopicEdit {
    pub fn transition(topic_id: &str, transition: TopicTransition) -> Self {
        Self {
            topic_id: topic_id.to_string(),
            transition: Some(transition),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanUpdate {
    pub status: Option<PlanStatus>,
    pub reminder_time: Option<NaiveTime>,
    pub auto_advance: Option<bool>,
    pub include_weekends: Option<bool>,
    pub edits: Vec<TopicEdit>,
    pub add_topics: Vec<TopicRequest>,
    pub remove_topics: Vec<String>,
}

/// A topic waiting to be placed on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCandidate {
    pub topic_id: String,
    pub estimated_minutes: u32,
    pub mastery: f64,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOptions {
    pub start_date: NaiveDate,
    pub days_per_week: u32,
    pub hours_per_day: f64,
    pub include_weekends: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStrategy {
    /// Days 1-2: lowest mastery first.
    WeakestFirst,
    /// Days 3-5: by `mastery + attempts * 5`, ascending.
    Blended,
    /// Later days: highest mastery first.
    StrongestFirst,
}

impl DayStrategy {
    pub fn for_day(day_number: u32) -> Self {
        match day_number {
            0..=2 => DayStrategy::WeakestFirst,
            3..=5 => DayStrategy::Blended,
            _ => DayStrategy::StrongestFirst,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DayStrategy::WeakestFirst => "weakest first",
            DayStrategy::Blended => "blended",
            DayStrategy::StrongestFirst => "strongest first",
        }
    }

    fn order(&self, topics: &mut [ScheduleCandidate]) {
        let blended = |c: &ScheduleCandidate| c.mastery + c.attempts as f64 * 5.0;
        match self {
            DayStrategy::WeakestFirst => topics.sort_by(|a, b| a.mastery.total_cmp(&b.mastery)),
            DayStrategy::Blended => topics.sort_by(|a, b| blended(a).total_cmp(&blended(b))),
            DayStrategy::StrongestFirst => topics.sort_by(|a, b| b.mastery.total_cmp(&a.mastery)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledDay {
    pub day_number: u32,
    pub date: NaiveDate,
    pub strategy: DayStrategy,
    pub topics: Vec<ScheduleCandidate>,
    pub total_minutes: u32,
}

pub struct StudyPlanScheduler<'a> {
    catalog: &'a TopicCatalog,
    config: &'a EngineConfig,
}

impl<'a> StudyPlanScheduler<'a> {
    pub fn new(catalog: &'a TopicCatalog, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    fn resolve_date(request: &TopicRequest, index: usize, today: NaiveDate) -> Result<NaiveDate> {
        if let Some(date) = request.target_date {
            return Ok(date);
        }
        let offset = request.days_ahead.map(u64::from).unwrap_or(index as u64);
        today.checked_add_days(Days::new(offset)).ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "'{}' is {} days out, past the last representable date",
                request.topic_id, offset
            ))
        })
    }

    /// Resolves every request, failing on the first unknown topic id.
    /// Repeated topic ids keep their first occurrence.
    fn plan_topics(
        &self,
        requests: &[TopicRequest],
        today: NaiveDate,
        existing: &HashSet<String>,
    ) -> Result<Vec<PlanTopic>> {
        let mut seen = existing.clone();
        let mut topics = Vec::with_capacity(requests.len());

        for (index, request) in requests.iter().enumerate() {
            let topic = self
                .catalog
                .get(&request.topic_id)
                .ok_or_else(|| EngineError::TopicNotFound(request.topic_id.clone()))?;

            if !seen.insert(topic.id.clone()) {
                debug!(topic = %topic.id, "Ignoring repeated topic in plan request");
                continue;
            }

            topics.push(PlanTopic {
                topic_id: topic.id.clone(),
                name: topic.name.clone(),
                target_date: Self::resolve_date(request, index, today)?,
                status: TopicStatus::Pending,
                estimated_minutes: request
                    .estimated_minutes
                    .unwrap_or_else(|| self.config.schedule.minutes_for_tier(topic.difficulty)),
                priority: request.priority.unwrap_or_default(),
                notes: request.notes.clone(),
                sessions: Vec::new(),
                completed_at: None,
            });
        }

        Ok(topics)
    }

    pub fn create_plan(
        &self,
        student_id: &str,
        requests: &[TopicRequest],
        options: &PlanOptions,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<StudyPlan> {
        let topics = self.plan_topics(requests, today, &HashSet::new())?;
        let defaults = &self.config.schedule;

        let mut plan = StudyPlan {
            id: new_id("plan"),
            student_id: student_id.to_string(),
            topics,
            settings: PlanSettings {
                reminder_time: options.reminder_time.unwrap_or(defaults.reminder_time),
                auto_advance: options.auto_advance.unwrap_or(true),
                include_weekends: options.include_weekends.unwrap_or(defaults.include_weekends),
            },
            stats: PlanStats::default(),
            status: PlanStatus::Active,
            created_at: now,
            updated_at: now,
        };
        plan.sort_topics();
        plan.refresh_topic_counts();

        Ok(plan)
    }

    /// Applies `update` to a copy of `plan`; the original is untouched on error.
    pub fn apply_update(
        &self,
        plan: &StudyPlan,
        update: &PlanUpdate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<StudyPlan> {
        let mut next = plan.clone();

        for topic_id in &update.remove_topics {
            let before = next.topics.len();
            next.topics.retain(|t| &t.topic_id != topic_id);
            if next.topics.len() == before {
                return Err(EngineError::TopicNotInPlan {
                    student: plan.student_id.clone(),
                    topic: topic_id.clone(),
                });
            }
        }

        let existing: HashSet<String> = next.topics.iter().map(|t| t.topic_id.clone()).collect();
        let added = self.plan_topics(&update.add_topics, today, &existing)?;
        next.topics.extend(added);

        for edit in &update.edits {
            let topic = next
                .topic_mut(&edit.topic_id)
                .ok_or_else(|| EngineError::TopicNotInPlan {
                    student: plan.student_id.clone(),
                    topic: edit.topic_id.clone(),
                })?;
            apply_edit(topic, edit)?;
        }

        if let Some(reminder) = update.reminder_time {
            next.settings.reminder_time = reminder;
        }
        if let Some(auto_advance) = update.auto_advance {
            next.settings.auto_advance = auto_advance;
        }
        if let Some(include_weekends) = update.include_weekends {
            next.settings.include_weekends = include_weekends;
        }
        if let Some(status) = update.status {
            next.status = status;
        }

        next.sort_topics();
        next.refresh_topic_counts();
        advance_if_finished(&mut next);
        next.updated_at = now;

        Ok(next)
    }

    /// Lays `sequence` out over study days, keeping its order across days.
    pub fn build_schedule(
        &self,
        sequence: &[ScheduleCandidate],
        options: &ScheduleOptions,
    ) -> Result<Vec<ScheduledDay>> {
        if !(1..=7).contains(&options.days_per_week) {
            return Err(EngineError::InvalidSchedule(format!(
                "days per week must be 1-7, got {}",
                options.days_per_week
            )));
        }
        if !options.hours_per_day.is_finite() || options.hours_per_day <= 0.0 {
            return Err(EngineError::InvalidSchedule(format!(
                "hours per day must be positive, got {}",
                options.hours_per_day
            )));
        }
        let capacity = (options.hours_per_day * 60.0).round() as u32;
        if capacity == 0 {
            return Err(EngineError::InvalidSchedule(
                "daily capacity rounds to zero minutes".to_string(),
            ));
        }

        let mut days = Vec::new();
        let mut queue = sequence.iter().peekable();
        let mut date = options.start_date;
        let mut week = 0;
        let mut used_this_week = 0;

        while queue.peek().is_some() {
            let this_week = (date - options.start_date).num_days() / 7;
            if this_week != week {
                week = this_week;
                used_this_week = 0;
            }

            let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            let skip_day = (weekend && !options.include_weekends)
                || used_this_week >= options.days_per_week;

            if !skip_day {
                let mut topics = Vec::new();
                let mut remaining = capacity;

                while let Some(candidate) = queue.peek() {
                    if topics.is_empty() && candidate.estimated_minutes >= capacity {
                        // Oversized topics take the whole day instead of splitting.
                        topics.push((*candidate).clone());
                        queue.next();
                        break;
                    }
                    if candidate.estimated_minutes > remaining {
                        break;
                    }
                    remaining -= candidate.estimated_minutes;
                    topics.push((*candidate).clone());
                    queue.next();
                }

                used_this_week += 1;
                let day_number = days.len() as u32 + 1;
                let strategy = DayStrategy::for_day(day_number);
                strategy.order(&mut topics);

                days.push(ScheduledDay {
                    day_number,
                    date,
                    strategy,
                    total_minutes: topics.iter().map(|t| t.estimated_minutes).sum(),
                    topics,
                });
            }

            date = date
                .succ_opt()
                .ok_or_else(|| EngineError::InvalidSchedule("calendar overflow".to_string()))?;
        }

        Ok(days)
    }
}

/// Requests that reproduce a built schedule as a plan.
pub fn requests_from_schedule(days: &[ScheduledDay]) -> Vec<TopicRequest> {
    days.iter()
        .flat_map(|day| {
            day.topics.iter().map(move |t| TopicRequest {
                topic_id: t.topic_id.clone(),
                target_date: Some(day.date),
                estimated_minutes: Some(t.estimated_minutes),
                ..Default::default()
            })
        })
        .collect()
}

fn apply_edit(topic: &mut PlanTopic, edit: &TopicEdit) -> Result<()> {
    if let Some(date) = edit.target_date {
        topic.target_date = date;
    }
    if let Some(minutes) = edit.estimated_minutes {
        topic.estimated_minutes = minutes;
    }
    if let Some(priority) = edit.priority {
        topic.priority = priority;
    }
    if let Some(notes) = &edit.notes {
        topic.notes = Some(notes.clone());
    }

    match edit.transition {
        Some(TopicTransition::Skip) => {
            if topic.status.is_terminal() {
                return Err(EngineError::InvalidTransition {
                    topic: topic.topic_id.clone(),
                    from: topic.status,
                    to: TopicStatus::Skipped,
                });
            }
            debug!(topic = %topic.topic_id, from = %topic.status, "Skipping plan topic");
            topic.status = TopicStatus::Skipped;
        }
        Some(TopicTransition::Reset) => {
            debug!(topic = %topic.topic_id, from = %topic.status, "Resetting plan topic");
            topic.status = TopicStatus::Pending;
            topic.completed_at = None;
        }
        None => {}
    }

    Ok(())
}

/// Marks an active auto-advancing plan completed once every topic is closed.
pub fn advance_if_finished(plan: &mut StudyPlan) {
    if plan.settings.auto_advance && plan.status == PlanStatus::Active && plan.is_finished() {
        debug!(plan = %plan.id, "All topics closed, completing plan");
        plan.status = PlanStatus::Completed;
    }
}

pub fn todays_topics(plan: &StudyPlan, today: NaiveDate) -> Vec<PlanTopic> {
    plan.topics
        .iter()
        .filter(|t| t.target_date == today && t.is_open())
        .cloned()
        .collect()
}

pub fn overdue_topics(plan: &StudyPlan, today: NaiveDate) -> Vec<PlanTopic> {
    plan.topics
        .iter()
        .filter(|t| t.target_date < today && t.is_open())
        .cloned()
        .collect()
}
