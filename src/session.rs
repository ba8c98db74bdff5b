//! Records study sessions against plan topics and drives topic status,
//! plan aggregates and the study streak.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CompletionRule;
use crate::error::{EngineError, Result};
use crate::models::{new_id, Metadata, SessionType, StudyPlan, StudySession, TopicStatus};
use crate::scheduler::advance_if_finished;

/// What the caller knows about a session that just ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub session_type: SessionType,
    pub duration_minutes: u32,
    pub score: Option<f64>,
    pub completed: bool,
    pub notes: Option<String>,
    pub metadata: Metadata,
    /// Defaults to `duration_minutes` before the recording time.
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            session_type: SessionType::Study,
            duration_minutes: 0,
            score: None,
            completed: true,
            notes: None,
            metadata: Metadata::new(),
            started_at: None,
        }
    }
}

impl SessionData {
    pub fn study(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            ..Default::default()
        }
    }

    pub fn quiz(duration_minutes: u32, score: f64) -> Self {
        Self {
            session_type: SessionType::Quiz,
            duration_minutes,
            score: Some(score),
            ..Default::default()
        }
    }
}

/// Streak after studying on `today`, given the previous study date.
pub fn next_streak(current: u32, last_study: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_study {
        None => 1,
        Some(last) if last == today => current.max(1),
        Some(last) if last.succ_opt() == Some(today) => current + 1,
        Some(_) => 1,
    }
}

pub struct SessionTracker<'a> {
    rule: &'a CompletionRule,
}

impl<'a> SessionTracker<'a> {
    pub fn new(rule: &'a CompletionRule) -> Self {
        Self { rule }
    }

    fn meets_completion(&self, completed_sessions: usize, best_quiz: Option<f64>) -> bool {
        completed_sessions >= self.rule.min_completed_sessions
            || best_quiz.is_some_and(|score| score >= self.rule.quiz_pass_score)
    }

    /// Appends a session to `topic_id` in a copy of `plan` and returns the copy.
    pub fn record(
        &self,
        plan: &StudyPlan,
        topic_id: &str,
        data: &SessionData,
        now: DateTime<Utc>,
    ) -> Result<(StudyPlan, StudySession)> {
        let mut next = plan.clone();
        let topic = next
            .topic_mut(topic_id)
            .ok_or_else(|| EngineError::TopicNotInPlan {
                student: plan.student_id.clone(),
                topic: topic_id.to_string(),
            })?;

        let session = StudySession {
            id: new_id("session"),
            started_at: data
                .started_at
                .unwrap_or_else(|| now - Duration::minutes(i64::from(data.duration_minutes))),
            ended_at: now,
            duration_minutes: data.duration_minutes,
            session_type: data.session_type,
            score: data.score,
            completed: data.completed,
            notes: data.notes.clone(),
            metadata: data.metadata.clone(),
        };
        topic.sessions.push(session.clone());

        if topic.status == TopicStatus::Pending {
            debug!(topic = %topic_id, "First session, topic in progress");
            topic.status = TopicStatus::InProgress;
        }
        if topic.status == TopicStatus::InProgress
            && self.meets_completion(topic.completed_sessions(), topic.best_quiz_score())
        {
            debug!(topic = %topic_id, sessions = topic.sessions.len(), "Topic completed");
            topic.status = TopicStatus::Completed;
            topic.completed_at = Some(now);
        }

        let today = now.date_naive();
        let stats = &mut next.stats;
        stats.total_sessions += 1;
        stats.total_minutes += data.duration_minutes;
        stats.streak_days = next_streak(stats.streak_days, stats.last_study_date, today);
        stats.longest_streak = stats.longest_streak.max(stats.streak_days);
        stats.last_study_date = Some(today);

        next.refresh_topic_counts();
        advance_if_finished(&mut next);
        next.updated_at = now;

        Ok((next, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TopicCatalog;
    use crate::config::EngineConfig;
    use crate::models::PlanStatus;
    use crate::scheduler::{PlanOptions, StudyPlanScheduler, TopicRequest};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    fn plan(topics: &[&str]) -> StudyPlan {
        let catalog = TopicCatalog::builtin();
        let config = EngineConfig::default();
        let requests: Vec<TopicRequest> = topics.iter().map(|t| TopicRequest::new(t)).collect();
        StudyPlanScheduler::new(&catalog, &config)
            .create_plan(
                "student-1",
                &requests,
                &PlanOptions::default(),
                at(19, 8).date_naive(),
                at(19, 8),
            )
            .unwrap()
    }

    fn record(plan: &StudyPlan, topic: &str, data: SessionData, now: DateTime<Utc>) -> StudyPlan {
        let rule = CompletionRule::default();
        SessionTracker::new(&rule).record(plan, topic, &data, now).unwrap().0
    }

    mod transition_tests {
        use super::*;

        #[test]
        fn first_session_starts_topic() {
            let p = record(&plan(&["algebra", "geometry"]), "algebra", SessionData::study(30), at(19, 9));
            let topic = p.topic("algebra").unwrap();
            assert_eq!(topic.status, TopicStatus::InProgress);
            assert_eq!(topic.sessions.len(), 1);
            assert_eq!(p.stats.in_progress_topics, 1);
            assert_eq!(p.stats.pending_topics, 1);
        }

        #[test]
        fn two_completed_sessions_complete_topic() {
            let p = plan(&["algebra", "geometry"]);
            let p = record(&p, "algebra", SessionData::study(30), at(19, 9));
            let p = record(&p, "algebra", SessionData::study(30), at(19, 10));
            let topic = p.topic("algebra").unwrap();
            assert_eq!(topic.status, TopicStatus::Completed);
            assert_eq!(topic.completed_at, Some(at(19, 10)));
            assert_eq!(p.stats.completed_topics, 1);
        }

        #[test]
        fn unfinished_sessions_do_not_count() {
            let p = plan(&["algebra", "geometry"]);
            let unfinished = SessionData {
                completed: false,
                ..SessionData::study(20)
            };
            let p = record(&p, "algebra", unfinished.clone(), at(19, 9));
            let p = record(&p, "algebra", unfinished, at(19, 10));
            assert_eq!(p.topic("algebra").unwrap().status, TopicStatus::InProgress);
        }

        #[test]
        fn passing_quiz_completes_after_one_session() {
            let p = record(&plan(&["algebra", "geometry"]), "algebra", SessionData::quiz(15, 85.0), at(19, 9));
            assert_eq!(p.topic("algebra").unwrap().status, TopicStatus::Completed);
        }

        #[test]
        fn low_quiz_score_does_not_complete() {
            let p = record(&plan(&["algebra", "geometry"]), "algebra", SessionData::quiz(15, 79.0), at(19, 9));
            assert_eq!(p.topic("algebra").unwrap().status, TopicStatus::InProgress);
        }

        #[test]
        fn closed_topic_keeps_status_but_logs_session() {
            let mut p = plan(&["algebra", "geometry"]);
            p.topic_mut("algebra").unwrap().status = TopicStatus::Skipped;
            let p = record(&p, "algebra", SessionData::quiz(15, 95.0), at(19, 9));
            let topic = p.topic("algebra").unwrap();
            assert_eq!(topic.status, TopicStatus::Skipped);
            assert_eq!(topic.sessions.len(), 1);
            assert_eq!(p.stats.total_sessions, 1);
        }

        #[test]
        fn unknown_topic_is_rejected_without_change() {
            let p = plan(&["algebra"]);
            let rule = CompletionRule::default();
            let err = SessionTracker::new(&rule)
                .record(&p, "calculus", &SessionData::study(30), at(19, 9))
                .unwrap_err();
            assert!(matches!(err, EngineError::TopicNotInPlan { .. }));
            assert_eq!(p.stats.total_sessions, 0);
        }

        #[test]
        fn completion_rule_is_tunable() {
            let rule = CompletionRule {
                min_completed_sessions: 1,
                ..Default::default()
            };
            let (p, _) = SessionTracker::new(&rule)
                .record(&plan(&["algebra", "geometry"]), "algebra", &SessionData::study(30), at(19, 9))
                .unwrap();
            assert_eq!(p.topic("algebra").unwrap().status, TopicStatus::Completed);
        }

        #[test]
        fn finishing_last_topic_completes_plan() {
            let p = record(&plan(&["algebra"]), "algebra", SessionData::quiz(10, 90.0), at(19, 9));
            assert_eq!(p.status, PlanStatus::Completed);
        }

        #[test]
        fn auto_advance_off_keeps_plan_active() {
            let mut p = plan(&["algebra"]);
            p.settings.auto_advance = false;
            let p = record(&p, "algebra", SessionData::quiz(10, 90.0), at(19, 9));
            assert_eq!(p.status, PlanStatus::Active);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn aggregates_sessions_and_minutes() {
            let p = plan(&["algebra", "geometry"]);
            let p = record(&p, "algebra", SessionData::study(30), at(19, 9));
            let p = record(&p, "geometry", SessionData::study(45), at(19, 10));
            assert_eq!(p.stats.total_sessions, 2);
            assert_eq!(p.stats.total_minutes, 75);
            assert_eq!(p.stats.last_study_date, Some(at(19, 10).date_naive()));
        }

        #[test]
        fn session_start_defaults_to_duration_before_end() {
            let rule = CompletionRule::default();
            let (_, session) = SessionTracker::new(&rule)
                .record(&plan(&["algebra"]), "algebra", &SessionData::study(60), at(19, 10))
                .unwrap();
            assert_eq!(session.started_at, at(19, 9));
            assert_eq!(session.ended_at, at(19, 10));
        }
    }

    mod streak_tests {
        use super::*;

        fn d(day: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
        }

        #[test]
        fn rule() {
            assert_eq!(next_streak(0, None, d(19)), 1);
            assert_eq!(next_streak(3, Some(d(19)), d(19)), 3);
            assert_eq!(next_streak(3, Some(d(18)), d(19)), 4);
            assert_eq!(next_streak(3, Some(d(17)), d(19)), 1);
        }

        #[test]
        fn consecutive_days_then_gap() {
            let mut p = plan(&["algebra", "geometry", "functions"]);
            let mut streaks = Vec::new();
            for day in [19, 20, 20, 21, 24] {
                let data = SessionData {
                    completed: false,
                    ..SessionData::study(10)
                };
                p = record(&p, "functions", data, at(day, 18));
                streaks.push(p.stats.streak_days);
            }
            assert_eq!(streaks, vec![1, 2, 2, 3, 1]);
            assert_eq!(p.stats.longest_streak, 3);
        }
    }
}
