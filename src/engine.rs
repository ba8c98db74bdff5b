//! The entry point callers use. Every mutating call runs one locked
//! read-modify-write cycle on a single student's record.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::catalog::TopicCatalog;
use crate::config::EngineConfig;
use crate::difficulty::{AdaptiveDifficulty, DifficultyAdvisor, StudyAdvice};
use crate::error::{EngineError, Result};
use crate::mastery::MasteryTracker;
use crate::models::{
    InteractionType, MasteryMap, MasteryState, Metadata, PlanTopic, SessionType, StudentRecord,
    StudyPlan, Topic,
};
use crate::scheduler::{
    self, requests_from_schedule, PlanOptions, PlanUpdate, ScheduleCandidate, ScheduleOptions,
    ScheduledDay, StudyPlanScheduler, TopicRequest,
};
use crate::selector::{self, Preferences, RankedTopic, TopicSelector};
use crate::session::{SessionData, SessionTracker};
use crate::store::StudentStore;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct Engine<S: StudentStore> {
    catalog: TopicCatalog,
    config: EngineConfig,
    tracker: MasteryTracker,
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    clock: Arc<dyn Clock>,
}

impl<S: StudentStore> Engine<S> {
    pub fn new(catalog: TopicCatalog, config: EngineConfig, store: S) -> Self {
        Self {
            tracker: MasteryTracker::new(&config),
            catalog,
            config,
            store,
            locks: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn catalog(&self) -> &TopicCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    fn lock_for(&self, student_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(student_id.to_string())
            .or_default()
            .clone()
    }

    fn load(&self, student_id: &str) -> Result<StudentRecord> {
        Ok(self
            .store
            .load(student_id)?
            .unwrap_or_else(|| StudentRecord::new(student_id)))
    }

    /// Runs `f` on a working copy of the student's record under the student's
    /// lock. The copy is saved only if `f` succeeds.
    fn mutate<T>(
        &self,
        student_id: &str,
        f: impl FnOnce(&mut StudentRecord, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let lock = self.lock_for(student_id);
        let _guard = lock.lock();

        let mut record = self.load(student_id)?;
        let now = self.clock.now();
        let out = f(&mut record, now)?;
        record.updated_at = Some(now);
        self.store.save(&record)?;
        Ok(out)
    }

    fn plan_of(record: &StudentRecord) -> Result<&StudyPlan> {
        record
            .plan
            .as_ref()
            .ok_or_else(|| EngineError::PlanNotFound(record.student_id.clone()))
    }

    pub fn student_ids(&self) -> Result<Vec<String>> {
        Ok(self.store.student_ids()?)
    }

    // Mastery

    pub fn submit_interaction(
        &self,
        student_id: &str,
        topic_id: &str,
        is_correct: bool,
        interaction_type: InteractionType,
        metadata: Metadata,
    ) -> Result<MasteryState> {
        check_metadata(&metadata)?;
        self.mutate(student_id, |record, now| {
            let state = self.tracker.update(
                &mut record.mastery,
                topic_id,
                is_correct,
                interaction_type,
                metadata,
                now,
            )?;
            debug!(
                student = %student_id,
                topic = %topic_id,
                correct = is_correct,
                mastery = state.mastery,
                "Mastery updated"
            );
            Ok(state)
        })
    }

    pub fn get_mastery(&self, student_id: &str) -> Result<BTreeMap<String, MasteryState>> {
        Ok(self.load(student_id)?.mastery)
    }

    pub fn mastery_map(&self, student_id: &str) -> Result<MasteryMap> {
        Ok(self.load(student_id)?.mastery_map())
    }

    /// Drops one topic's state, or all of them. Returns how many were removed.
    pub fn reset_mastery(&self, student_id: &str, topic_id: Option<&str>) -> Result<usize> {
        self.mutate(student_id, |record, _| {
            let removed = match topic_id {
                Some(id) => usize::from(record.mastery.remove(id).is_some()),
                None => {
                    let n = record.mastery.len();
                    record.mastery.clear();
                    n
                }
            };
            info!(student = %student_id, removed, "Mastery reset");
            Ok(removed)
        })
    }

    // Selection and difficulty

    /// Picks from the topics the student has touched plus every unlocked
    /// catalog topic, the untouched ones at the prior.
    pub fn select_optimal_topic(&self, student_id: &str) -> Result<String> {
        let mut mastery = self.mastery_map(student_id)?;
        let prior = self.config.bkt.prior;
        let unlocked: Vec<&str> = self
            .catalog
            .topics()
            .iter()
            .filter(|t| {
                !mastery.contains_key(&t.id)
                    && self
                        .catalog
                        .prerequisites_met(&t.id, &mastery, self.config.thresholds.prerequisite, prior)
            })
            .map(|t| t.id.as_str())
            .collect();
        for id in unlocked {
            mastery.insert(id.to_string(), prior);
        }
        let topic = selector::select_optimal_topic(&mastery, &self.config.thresholds);
        debug!(student = %student_id, topic = %topic, "Selected next topic");
        Ok(topic)
    }

    pub fn recommend(&self, student_id: &str) -> Result<Vec<Topic>> {
        let mastery = self.mastery_map(student_id)?;
        Ok(self
            .catalog
            .recommend(&mastery, &self.config.thresholds, self.config.bkt.prior)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn rank_topics(&self, student_id: &str, preferences: &Preferences) -> Result<Vec<RankedTopic>> {
        let mastery = self.mastery_map(student_id)?;
        Ok(TopicSelector::new(&self.catalog, &self.config).rank(&mastery, preferences))
    }

    pub fn adaptive_difficulty(&self, student_id: &str, topic_id: &str) -> Result<AdaptiveDifficulty> {
        let mastery = self.mastery_map(student_id)?;
        Ok(DifficultyAdvisor::new(&self.config).adaptive_difficulty(topic_id, &mastery))
    }

    pub fn advice(&self, student_id: &str, topic_id: &str, remaining_minutes: u32) -> Result<StudyAdvice> {
        let record = self.load(student_id)?;
        Ok(DifficultyAdvisor::new(&self.config).advise(
            topic_id,
            record.mastery.get(topic_id),
            remaining_minutes,
        ))
    }

    // Plans

    pub fn get_plan(&self, student_id: &str) -> Result<StudyPlan> {
        let record = self.load(student_id)?;
        Self::plan_of(&record).cloned()
    }

    /// Builds a plan and replaces any existing one. An unknown topic leaves
    /// the stored record untouched.
    pub fn create_plan(
        &self,
        student_id: &str,
        requests: &[TopicRequest],
        options: &PlanOptions,
    ) -> Result<StudyPlan> {
        self.mutate(student_id, |record, now| {
            let plan = StudyPlanScheduler::new(&self.catalog, &self.config).create_plan(
                student_id,
                requests,
                options,
                now.date_naive(),
                now,
            )?;
            let replaced = record.plan.replace(plan.clone());
            info!(
                student = %student_id,
                plan = %plan.id,
                topics = plan.topics.len(),
                replaced = replaced.is_some(),
                "Study plan created"
            );
            Ok(plan)
        })
    }

    pub fn update_plan(&self, student_id: &str, update: &PlanUpdate) -> Result<StudyPlan> {
        self.mutate(student_id, |record, now| {
            let current = Self::plan_of(record)?;
            let plan = StudyPlanScheduler::new(&self.catalog, &self.config).apply_update(
                current,
                update,
                now.date_naive(),
                now,
            )?;
            info!(student = %student_id, plan = %plan.id, status = plan.status.as_str(), "Study plan updated");
            record.plan = Some(plan.clone());
            Ok(plan)
        })
    }

    pub fn delete_plan(&self, student_id: &str) -> Result<StudyPlan> {
        self.mutate(student_id, |record, _| {
            let plan = record
                .plan
                .take()
                .ok_or_else(|| EngineError::PlanNotFound(student_id.to_string()))?;
            info!(student = %student_id, plan = %plan.id, "Study plan deleted");
            Ok(plan)
        })
    }

    /// Records a session and, for scored quizzes, feeds the result to mastery.
    pub fn record_session(&self, student_id: &str, topic_id: &str, data: &SessionData) -> Result<StudyPlan> {
        if let Some(score) = data.score {
            if !(0.0..=100.0).contains(&score) {
                return Err(EngineError::InvalidInput(format!(
                    "quiz score must be between 0 and 100, got {}",
                    score
                )));
            }
        }
        check_metadata(&data.metadata)?;
        self.mutate(student_id, |record, now| {
            let current = Self::plan_of(record)?;
            let before = current.topic(topic_id).map(|t| t.status);
            let (plan, session) =
                SessionTracker::new(&self.config.completion).record(current, topic_id, data, now)?;

            if let Some(topic) = plan.topic(topic_id) {
                if before != Some(topic.status) {
                    info!(student = %student_id, topic = %topic_id, status = %topic.status, "Topic status changed");
                }
            }
            debug!(
                student = %student_id,
                topic = %topic_id,
                streak = plan.stats.streak_days,
                "Session recorded"
            );

            if let (SessionType::Quiz, Some(score)) = (session.session_type, session.score) {
                let mut metadata = Metadata::new();
                metadata.insert("session_id".to_string(), session.id.clone().into());
                metadata.insert("score".to_string(), score.into());
                self.tracker.update(
                    &mut record.mastery,
                    topic_id,
                    score >= self.config.completion.quiz_correct_score,
                    InteractionType::Quiz,
                    metadata,
                    now,
                )?;
            }

            record.plan = Some(plan.clone());
            Ok(plan)
        })
    }

    pub fn get_todays_topics(&self, student_id: &str) -> Result<Vec<PlanTopic>> {
        let record = self.load(student_id)?;
        Ok(scheduler::todays_topics(Self::plan_of(&record)?, self.today()))
    }

    pub fn get_overdue_topics(&self, student_id: &str) -> Result<Vec<PlanTopic>> {
        let record = self.load(student_id)?;
        Ok(scheduler::overdue_topics(Self::plan_of(&record)?, self.today()))
    }

    // Schedules

    /// Ranked topics the student has not yet mastered, as schedule input.
    fn schedule_candidates(&self, record: &StudentRecord, preferences: &Preferences) -> Vec<ScheduleCandidate> {
        let mastery = record.mastery_map();
        TopicSelector::new(&self.catalog, &self.config)
            .rank(&mastery, preferences)
            .into_iter()
            .filter(|r| r.mastery < self.config.thresholds.recommend_below)
            .map(|r| ScheduleCandidate {
                estimated_minutes: self.config.schedule.minutes_for_tier(r.difficulty),
                attempts: record.mastery.get(&r.topic_id).map_or(0, |s| s.attempts),
                mastery: r.mastery,
                topic_id: r.topic_id,
            })
            .collect()
    }

    pub fn build_schedule(
        &self,
        student_id: &str,
        preferences: &Preferences,
        options: &ScheduleOptions,
    ) -> Result<Vec<ScheduledDay>> {
        let record = self.load(student_id)?;
        let candidates = self.schedule_candidates(&record, preferences);
        StudyPlanScheduler::new(&self.catalog, &self.config).build_schedule(&candidates, options)
    }

    /// Builds a schedule and stores it as the student's plan.
    pub fn schedule_plan(
        &self,
        student_id: &str,
        preferences: &Preferences,
        options: &ScheduleOptions,
        plan_options: &PlanOptions,
    ) -> Result<StudyPlan> {
        let days = self.build_schedule(student_id, preferences, options)?;
        let plan_options = PlanOptions {
            include_weekends: plan_options.include_weekends.or(Some(options.include_weekends)),
            ..plan_options.clone()
        };
        self.create_plan(student_id, &requests_from_schedule(&days), &plan_options)
    }
}

/// Rejects metadata that would not survive a JSON round trip.
fn check_metadata(metadata: &Metadata) -> Result<()> {
    match metadata.iter().find(|(_, v)| !v.is_finite()) {
        Some((key, _)) => Err(EngineError::InvalidInput(format!(
            "metadata '{}' must be a finite number",
            key
        ))),
        None => Ok(()),
    }
}
