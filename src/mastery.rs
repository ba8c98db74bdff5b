//! Bayesian Knowledge Tracing over a student's per-topic mastery states.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::{BktParams, EngineConfig};
use crate::error::{EngineError, Result};
use crate::models::{DifficultyLevel, Interaction, InteractionType, MasteryState, Metadata};

#[derive(Debug, Clone)]
pub struct MasteryTracker {
    params: BktParams,
    beginner_below: f64,
    intermediate_below: f64,
}

impl MasteryTracker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            params: config.bkt.clone(),
            beginner_below: config.thresholds.beginner_below,
            intermediate_below: config.thresholds.intermediate_below,
        }
    }

    pub fn params(&self) -> &BktParams {
        &self.params
    }

    pub fn label(&self, mastery: f64) -> DifficultyLevel {
        DifficultyLevel::from_mastery(mastery, self.beginner_below, self.intermediate_below)
    }

    /// A fresh state at the prior.
    pub fn initialize(&self, topic_id: &str) -> MasteryState {
        let mastery = self.params.prior.clamp(0.0, 1.0);
        MasteryState {
            topic_id: topic_id.to_string(),
            mastery,
            attempts: 0,
            correct: 0,
            difficulty: self.label(mastery),
            last_update: None,
            interactions: Vec::new(),
        }
    }

    /// P(mastered | observation).
    pub fn posterior(&self, mastery: f64, is_correct: bool) -> f64 {
        let BktParams { guess, slip, .. } = self.params;
        let (evidence_if_known, evidence_if_unknown) = if is_correct {
            (mastery * (1.0 - slip), (1.0 - mastery) * guess)
        } else {
            (mastery * slip, (1.0 - mastery) * (1.0 - guess))
        };

        let total = evidence_if_known + evidence_if_unknown;
        if total <= 0.0 {
            // The observation is impossible under the model; keep the prior belief.
            return mastery;
        }
        evidence_if_known / total
    }

    /// Posterior followed by the learning transition, clamped to [0, 1].
    pub fn next_mastery(&self, mastery: f64, is_correct: bool) -> Result<f64> {
        let posterior = self.posterior(mastery, is_correct);
        let learned = posterior + (1.0 - posterior) * self.params.learn;
        if !learned.is_finite() {
            return Err(EngineError::InvalidProbability(learned));
        }
        Ok(learned.clamp(0.0, 1.0))
    }

    pub fn predict_correctness(&self, mastery: f64) -> f64 {
        let BktParams { guess, slip, .. } = self.params;
        mastery * (1.0 - slip) + (1.0 - mastery) * guess
    }

    /// Applies one observation to `topic_id`, creating its state at the prior if needed.
    pub fn update(
        &self,
        states: &mut BTreeMap<String, MasteryState>,
        topic_id: &str,
        is_correct: bool,
        interaction_type: InteractionType,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Result<MasteryState> {
        let current = states
            .get(topic_id)
            .map(|s| s.mastery)
            .unwrap_or(self.params.prior);
        let mastery = self.next_mastery(current, is_correct)?;

        let state = states
            .entry(topic_id.to_string())
            .or_insert_with(|| self.initialize(topic_id));

        state.mastery = mastery;
        state.attempts += 1;
        if is_correct {
            state.correct += 1;
        }
        state.difficulty = self.label(mastery);
        state.last_update = Some(now);
        state.interactions.push(Interaction {
            timestamp: now,
            correct: is_correct,
            interaction_type,
            metadata,
        });

        Ok(state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tracker() -> MasteryTracker {
        MasteryTracker::new(&EngineConfig::default())
    }

    fn tracker_with(learn: f64, guess: f64, slip: f64) -> MasteryTracker {
        let mut config = EngineConfig::default();
        config.bkt = BktParams {
            prior: 0.1,
            learn,
            guess,
            slip,
        };
        MasteryTracker::new(&config)
    }

    fn answer(tracker: &MasteryTracker, states: &mut BTreeMap<String, MasteryState>, correct: bool) -> MasteryState {
        tracker
            .update(
                states,
                "algebra",
                correct,
                InteractionType::Quiz,
                Metadata::new(),
                Utc::now(),
            )
            .unwrap()
    }

    mod scenario_tests {
        use super::*;

        #[test]
        fn correct_answer_from_prior() {
            let t = tracker();
            assert!((t.posterior(0.1, true) - 0.3333).abs() < 1e-4);
            assert!((t.next_mastery(0.1, true).unwrap() - 0.5333).abs() < 1e-4);
        }

        #[test]
        fn incorrect_answer_from_prior() {
            let t = tracker();
            assert!((t.posterior(0.1, false) - 0.0137).abs() < 1e-4);
            assert!((t.next_mastery(0.1, false).unwrap() - 0.3096).abs() < 1e-4);
        }

        #[test]
        fn predict_correctness_at_prior() {
            // 0.1 * 0.9 + 0.9 * 0.2
            assert!((tracker().predict_correctness(0.1) - 0.27).abs() < 1e-12);
        }

        #[test]
        fn predict_correctness_extremes() {
            let t = tracker();
            assert!((t.predict_correctness(0.0) - 0.2).abs() < 1e-12);
            assert!((t.predict_correctness(1.0) - 0.9).abs() < 1e-12);
        }
    }

    mod update_tests {
        use super::*;

        #[test]
        fn initialize_uses_prior() {
            let state = tracker().initialize("algebra");
            assert_eq!(state.mastery, 0.1);
            assert_eq!(state.attempts, 0);
            assert_eq!(state.difficulty, DifficultyLevel::Beginner);
            assert!(state.last_update.is_none());
        }

        #[test]
        fn unknown_topic_is_lazily_initialized() {
            let t = tracker();
            let mut states = BTreeMap::new();
            let state = answer(&t, &mut states, true);
            assert!((state.mastery - 0.5333).abs() < 1e-4);
            assert!(states.contains_key("algebra"));
        }

        #[test]
        fn counts_attempts_and_correct() {
            let t = tracker();
            let mut states = BTreeMap::new();
            answer(&t, &mut states, true);
            answer(&t, &mut states, false);
            let state = answer(&t, &mut states, true);
            assert_eq!(state.attempts, 3);
            assert_eq!(state.correct, 2);
            assert!(state.attempts >= state.correct);
        }

        #[test]
        fn appends_interaction_with_metadata() {
            let t = tracker();
            let mut states = BTreeMap::new();
            let mut metadata = Metadata::new();
            metadata.insert("question".to_string(), "q-17".into());
            let now = Utc::now();

            let state = t
                .update(&mut states, "algebra", false, InteractionType::Practice, metadata.clone(), now)
                .unwrap();

            assert_eq!(state.interactions.len(), 1);
            let interaction = &state.interactions[0];
            assert!(!interaction.correct);
            assert_eq!(interaction.interaction_type, InteractionType::Practice);
            assert_eq!(interaction.metadata, metadata);
            assert_eq!(state.last_update, Some(now));
        }

        #[test]
        fn label_follows_mastery() {
            let t = tracker();
            let mut states = BTreeMap::new();
            let first = answer(&t, &mut states, true);
            assert_eq!(first.difficulty, DifficultyLevel::Intermediate);
            answer(&t, &mut states, true);
            let third = answer(&t, &mut states, true);
            assert!(third.mastery >= 0.7);
            assert_eq!(third.difficulty, DifficultyLevel::Advanced);
        }

        #[test]
        fn degenerate_parameters_do_not_escape_range() {
            // guess = 0 with mastery = 0 makes a correct answer impossible
            let t = tracker_with(0.0, 0.0, 0.0);
            assert_eq!(t.next_mastery(0.0, true).unwrap(), 0.0);
        }
    }

    proptest! {
        #[test]
        fn update_stays_in_unit_interval(
            start in 0.0f64..=1.0,
            correct in any::<bool>(),
            learn in 0.0f64..=1.0,
            guess in 0.0f64..=1.0,
            slip in 0.0f64..=1.0,
        ) {
            let t = tracker_with(learn, guess, slip);
            let next = t.next_mastery(start, correct).unwrap();
            prop_assert!((0.0..=1.0).contains(&next));
        }

        #[test]
        fn repeated_correct_answers_never_decrease_mastery(steps in 1usize..40) {
            let t = tracker();
            let mut states = BTreeMap::new();
            let mut previous = t.params().prior;
            for _ in 0..steps {
                let state = answer(&t, &mut states, true);
                prop_assert!(state.mastery + 1e-12 >= previous);
                previous = state.mastery;
            }
        }
    }
}
