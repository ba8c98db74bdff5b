//! Maps mastery to a difficulty label, a study recommendation, an activity
//! type and a time allocation.

use serde::{Deserialize, Serialize};

use crate::catalog::mastery_of;
use crate::config::EngineConfig;
use crate::models::{DifficultyLevel, MasteryMap, MasteryState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ReviewBasics,
    Practice,
    Challenge,
    TeachOthers,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::ReviewBasics => "review_basics",
            Recommendation::Practice => "practice",
            Recommendation::Challenge => "challenge",
            Recommendation::TeachOthers => "teach_others",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Recommendation::ReviewBasics => "Revisit the fundamentals before moving on",
            Recommendation::Practice => "Build fluency with guided practice",
            Recommendation::Challenge => "Stretch with harder problems",
            Recommendation::TeachOthers => "Consolidate by explaining it to someone else",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Review,
    Practice,
    Challenge,
    Mastery,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Review => "review",
            ActivityType::Practice => "practice",
            ActivityType::Challenge => "challenge",
            ActivityType::Mastery => "mastery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptiveDifficulty {
    pub topic_id: String,
    pub mastery: f64,
    pub level: DifficultyLevel,
    pub recommendation: Recommendation,
}

/// Everything a content generator needs to pitch the next activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyAdvice {
    pub difficulty: AdaptiveDifficulty,
    pub activity: ActivityType,
    pub recent_accuracy: Option<f64>,
    pub minutes: u32,
}

pub struct DifficultyAdvisor<'a> {
    config: &'a EngineConfig,
}

impl<'a> DifficultyAdvisor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn adaptive_difficulty(&self, topic_id: &str, mastery: &MasteryMap) -> AdaptiveDifficulty {
        let t = &self.config.thresholds;
        let a = &self.config.advice;
        let m = mastery_of(mastery, topic_id, self.config.bkt.prior);

        let recommendation = if m < a.review_basics_below {
            Recommendation::ReviewBasics
        } else if m < a.practice_below {
            Recommendation::Practice
        } else if m < a.challenge_below {
            Recommendation::Challenge
        } else {
            Recommendation::TeachOthers
        };

        AdaptiveDifficulty {
            topic_id: topic_id.to_string(),
            mastery: m,
            level: DifficultyLevel::from_mastery(m, t.beginner_below, t.intermediate_below),
            recommendation,
        }
    }

    /// `recent_accuracy` of `None` means no history, which never forces a review.
    pub fn activity_type(&self, mastery: f64, recent_accuracy: Option<f64>) -> ActivityType {
        let a = &self.config.advice;
        let struggling = recent_accuracy.is_some_and(|acc| acc < a.activity_accuracy_below);

        if mastery < a.activity_review_below || struggling {
            ActivityType::Review
        } else if mastery < a.activity_practice_below {
            ActivityType::Practice
        } else if mastery < a.activity_challenge_below {
            ActivityType::Challenge
        } else {
            ActivityType::Mastery
        }
    }

    /// Weak topics get the most time; never more than `remaining_budget`.
    pub fn time_allocation(&self, mastery: f64, remaining_budget: u32) -> u32 {
        let alloc = &self.config.allocation;
        let units = if mastery < alloc.weak_below {
            alloc.weak_units
        } else if mastery < alloc.moderate_below {
            alloc.moderate_units
        } else {
            alloc.strong_units
        };
        units.min(remaining_budget)
    }

    pub fn advise(&self, topic_id: &str, state: Option<&MasteryState>, remaining_budget: u32) -> StudyAdvice {
        let mut mastery = MasteryMap::new();
        if let Some(s) = state {
            mastery.insert(topic_id.to_string(), s.mastery);
        }
        let difficulty = self.adaptive_difficulty(topic_id, &mastery);
        let recent_accuracy =
            state.and_then(|s| s.recent_accuracy(self.config.thresholds.recent_window));

        StudyAdvice {
            activity: self.activity_type(difficulty.mastery, recent_accuracy),
            minutes: self.time_allocation(difficulty.mastery, remaining_budget),
            recent_accuracy,
            difficulty,
        }
    }
}
