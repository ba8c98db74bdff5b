//! TOML-backed engine configuration.
//!
//! Every heuristic weight and threshold the engine uses lives here so it can
//! be tuned without touching the scoring code. The file is stored at
//! `~/.config/pathwise/config.toml` unless `PATHWISE_CONFIG` points elsewhere;
//! a missing file means all defaults.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_DIR: &str = "pathwise";
const DEFAULT_DB_NAME: &str = "pathwise.db";
const DEFAULT_CONFIG_NAME: &str = "config.toml";

/// Bayesian Knowledge Tracing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BktParams {
    /// P(L0): mastery assumed before any observation.
    pub prior: f64,
    /// P(T): chance of learning on each opportunity.
    pub learn: f64,
    /// P(G): chance of answering correctly without mastery.
    pub guess: f64,
    /// P(S): chance of answering wrongly despite mastery.
    pub slip: f64,
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            prior: 0.1,
            learn: 0.3,
            guess: 0.2,
            slip: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub beginner_below: f64,
    pub intermediate_below: f64,
    /// Prerequisite mastery needed before a topic counts as unlocked.
    pub prerequisite: f64,
    pub recommend_below: f64,
    pub recommend_limit: usize,
    pub sweet_spot_min: f64,
    pub sweet_spot_max: f64,
    pub default_topic: String,
    /// Interactions considered when computing recent accuracy.
    pub recent_window: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            beginner_below: 0.3,
            intermediate_below: 0.7,
            prerequisite: 0.7,
            recommend_below: 0.8,
            recommend_limit: 3,
            sweet_spot_min: 0.2,
            sweet_spot_max: 0.8,
            default_topic: "fundamentals".to_string(),
            recent_window: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessWeights {
    pub prerequisite_weight: f64,
    /// Weight on the topic's remaining headroom, `1 - mastery`.
    pub gap_weight: f64,
    pub mastered_above: f64,
    pub mastered_discount: f64,
    pub growth_min: f64,
    pub growth_max: f64,
    pub growth_boost: f64,
    /// Readiness lost per difficulty tier above 1.
    pub ease_step: f64,
}

impl Default for ReadinessWeights {
    fn default() -> Self {
        Self {
            prerequisite_weight: 0.8,
            gap_weight: 0.2,
            mastered_above: 0.8,
            mastered_discount: 0.3,
            growth_min: 0.4,
            growth_max: 0.8,
            growth_boost: 1.2,
            ease_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub base: f64,
    pub focus_bonus: f64,
    pub partial_min: f64,
    pub partial_max: f64,
    pub partial_bonus: f64,
    pub difficulty_match: f64,
    pub difficulty_adjacent: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            focus_bonus: 0.3,
            partial_min: 0.2,
            partial_max: 0.7,
            partial_bonus: 0.2,
            difficulty_match: 0.1,
            difficulty_adjacent: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceThresholds {
    pub review_basics_below: f64,
    pub practice_below: f64,
    pub challenge_below: f64,
    pub activity_review_below: f64,
    pub activity_accuracy_below: f64,
    pub activity_practice_below: f64,
    pub activity_challenge_below: f64,
}

impl Default for AdviceThresholds {
    fn default() -> Self {
        Self {
            review_basics_below: 0.2,
            practice_below: 0.5,
            challenge_below: 0.8,
            activity_review_below: 0.3,
            activity_accuracy_below: 0.5,
            activity_practice_below: 0.6,
            activity_challenge_below: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAllocation {
    pub weak_below: f64,
    pub weak_units: u32,
    pub moderate_below: f64,
    pub moderate_units: u32,
    pub strong_units: u32,
}

impl Default for TimeAllocation {
    fn default() -> Self {
        Self {
            weak_below: 0.3,
            weak_units: 20,
            moderate_below: 0.7,
            moderate_units: 15,
            strong_units: 10,
        }
    }
}

/// When a plan topic counts as done. A tunable heuristic, not a rule of the domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionRule {
    pub min_completed_sessions: usize,
    pub quiz_pass_score: f64,
    /// Quiz score at or above which the quiz feeds mastery as a correct answer.
    pub quiz_correct_score: f64,
}

impl Default for CompletionRule {
    fn default() -> Self {
        Self {
            min_completed_sessions: 2,
            quiz_pass_score: 80.0,
            quiz_correct_score: 70.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDefaults {
    pub minutes_tier1: u32,
    pub minutes_tier2: u32,
    pub minutes_tier3: u32,
    pub reminder_time: NaiveTime,
    pub hours_per_day: f64,
    pub days_per_week: u32,
    pub include_weekends: bool,
}

impl ScheduleDefaults {
    pub fn minutes_for_tier(&self, tier: u8) -> u32 {
        match tier {
            0 | 1 => self.minutes_tier1,
            2 => self.minutes_tier2,
            _ => self.minutes_tier3,
        }
    }
}

impl Default for ScheduleDefaults {
    fn default() -> Self {
        Self {
            minutes_tier1: 30,
            minutes_tier2: 45,
            minutes_tier3: 60,
            reminder_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            hours_per_day: 2.0,
            days_per_week: 7,
            include_weekends: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// TOML topic catalog; the built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    pub bkt: BktParams,
    pub thresholds: Thresholds,
    pub readiness: ReadinessWeights,
    pub priority: PriorityWeights,
    pub advice: AdviceThresholds,
    pub allocation: TimeAllocation,
    pub completion: CompletionRule,
    pub schedule: ScheduleDefaults,
}

impl EngineConfig {
    /// Reads the config at `path`, falling back to defaults when the file is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Catalog file to load, `PATHWISE_CATALOG` taking precedence over the config.
    pub fn resolved_catalog_path(&self) -> Option<PathBuf> {
        std::env::var("PATHWISE_CATALOG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.catalog_path.clone())
    }
}

fn app_dir() -> PathBuf {
    let dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);

    std::fs::create_dir_all(&dir).ok();
    dir
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PATHWISE_CONFIG") {
        return PathBuf::from(path);
    }
    app_dir().join(DEFAULT_CONFIG_NAME)
}

pub fn db_path() -> PathBuf {
    if let Ok(path) = std::env::var("PATHWISE_DB") {
        return PathBuf::from(path);
    }
    app_dir().join(DEFAULT_DB_NAME)
}
