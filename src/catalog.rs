//! Static registry of topics, their prerequisites and difficulty tiers.
//!
//! Loaded once at startup, either from a TOML file of `[[topics]]` tables or
//! from the built-in curriculum, and never mutated afterwards.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, Thresholds};
use crate::error::ConfigError;
use crate::models::{MasteryMap, Topic};

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    topics: Vec<Topic>,
}

#[derive(Debug, Clone)]
pub struct TopicCatalog {
    topics: Vec<Topic>,
    index: HashMap<String, usize>,
}

/// Mastery for `topic_id`, reading unseen topics at `prior`.
pub fn mastery_of(mastery: &MasteryMap, topic_id: &str, prior: f64) -> f64 {
    mastery.get(topic_id).copied().unwrap_or(prior)
}

impl TopicCatalog {
    pub fn new(topics: Vec<Topic>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(topics.len());
        for (i, topic) in topics.iter().enumerate() {
            if !(1..=3).contains(&topic.difficulty) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "topic '{}' has difficulty {} (expected 1-3)",
                    topic.id, topic.difficulty
                )));
            }
            if index.insert(topic.id.clone(), i).is_some() {
                return Err(ConfigError::InvalidCatalog(format!(
                    "duplicate topic id '{}'",
                    topic.id
                )));
            }
        }

        for topic in &topics {
            for prereq in &topic.prerequisites {
                if !index.contains_key(prereq) {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "topic '{}' requires unknown topic '{}'",
                        topic.id, prereq
                    )));
                }
            }
        }

        let catalog = Self { topics, index };
        catalog.check_acyclic()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file.topics)
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        match config.resolved_catalog_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::builtin()),
        }
    }

    /// The curriculum shipped with the binary.
    pub fn builtin() -> Self {
        let topic = |id: &str, name: &str, difficulty: u8, prerequisites: &[&str]| Topic {
            id: id.to_string(),
            name: name.to_string(),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            difficulty,
            description: None,
        };

        let topics = vec![
            topic("fundamentals", "Number Fundamentals", 1, &[]),
            topic("algebra", "Algebra", 1, &["fundamentals"]),
            topic("geometry", "Geometry", 1, &["fundamentals"]),
            topic("functions", "Functions", 2, &["algebra"]),
            topic("statistics", "Statistics", 2, &["algebra"]),
            topic("trigonometry", "Trigonometry", 2, &["geometry", "functions"]),
            topic("probability", "Probability", 2, &["statistics"]),
            topic("calculus", "Calculus", 3, &["functions", "trigonometry"]),
            topic("linear_algebra", "Linear Algebra", 3, &["algebra", "functions"]),
        ];

        let index = topics
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();
        Self { topics, index }
    }

    fn check_acyclic(&self) -> Result<(), ConfigError> {
        fn visit<'a>(
            catalog: &'a TopicCatalog,
            id: &'a str,
            visiting: &mut HashSet<&'a str>,
            done: &mut HashSet<&'a str>,
        ) -> Result<(), ConfigError> {
            if done.contains(id) {
                return Ok(());
            }
            if !visiting.insert(id) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "prerequisite cycle through '{}'",
                    id
                )));
            }
            if let Some(topic) = catalog.get(id) {
                for prereq in &topic.prerequisites {
                    visit(catalog, prereq, visiting, done)?;
                }
            }
            visiting.remove(id);
            done.insert(id);
            Ok(())
        }

        let mut visiting = HashSet::new();
        let mut done = HashSet::new();
        for topic in &self.topics {
            visit(self, &topic.id, &mut visiting, &mut done)?;
        }
        Ok(())
    }

    pub fn get(&self, topic_id: &str) -> Option<&Topic> {
        self.index.get(topic_id).map(|&i| &self.topics[i])
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// True when every prerequisite of `topic_id` is at or above `threshold`.
    /// Unknown topics are never considered unlocked.
    pub fn prerequisites_met(&self, topic_id: &str, mastery: &MasteryMap, threshold: f64, prior: f64) -> bool {
        match self.get(topic_id) {
            Some(topic) => topic
                .prerequisites
                .iter()
                .all(|p| mastery_of(mastery, p, prior) >= threshold),
            None => false,
        }
    }

    /// Unlocked, not-yet-mastered topics: easiest tier first, then the ones
    /// closest to mastery.
    pub fn recommend(&self, mastery: &MasteryMap, thresholds: &Thresholds, prior: f64) -> Vec<&Topic> {
        let mut candidates: Vec<(&Topic, f64)> = self
            .topics
            .iter()
            .map(|t| (t, mastery_of(mastery, &t.id, prior)))
            .filter(|(t, m)| {
                *m < thresholds.recommend_below
                    && self.prerequisites_met(&t.id, mastery, thresholds.prerequisite, prior)
            })
            .collect();

        candidates.sort_by(|(a, ma), (b, mb)| {
            a.difficulty
                .cmp(&b.difficulty)
                .then_with(|| mb.total_cmp(ma))
        });

        candidates
            .into_iter()
            .take(thresholds.recommend_limit)
            .map(|(t, _)| t)
            .collect()
    }
}
