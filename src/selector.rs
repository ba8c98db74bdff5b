//! Readiness and priority scoring, and the choice of what to study next.

use serde::{Deserialize, Serialize};

use crate::catalog::{mastery_of, TopicCatalog};
use crate::config::{EngineConfig, Thresholds};
use crate::models::{MasteryMap, Topic};

/// Caller-supplied study preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Topic ids (or names, case-insensitive) the student wants to focus on.
    pub focus_areas: Vec<String>,
    pub preferred_difficulty: Option<u8>,
}

impl Preferences {
    fn is_focus(&self, topic: &Topic) -> bool {
        self.focus_areas
            .iter()
            .any(|f| f == &topic.id || f.eq_ignore_ascii_case(&topic.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTopic {
    pub topic_id: String,
    pub name: String,
    pub difficulty: u8,
    pub mastery: f64,
    pub readiness: f64,
    pub priority: f64,
    pub prerequisites_met: bool,
}

pub struct TopicSelector<'a> {
    catalog: &'a TopicCatalog,
    config: &'a EngineConfig,
}

impl<'a> TopicSelector<'a> {
    pub fn new(catalog: &'a TopicCatalog, config: &'a EngineConfig) -> Self {
        Self { catalog, config }
    }

    fn mastery(&self, mastery: &MasteryMap, topic_id: &str) -> f64 {
        mastery_of(mastery, topic_id, self.config.bkt.prior)
    }

    /// How prepared the student is to take on `topic` right now.
    pub fn readiness(&self, topic: &Topic, mastery: &MasteryMap) -> f64 {
        let w = &self.config.readiness;

        let prerequisite_avg = if topic.prerequisites.is_empty() {
            1.0
        } else {
            let sum: f64 = topic
                .prerequisites
                .iter()
                .map(|p| self.mastery(mastery, p))
                .sum();
            sum / topic.prerequisites.len() as f64
        };

        let own = self.mastery(mastery, &topic.id);
        let mut readiness = prerequisite_avg * w.prerequisite_weight + (1.0 - own) * w.gap_weight;

        if own > w.mastered_above {
            readiness *= w.mastered_discount;
        } else if own > w.growth_min && own < w.growth_max {
            readiness *= w.growth_boost;
        }

        let tiers_above_first = topic.difficulty.saturating_sub(1) as f64;
        readiness *= 1.0 - tiers_above_first * w.ease_step;

        readiness.clamp(0.0, 1.0)
    }

    pub fn priority(&self, topic: &Topic, mastery: &MasteryMap, preferences: &Preferences) -> f64 {
        let w = &self.config.priority;
        let own = self.mastery(mastery, &topic.id);

        let mut priority = w.base;
        if preferences.is_focus(topic) {
            priority += w.focus_bonus;
        }
        if own >= w.partial_min && own <= w.partial_max {
            priority += w.partial_bonus;
        }
        if let Some(preferred) = preferences.preferred_difficulty {
            match topic.difficulty.abs_diff(preferred) {
                0 => priority += w.difficulty_match,
                1 => priority += w.difficulty_adjacent,
                _ => {}
            }
        }

        priority.clamp(0.0, 1.0)
    }

    /// Every catalog topic, highest priority first, then highest readiness.
    /// Remaining ties keep catalog declaration order.
    pub fn rank(&self, mastery: &MasteryMap, preferences: &Preferences) -> Vec<RankedTopic> {
        let prerequisite = self.config.thresholds.prerequisite;
        let prior = self.config.bkt.prior;

        let mut ranked: Vec<RankedTopic> = self
            .catalog
            .topics()
            .iter()
            .map(|topic| RankedTopic {
                topic_id: topic.id.clone(),
                name: topic.name.clone(),
                difficulty: topic.difficulty,
                mastery: self.mastery(mastery, &topic.id),
                readiness: self.readiness(topic, mastery),
                priority: self.priority(topic, mastery, preferences),
                prerequisites_met: self
                    .catalog
                    .prerequisites_met(&topic.id, mastery, prerequisite, prior),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.priority
                .total_cmp(&a.priority)
                .then_with(|| b.readiness.total_cmp(&a.readiness))
        });
        ranked
    }
}

/// Lowest-mastery topic inside the sweet spot, else the lowest overall, else
/// the configured default topic.
pub fn select_optimal_topic(mastery: &MasteryMap, thresholds: &Thresholds) -> String {
    let in_sweet_spot = mastery
        .iter()
        .filter(|(_, &m)| m >= thresholds.sweet_spot_min && m <= thresholds.sweet_spot_max);

    lowest(in_sweet_spot)
        .or_else(|| lowest(mastery.iter()))
        .unwrap_or_else(|| thresholds.default_topic.clone())
}

// First entry wins ties.
fn lowest<'m>(candidates: impl Iterator<Item = (&'m String, &'m f64)>) -> Option<String> {
    let mut best: Option<(&String, f64)> = None;
    for (id, &m) in candidates {
        match best {
            Some((_, b)) if b <= m => {}
            _ => best = Some((id, m)),
        }
    }
    best.map(|(id, _)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mastery(entries: &[(&str, f64)]) -> MasteryMap {
        entries.iter().map(|(id, m)| (id.to_string(), *m)).collect()
    }

    fn make_topic(id: &str, difficulty: u8, prerequisites: &[&str]) -> Topic {
        Topic {
            id: id.to_string(),
            name: id.to_uppercase(),
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
            difficulty,
            description: None,
        }
    }

    mod select_optimal_tests {
        use super::*;

        #[test]
        fn picks_lowest_in_sweet_spot() {
            let m = mastery(&[("A", 0.25), ("B", 0.50), ("C", 0.90)]);
            assert_eq!(select_optimal_topic(&m, &Thresholds::default()), "A");
        }

        #[test]
        fn sweet_spot_excludes_below_minimum() {
            let m = mastery(&[("A", 0.05), ("B", 0.50), ("C", 0.90)]);
            assert_eq!(select_optimal_topic(&m, &Thresholds::default()), "B");
        }

        #[test]
        fn sweet_spot_bounds_are_inclusive() {
            let m = mastery(&[("A", 0.8), ("B", 0.95)]);
            assert_eq!(select_optimal_topic(&m, &Thresholds::default()), "A");
        }

        #[test]
        fn falls_back_to_global_lowest() {
            let m = mastery(&[("A", 0.95), ("B", 0.1), ("C", 0.85)]);
            assert_eq!(select_optimal_topic(&m, &Thresholds::default()), "B");
        }

        #[test]
        fn empty_map_uses_default_topic() {
            assert_eq!(
                select_optimal_topic(&MasteryMap::new(), &Thresholds::default()),
                "fundamentals"
            );
        }

        #[test]
        fn ties_go_to_first_id() {
            let m = mastery(&[("b", 0.3), ("a", 0.3)]);
            assert_eq!(select_optimal_topic(&m, &Thresholds::default()), "a");
        }
    }

    mod readiness_tests {
        use super::*;

        fn score(topic: &Topic, m: &MasteryMap) -> f64 {
            let catalog = TopicCatalog::builtin();
            let config = EngineConfig::default();
            TopicSelector::new(&catalog, &config).readiness(topic, m)
        }

        #[test]
        fn no_prerequisites_unseen_topic() {
            // 1.0 * 0.8 + 0.9 * 0.2
            let r = score(&make_topic("x", 1, &[]), &MasteryMap::new());
            assert!((r - 0.98).abs() < 1e-9);
        }

        #[test]
        fn driven_by_prerequisite_average() {
            let topic = make_topic("x", 1, &["a", "b"]);
            let m = mastery(&[("a", 0.9), ("b", 0.5), ("x", 0.0)]);
            // 0.7 * 0.8 + 1.0 * 0.2
            assert!((score(&topic, &m) - 0.76).abs() < 1e-9);
        }

        #[test]
        fn mastered_topic_is_discounted() {
            let topic = make_topic("x", 1, &[]);
            let m = mastery(&[("x", 0.9)]);
            // (0.8 + 0.02) * 0.3
            assert!((score(&topic, &m) - 0.246).abs() < 1e-9);
        }

        #[test]
        fn growth_band_is_boosted_and_clamped() {
            let topic = make_topic("x", 1, &[]);
            let m = mastery(&[("x", 0.5)]);
            // (0.8 + 0.1) * 1.2 = 1.08 -> 1.0
            assert_eq!(score(&topic, &m), 1.0);
        }

        #[test]
        fn harder_tiers_are_less_ready() {
            let m = MasteryMap::new();
            let easy = score(&make_topic("x", 1, &[]), &m);
            let hard = score(&make_topic("x", 3, &[]), &m);
            assert!((hard - easy * 0.9).abs() < 1e-9);
        }
    }

    mod priority_tests {
        use super::*;

        fn score(topic: &Topic, m: &MasteryMap, prefs: &Preferences) -> f64 {
            let catalog = TopicCatalog::builtin();
            let config = EngineConfig::default();
            TopicSelector::new(&catalog, &config).priority(topic, m, prefs)
        }

        #[test]
        fn base_priority() {
            let p = score(&make_topic("x", 1, &[]), &MasteryMap::new(), &Preferences::default());
            assert!((p - 0.5).abs() < 1e-9);
        }

        #[test]
        fn focus_and_partial_mastery_bonuses() {
            let prefs = Preferences {
                focus_areas: vec!["x".to_string()],
                preferred_difficulty: None,
            };
            let p = score(&make_topic("x", 1, &[]), &mastery(&[("x", 0.4)]), &prefs);
            assert!((p - 1.0).abs() < 1e-9);
        }

        #[test]
        fn focus_matches_name_case_insensitively() {
            let prefs = Preferences {
                focus_areas: vec!["x".to_string()],
                preferred_difficulty: None,
            };
            let mut topic = make_topic("other", 1, &[]);
            topic.name = "X".to_string();
            assert!((score(&topic, &MasteryMap::new(), &prefs) - 0.8).abs() < 1e-9);
        }

        #[test]
        fn preferred_difficulty_exact_and_adjacent() {
            let prefs = Preferences {
                focus_areas: vec![],
                preferred_difficulty: Some(2),
            };
            let m = MasteryMap::new();
            assert!((score(&make_topic("x", 2, &[]), &m, &prefs) - 0.6).abs() < 1e-9);
            assert!((score(&make_topic("x", 3, &[]), &m, &prefs) - 0.55).abs() < 1e-9);

            let far = Preferences {
                focus_areas: vec![],
                preferred_difficulty: Some(3),
            };
            assert!((score(&make_topic("x", 1, &[]), &m, &far) - 0.5).abs() < 1e-9);
        }
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn orders_by_priority_then_readiness_then_declaration() {
            let catalog = TopicCatalog::new(vec![
                make_topic("first", 1, &[]),
                make_topic("second", 1, &[]),
                make_topic("locked", 1, &["first"]),
                make_topic("focus", 2, &[]),
            ])
            .unwrap();
            let config = EngineConfig::default();
            let selector = TopicSelector::new(&catalog, &config);
            let prefs = Preferences {
                focus_areas: vec!["focus".to_string()],
                preferred_difficulty: None,
            };

            let ranked = selector.rank(&MasteryMap::new(), &prefs);
            let ids: Vec<&str> = ranked.iter().map(|r| r.topic_id.as_str()).collect();
            // focus wins on priority; first/second tie fully and keep declaration
            // order; locked has equal priority but lower readiness
            assert_eq!(ids, vec!["focus", "first", "second", "locked"]);
            assert!(!ranked[3].prerequisites_met);
        }

        #[test]
        fn ranking_is_deterministic() {
            let catalog = TopicCatalog::builtin();
            let config = EngineConfig::default();
            let selector = TopicSelector::new(&catalog, &config);
            let m = mastery(&[("fundamentals", 0.75), ("algebra", 0.3)]);
            let prefs = Preferences::default();
            assert_eq!(selector.rank(&m, &prefs), selector.rank(&m, &prefs));
        }
    }
}
