//! Conflict detection and resolution over the live scenario set.
//!
//! Two scenarios conflict when their timeframes overlap and their activity
//! sets contain a mutually exclusive pair. Resolution always starts from each
//! scenario's generated probability, so running it twice on an unchanged set
//! yields the same result.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::models::{ConflictResolutionStrategy, Scenario};
use crate::services::event_bus::EngineEvent;

/// Activity pairs that cannot happen at the same time.
pub const EXCLUSIVE_ACTIVITIES: [(&str, &str); 4] = [
    ("sleeping", "socializing"),
    ("sleeping", "entertaining"),
    ("working", "socializing"),
    ("working", "entertaining"),
];

/// Probability factor applied to the losing scenario under the conservative policy.
pub const CONSERVATIVE_FACTOR: f64 = 0.5;

/// Probability factor applied to both scenarios under the balanced policy.
pub const BALANCED_FACTOR: f64 = 0.7;

/// Whether the activity sets of two scenarios contain an exclusive pair.
pub fn activities_exclusive(a: &Scenario, b: &Scenario) -> bool {
    EXCLUSIVE_ACTIVITIES.iter().any(|&(x, y)| {
        let a_has = |name: &str| a.predicted_state.has_activity(name);
        let b_has = |name: &str| b.predicted_state.has_activity(name);
        (a_has(x) && b_has(y)) || (a_has(y) && b_has(x))
    })
}

/// Overlapping timeframes with exclusive activities.
pub fn in_conflict(a: &Scenario, b: &Scenario) -> bool {
    a.timeframe.overlaps(&b.timeframe) && activities_exclusive(a, b)
}

fn pair_id(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct ConflictResolver {
    strategy: ConflictResolutionStrategy,
    /// Pairs seen in the previous resolution, for new-conflict detection
    known_pairs: HashSet<(Uuid, Uuid)>,
    /// Keys deleted by the aggressive policy, suppressed until their end
    suppressed: HashMap<String, DateTime<Utc>>,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictResolutionStrategy) -> Self {
        Self {
            strategy,
            known_pairs: HashSet::new(),
            suppressed: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> ConflictResolutionStrategy {
        self.strategy
    }

    /// Whether `key` was deleted by an earlier resolution and must not be recreated yet.
    pub fn is_suppressed(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.suppressed.get(key).is_some_and(|until| *until >= now)
    }

    /// Forget suppressions whose scenario would have ended.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.suppressed.retain(|_, until| *until >= now);
    }

    /// Reset probabilities, detect conflicting pairs and apply the policy.
    ///
    /// Scenarios deleted by the aggressive policy are removed from `live`
    /// and reported as expired.
    pub fn resolve(&mut self, live: &mut BTreeMap<String, Scenario>, now: DateTime<Utc>) -> Vec<EngineEvent> {
        self.prune(now);
        for scenario in live.values_mut() {
            scenario.probability = scenario.base_probability;
            scenario.conflicts_with.clear();
            scenario.conflicted = false;
        }

        let mut ordered: Vec<&Scenario> = live.values().collect();
        ordered.sort_by_key(|s| s.sequence);
        let mut pairs = Vec::new();
        for (i, a) in ordered.iter().enumerate() {
            for b in &ordered[i + 1..] {
                if in_conflict(a, b) {
                    // First element is always the earlier-seen scenario
                    pairs.push((a.key.clone(), b.key.clone()));
                }
            }
        }

        let mut events = Vec::new();
        let mut current = HashSet::new();
        let mut deleted: HashSet<String> = HashSet::new();
        for (first, second) in pairs {
            if deleted.contains(&first) || deleted.contains(&second) {
                continue;
            }
            let (Some(a), Some(b)) = (live.get(&first), live.get(&second)) else {
                continue;
            };
            let pair = pair_id(a.id, b.id);
            let is_new = !self.known_pairs.contains(&pair);
            current.insert(pair);

            // Lower generated probability loses; on ties the later-seen one
            let loser_key = if b.base_probability <= a.base_probability {
                second.clone()
            } else {
                first.clone()
            };

            match self.strategy {
                ConflictResolutionStrategy::Conservative => {
                    cross_reference(live, &first, &second);
                    if let Some(loser) = live.get_mut(&loser_key) {
                        loser.probability *= CONSERVATIVE_FACTOR;
                        loser.conflicted = true;
                    }
                }
                ConflictResolutionStrategy::Balanced => {
                    cross_reference(live, &first, &second);
                    for key in [&first, &second] {
                        if let Some(scenario) = live.get_mut(key) {
                            scenario.probability *= BALANCED_FACTOR;
                        }
                    }
                }
                ConflictResolutionStrategy::Aggressive => {}
            }

            if is_new {
                if let (Some(a), Some(b)) = (live.get(&first), live.get(&second)) {
                    info!(
                        scenario_a = %a.description,
                        scenario_b = %b.description,
                        strategy = %self.strategy,
                        "scenario conflict detected"
                    );
                    events.push(EngineEvent::ConflictDetected {
                        scenario_a: a.clone(),
                        scenario_b: b.clone(),
                    });
                }
            }

            if self.strategy == ConflictResolutionStrategy::Aggressive {
                if let Some(loser) = live.remove(&loser_key) {
                    debug!(key = %loser.key, "conflicting scenario removed");
                    self.suppressed.insert(loser.key.clone(), loser.timeframe.end());
                    deleted.insert(loser_key);
                    events.push(EngineEvent::ScenarioExpired { scenario: loser });
                }
            }
        }
        self.known_pairs = current;
        events
    }
}

fn cross_reference(live: &mut BTreeMap<String, Scenario>, first: &str, second: &str) {
    let (Some(a_id), Some(b_id)) = (live.get(first).map(|s| s.id), live.get(second).map(|s| s.id)) else {
        return;
    };
    for (key, other) in [(first, b_id), (second, a_id)] {
        if let Some(scenario) = live.get_mut(key) {
            if !scenario.conflicts_with.contains(&other) {
                scenario.conflicts_with.push(other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ScenarioSource, Timeframe};
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn scenario(key: &str, activity: &str, probability: f64, start: DateTime<Utc>, end: DateTime<Utc>, seq: u64) -> Scenario {
        let mut s = Scenario::builder(key, key, Timeframe::new(start, end).unwrap())
            .probability(probability)
            .source(ScenarioSource::Pattern)
            .activity(activity, probability, None)
            .build(at(1, 0, 0))
            .unwrap();
        s.sequence = seq;
        s
    }

    fn live_pair() -> BTreeMap<String, Scenario> {
        [
            scenario("sleep", "sleeping", 0.8, at(2, 23, 0), at(3, 7, 0), 1),
            scenario("party", "entertaining", 0.9, at(2, 22, 30), at(3, 1, 0), 2),
        ]
        .into_iter()
        .map(|s| (s.key.clone(), s))
        .collect()
    }

    #[test]
    fn test_balanced_scales_both_and_cross_references() {
        let mut live = live_pair();
        let mut resolver = ConflictResolver::new(ConflictResolutionStrategy::Balanced);
        let events = resolver.resolve(&mut live, at(2, 20, 0));

        assert!((live["sleep"].probability - 0.56).abs() < 1e-9);
        assert!((live["party"].probability - 0.63).abs() < 1e-9);
        assert_eq!(live["sleep"].conflicts_with, vec![live["party"].id]);
        assert_eq!(live["party"].conflicts_with, vec![live["sleep"].id]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let mut live = live_pair();
        let mut resolver = ConflictResolver::new(ConflictResolutionStrategy::Balanced);
        resolver.resolve(&mut live, at(2, 20, 0));
        let events = resolver.resolve(&mut live, at(2, 20, 1));

        assert!(events.is_empty());
        assert!((live["sleep"].probability - 0.56).abs() < 1e-9);
        assert_eq!(live["sleep"].conflicts_with.len(), 1);
    }

    #[test]
    fn test_conservative_halves_lower_only() {
        let mut live = live_pair();
        let mut resolver = ConflictResolver::new(ConflictResolutionStrategy::Conservative);
        resolver.resolve(&mut live, at(2, 20, 0));

        assert!((live["sleep"].probability - 0.4).abs() < 1e-9);
        assert!(live["sleep"].conflicted);
        assert!((live["party"].probability - 0.9).abs() < 1e-9);
        assert!(!live["party"].conflicted);
        assert_eq!(live["party"].conflicts_with.len(), 1);
    }

    #[test]
    fn test_aggressive_deletes_lower_and_suppresses() {
        let mut live = live_pair();
        let mut resolver = ConflictResolver::new(ConflictResolutionStrategy::Aggressive);
        let events = resolver.resolve(&mut live, at(2, 20, 0));

        assert_eq!(live.len(), 1);
        assert!(live.contains_key("party"));
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::ScenarioExpired { scenario } if scenario.key == "sleep")));
        assert!(resolver.is_suppressed("sleep", at(3, 6, 0)));
        assert!(!resolver.is_suppressed("sleep", at(3, 8, 0)));
    }

    #[test]
    fn test_aggressive_tie_keeps_first_seen() {
        let mut live: BTreeMap<_, _> = [
            scenario("b_late", "sleeping", 0.7, at(2, 23, 0), at(3, 7, 0), 2),
            scenario("a_early", "socializing", 0.7, at(2, 22, 0), at(3, 1, 0), 1),
        ]
        .into_iter()
        .map(|s| (s.key.clone(), s))
        .collect();
        let mut resolver = ConflictResolver::new(ConflictResolutionStrategy::Aggressive);
        resolver.resolve(&mut live, at(2, 20, 0));
        assert!(live.contains_key("a_early"));
        assert!(!live.contains_key("b_late"));
    }

    #[test]
    fn test_touching_timeframes_do_not_conflict() {
        let a = scenario("sleep", "sleeping", 0.8, at(2, 23, 0), at(3, 7, 0), 1);
        let b = scenario("work", "working", 0.8, at(3, 7, 0), at(3, 9, 0), 2);
        assert!(!in_conflict(&a, &b));
    }

    #[test]
    fn test_compatible_activities_do_not_conflict() {
        let a = scenario("cook", "cooking", 0.8, at(2, 18, 0), at(2, 19, 0), 1);
        let b = scenario("party", "entertaining", 0.8, at(2, 18, 0), at(2, 22, 0), 2);
        assert!(!in_conflict(&a, &b));
    }
}
