//! Due-action scan over live scenarios.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;

use crate::domain::models::{Scenario, TriggeredPreparation};

/// How far back a scan reaches when no earlier scan exists.
pub const SCAN_WINDOW_SECS: i64 = 60;

/// Fires preparation actions whose `execute_at` falls in the current tick window.
///
/// Only the window bound is remembered between scans. Actions carry no
/// fired flag, so an action can only fire in the single window containing
/// its `execute_at`.
#[derive(Debug, Clone)]
pub struct PreparationScheduler {
    auto_execute_threshold: f64,
    last_scan: Option<DateTime<Utc>>,
}

impl PreparationScheduler {
    pub fn new(auto_execute_threshold: f64) -> Self {
        Self {
            auto_execute_threshold,
            last_scan: None,
        }
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.last_scan
    }

    /// Collect actions due in `(max(now - 1 min, previous scan), now]`.
    pub fn scan<'a>(
        &mut self,
        scenarios: impl IntoIterator<Item = &'a Scenario>,
        now: DateTime<Utc>,
    ) -> Vec<TriggeredPreparation> {
        let floor = now - Duration::seconds(SCAN_WINDOW_SECS);
        // Without a previous scan the lower bound itself is included
        let (lower, inclusive) = match self.last_scan {
            Some(last) if last >= floor => (last, false),
            _ => (floor, true),
        };
        if self.last_scan.is_some_and(|last| last >= now) {
            return Vec::new();
        }
        self.last_scan = Some(now);
        let threshold = self.auto_execute_threshold;

        let mut due: Vec<TriggeredPreparation> = scenarios
            .into_iter()
            .flat_map(|scenario| {
                scenario
                    .required_preparation
                    .iter()
                    .filter(move |action| {
                        let after = if inclusive {
                            action.execute_at >= lower
                        } else {
                            action.execute_at > lower
                        };
                        after && action.execute_at <= now
                    })
                    .map(move |action| TriggeredPreparation {
                        scenario_id: scenario.id,
                        scenario_description: scenario.description.clone(),
                        probability: scenario.probability,
                        auto_execute: scenario.probability >= threshold,
                        action: action.clone(),
                    })
            })
            .collect();

        due.sort_by(|a, b| {
            a.action
                .execute_at
                .cmp(&b.action.execute_at)
                .then_with(|| b.action.priority.cmp(&a.action.priority))
                .then_with(|| a.action.id.cmp(&b.action.id))
        });
        let due = order_dependencies(due);
        if !due.is_empty() {
            debug!(count = due.len(), "preparations due");
        }
        due
    }
}

/// Stable reorder so an action follows any same-batch action it depends on.
fn order_dependencies(batch: Vec<TriggeredPreparation>) -> Vec<TriggeredPreparation> {
    let ids: HashSet<String> = batch.iter().map(|t| t.action.id.clone()).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut remaining = batch;
    let mut ordered = Vec::with_capacity(remaining.len());

    while !remaining.is_empty() {
        let ready = remaining.iter().position(|t| {
            t.action
                .depends_on
                .iter()
                .all(|dep| !ids.contains(dep) || placed.contains(dep))
        });
        // A dependency cycle falls back to the sorted order
        let next = remaining.remove(ready.unwrap_or(0));
        placed.insert(next.action.id.clone());
        ordered.push(next);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{PreparationCategory, ScenarioSource, Timeframe};
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, second).unwrap()
    }

    fn dinner(probability: f64) -> Scenario {
        let start = at(19, 0, 0);
        Scenario::builder(
            "daily:meal:dinner:2026-03-02",
            "dinner preparation expected",
            Timeframe::starting_at(start, Duration::hours(1)).unwrap(),
        )
        .probability(probability)
        .source(ScenarioSource::Pattern)
        .prepare(PreparationCategory::Kitchen, "prepare kitchen", start, Duration::minutes(30), 6)
        .prepare(PreparationCategory::Lighting, "dining lights", start, Duration::minutes(30), 4)
        .build(at(12, 0, 0))
        .unwrap()
    }

    #[test]
    fn test_fires_action_in_window_once() {
        let scenario = dinner(0.9);
        let mut scheduler = PreparationScheduler::new(0.8);

        let fired = scheduler.scan([&scenario], at(18, 30, 20));
        assert_eq!(fired.len(), 2);
        assert!(fired[0].auto_execute);

        assert!(scheduler.scan([&scenario], at(18, 30, 20)).is_empty());
        assert!(scheduler.scan([&scenario], at(18, 31, 0)).is_empty());
    }

    #[test]
    fn test_missed_window_does_not_fire() {
        let scenario = dinner(0.9);
        let mut scheduler = PreparationScheduler::new(0.8);
        assert!(scheduler.scan([&scenario], at(18, 32, 0)).is_empty());
    }

    #[test]
    fn test_order_by_priority_and_dependency() {
        let scenario = dinner(0.5);
        let mut scheduler = PreparationScheduler::new(0.8);
        let fired = scheduler.scan([&scenario], at(18, 30, 0));

        let ids: Vec<_> = fired.iter().map(|t| t.action.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "daily:meal:dinner:2026-03-02/kitchen",
                "daily:meal:dinner:2026-03-02/lighting"
            ]
        );
        assert!(fired.iter().all(|t| !t.auto_execute));
    }

    #[test]
    fn test_dependency_overrides_priority() {
        let start = at(19, 0, 0);
        let scenario = Scenario::builder("k", "d", Timeframe::starting_at(start, Duration::hours(1)).unwrap())
            .probability(0.9)
            .prepare(PreparationCategory::Notification, "first", start, Duration::minutes(30), 1)
            .prepare(PreparationCategory::Security, "second", start, Duration::minutes(30), 9)
            .build(at(12, 0, 0))
            .unwrap();
        let mut scheduler = PreparationScheduler::new(0.8);
        let fired = scheduler.scan([&scenario], at(18, 30, 0));
        assert_eq!(fired[0].action.id, "k/notification");
        assert_eq!(fired[1].action.depends_on, vec!["k/notification".to_string()]);
    }
}
