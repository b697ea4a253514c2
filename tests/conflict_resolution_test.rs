//! Conflicts between a bedtime routine and a late party, under each policy.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{anticipator_with, at, calendar_event, daily_pattern};
use foresight::domain::models::{CalendarCategory, Config, ConflictResolutionStrategy};
use foresight::{Anticipator, EngineEvent, ManualClock};
use std::sync::Arc;

const BEDTIME: &str = "daily:sleep:bedtime:2026-03-02";
const PARTY: &str = "calendar:party:2026-03-02";

fn evening_with(strategy: ConflictResolutionStrategy) -> (Anticipator, Arc<ManualClock>) {
    let mut config = Config::default();
    config.scenario_engine.conflict_resolution_strategy = strategy;
    let (mut anticipator, clock) = anticipator_with(&config, at(2, 20, 0));
    anticipator.restore_patterns([daily_pattern("sleeping", 23 * 60, 0.8)]);
    anticipator
        .update_calendar(vec![calendar_event(
            "party",
            at(2, 22, 30),
            Duration::minutes(150),
            CalendarCategory::Social,
        )])
        .unwrap();
    (anticipator, clock)
}

fn probability(anticipator: &Anticipator, key: &str) -> Option<f64> {
    anticipator.scenario_engine().scenario_by_key(key).map(|s| s.probability)
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("scenario present");
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

#[test]
fn test_balanced_scales_both_scenarios() {
    let (mut anticipator, _clock) = evening_with(ConflictResolutionStrategy::Balanced);
    let report = anticipator.regenerate_scenarios();

    assert_eq!(report.conflicts, 1);
    assert_close(probability(&anticipator, BEDTIME), 0.56);
    assert_close(probability(&anticipator, PARTY), 0.63);

    let engine = anticipator.scenario_engine();
    let bedtime = engine.scenario_by_key(BEDTIME).unwrap();
    let party = engine.scenario_by_key(PARTY).unwrap();
    assert_eq!(bedtime.conflicts_with, vec![party.id]);
    assert_eq!(party.conflicts_with, vec![bedtime.id]);
    assert_eq!(bedtime.base_probability, 0.8);
}

#[test]
fn test_conflict_reported_once_while_it_persists() {
    let (mut anticipator, clock) = evening_with(ConflictResolutionStrategy::Balanced);
    let mut rx = anticipator.bus().subscribe();

    anticipator.regenerate_scenarios();
    clock.advance(Duration::minutes(1));
    let second = anticipator.regenerate_scenarios();

    assert_eq!(second.conflicts, 0);
    assert_close(probability(&anticipator, BEDTIME), 0.56);

    let mut conflicts = 0;
    while let Ok(envelope) = rx.try_recv() {
        if matches!(envelope.event, EngineEvent::ConflictDetected { .. }) {
            conflicts += 1;
        }
    }
    assert_eq!(conflicts, 1);
}

#[test]
fn test_conservative_halves_only_the_less_likely() {
    let (mut anticipator, _clock) = evening_with(ConflictResolutionStrategy::Conservative);
    anticipator.regenerate_scenarios();

    assert_close(probability(&anticipator, BEDTIME), 0.4);
    assert_close(probability(&anticipator, PARTY), 0.9);
    let engine = anticipator.scenario_engine();
    assert!(engine.scenario_by_key(BEDTIME).unwrap().conflicted);
    assert!(!engine.scenario_by_key(PARTY).unwrap().conflicted);
}

#[test]
fn test_aggressive_removes_loser_until_it_would_end() {
    let (mut anticipator, clock) = evening_with(ConflictResolutionStrategy::Aggressive);
    let report = anticipator.regenerate_scenarios();

    assert!(probability(&anticipator, BEDTIME).is_none());
    assert_close(probability(&anticipator, PARTY), 0.9);
    // Created and removed in the same pass, so never announced
    let announced = |key: &str| {
        report.events.iter().any(|e| match e {
            EngineEvent::ScenarioGenerated { scenario } | EngineEvent::ScenarioExpired { scenario } => {
                scenario.key == key
            }
            _ => false,
        })
    };
    assert!(!announced(BEDTIME));
    assert!(announced(PARTY));

    clock.advance(Duration::minutes(5));
    anticipator.regenerate_scenarios();
    assert!(probability(&anticipator, BEDTIME).is_none());
}

#[test]
fn test_no_conflict_without_overlap() {
    let (mut anticipator, _clock) = evening_with(ConflictResolutionStrategy::Balanced);
    let early: DateTime<Utc> = at(2, 20, 45);
    anticipator
        .update_calendar(vec![calendar_event(
            "party",
            early,
            Duration::hours(1),
            CalendarCategory::Social,
        )])
        .unwrap();

    let report = anticipator.regenerate_scenarios();
    assert_eq!(report.conflicts, 0);
    assert_close(probability(&anticipator, BEDTIME), 0.8);
}
