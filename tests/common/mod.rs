//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

use foresight::domain::models::{
    CalendarCategory, CalendarEvent, Config, Observation, Pattern, PatternCandidate,
    PatternSignature, Scenario, ScenarioSource, Timeframe,
};
use foresight::{Anticipator, EventBus, EventBusConfig, ManualClock};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// An instant in March 2026 (UTC). The 2nd is a Monday.
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

/// Anticipator on a manual clock with default configuration.
pub fn anticipator_at(now: DateTime<Utc>) -> (Anticipator, Arc<ManualClock>) {
    anticipator_with(&Config::default(), now)
}

pub fn anticipator_with(config: &Config, now: DateTime<Utc>) -> (Anticipator, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let bus = Arc::new(EventBus::new(EventBusConfig::default()));
    (Anticipator::new(config, clock.clone(), bus), clock)
}

/// 20 cooking observations in the kitchen at 19:00 over the 1st to the 15th.
pub fn cooking_history() -> Vec<Observation> {
    (1..=15)
        .chain(1..=5)
        .map(|day| Observation::activity(at(day, 19, 0), "cooking").in_room("kitchen"))
        .collect()
}

/// An established daily-routine pattern for `activity` around `minute_of_day`.
pub fn daily_pattern(activity: &str, minute_of_day: u32, confidence: f64) -> Pattern {
    let now = at(1, 0, 0);
    let mut pattern = Pattern::from_candidate(&PatternCandidate {
        key: format!("daily_routine:slot_{}", minute_of_day / 120),
        signature: PatternSignature::DailyRoutine {
            slot: minute_of_day / 120,
            mean_minute_of_day: minute_of_day,
            activities: BTreeMap::from([(activity.to_string(), 1.0)]),
            dominant_room: None,
            consistency: 1.0,
        },
        observation_ids: Vec::new(),
        strength: confidence,
        first_seen: now,
        last_seen: now,
    });
    pattern.confidence = confidence;
    pattern
}

/// Scenario with a single activity, as the generator would build it.
pub fn scenario(
    key: &str,
    activity: &str,
    probability: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Scenario {
    Scenario::builder(key, key, Timeframe::new(start, end).unwrap())
        .probability(probability)
        .source(ScenarioSource::Pattern)
        .activity(activity, probability, None)
        .build(at(1, 0, 0))
        .unwrap()
}

pub fn calendar_event(
    id: &str,
    start: DateTime<Utc>,
    length: Duration,
    category: CalendarCategory,
) -> CalendarEvent {
    CalendarEvent::new(id, id, start, start + length, category)
}
