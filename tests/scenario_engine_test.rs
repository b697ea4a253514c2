//! End-to-end anticipation: history in, scenarios and preparations out.

mod common;

use chrono::Duration;
use common::{anticipator_at, at, calendar_event, cooking_history, daily_pattern};
use foresight::domain::models::{
    CalendarCategory, ExternalContext, Horizon, PreparationCategory, ScenarioSource, Weather,
};
use foresight::EngineEvent;

const DINNER_KEY: &str = "daily:meal:dinner:2026-03-16";

#[test]
fn test_dinner_scenario_from_cooking_history() {
    let (mut anticipator, _clock) = anticipator_at(at(16, 18, 0));
    anticipator.import_history(&cooking_history());

    let report = anticipator.regenerate_scenarios();
    assert!(report.generated >= 1);

    let dinner = anticipator
        .scenario_engine()
        .scenario_by_key(DINNER_KEY)
        .expect("dinner scenario generated");
    assert_eq!(dinner.description, "dinner preparation expected");
    assert!(dinner.probability >= 0.6);
    assert_eq!(dinner.source, ScenarioSource::Pattern);
    assert_eq!(dinner.horizon, Horizon::Daily);
    assert_eq!(dinner.timeframe.start(), at(16, 19, 0));

    let kitchen = dinner
        .required_preparation
        .iter()
        .find(|a| a.category == PreparationCategory::Kitchen)
        .expect("kitchen preparation");
    assert_eq!(kitchen.execute_at, at(16, 18, 30));

    assert!(report.events.iter().any(
        |e| matches!(e, EngineEvent::ScenarioGenerated { scenario } if scenario.key == DINNER_KEY)
    ));
}

#[test]
fn test_regeneration_is_idempotent() {
    let (mut anticipator, _clock) = anticipator_at(at(16, 18, 0));
    anticipator.import_history(&cooking_history());

    anticipator.regenerate_scenarios();
    let first: Vec<_> = anticipator
        .scenarios()
        .into_iter()
        .map(|s| (s.id, s.key.clone(), s.probability))
        .collect();

    let second = anticipator.regenerate_scenarios();
    let after: Vec<_> = anticipator
        .scenarios()
        .into_iter()
        .map(|s| (s.id, s.key.clone(), s.probability))
        .collect();

    assert_eq!(first, after);
    assert_eq!(second.generated, 0);
    assert_eq!(second.updated, 0);
    assert!(second.triggered.is_empty());
}

#[test]
fn test_kitchen_preparation_fires_once_when_due() {
    let (mut anticipator, clock) = anticipator_at(at(16, 18, 0));
    anticipator.import_history(&cooking_history());
    let first = anticipator.regenerate_scenarios();
    assert!(first.triggered.is_empty());

    clock.set(at(16, 18, 30));
    let due = anticipator.regenerate_scenarios();
    let kitchen: Vec<_> = due
        .triggered
        .iter()
        .filter(|t| t.action.category == PreparationCategory::Kitchen)
        .collect();
    assert_eq!(kitchen.len(), 1);
    assert_eq!(kitchen[0].scenario_description, "dinner preparation expected");
    assert_eq!(kitchen[0].auto_execute, kitchen[0].probability >= 0.8);

    let again = anticipator.regenerate_scenarios();
    assert!(again
        .triggered
        .iter()
        .all(|t| t.action.category != PreparationCategory::Kitchen));
}

#[test]
fn test_elapsed_dinner_expires() {
    let (mut anticipator, clock) = anticipator_at(at(16, 18, 0));
    anticipator.import_history(&cooking_history());
    anticipator.regenerate_scenarios();
    assert!(anticipator.scenario_engine().scenario_by_key(DINNER_KEY).is_some());

    clock.set(at(16, 20, 30));
    let report = anticipator.regenerate_scenarios();
    assert!(anticipator.scenario_engine().scenario_by_key(DINNER_KEY).is_none());
    assert!(report.expired >= 1);
    assert!(report.events.iter().any(
        |e| matches!(e, EngineEvent::ScenarioExpired { scenario } if scenario.key == DINNER_KEY)
    ));
}

#[test]
fn test_calendar_social_event_adds_guest_scenario() {
    let (mut anticipator, _clock) = anticipator_at(at(2, 9, 0));
    anticipator
        .update_calendar(vec![calendar_event(
            "party",
            at(6, 19, 0),
            Duration::hours(4),
            CalendarCategory::Social,
        )
        .with_attendees(["ana", "ben"])])
        .unwrap();
    assert!(anticipator.scenario_engine().is_pending());

    anticipator.regenerate_scenarios();
    let scenarios = anticipator.scenarios();
    assert!(scenarios.iter().any(|s| s.key.starts_with("calendar:party:")
        && s.source == ScenarioSource::Calendar
        && s.horizon == Horizon::Weekly));
    assert!(scenarios.iter().any(|s| s.key == "calendar:party:guests"));
    assert!(!anticipator.scenario_engine().is_pending());
}

#[test]
fn test_invalid_calendar_is_rejected() {
    let (mut anticipator, _clock) = anticipator_at(at(2, 9, 0));
    let backwards = calendar_event("oops", at(2, 12, 0), Duration::hours(-1), CalendarCategory::Work);
    assert!(anticipator.update_calendar(vec![backwards]).is_err());
    assert!(anticipator.scenario_engine().calendar().is_empty());
}

#[test]
fn test_hot_forecast_schedules_cooling() {
    let (mut anticipator, _clock) = anticipator_at(at(2, 12, 10));
    anticipator.update_context(ExternalContext {
        weather: Weather {
            forecast_high: Some(33.0),
            ..Weather::default()
        },
        ..ExternalContext::default()
    });

    anticipator.tick();
    let cooling = anticipator
        .scenario_engine()
        .scenario_by_key("short_term:energy:cooling:2026-03-02")
        .expect("cooling scenario");
    assert_eq!(cooling.horizon, Horizon::ShortTerm);
    assert_eq!(cooling.timeframe.start(), at(2, 14, 0));
    assert!(cooling.probability >= 0.6 && cooling.probability <= 0.9);
}

#[test]
fn test_cooling_preparation_fires_once_per_day() {
    const COOLING_KEY: &str = "short_term:energy:cooling:2026-03-02";
    let (mut anticipator, clock) = anticipator_at(at(2, 9, 0));
    anticipator.update_context(ExternalContext {
        weather: Weather {
            forecast_high: Some(32.0),
            ..Weather::default()
        },
        ..ExternalContext::default()
    });

    let mut fired = Vec::new();
    let mut updates = 0;
    while anticipator.now() <= at(2, 18, 5) {
        let report = anticipator.regenerate_scenarios();
        fired.extend(
            report
                .triggered
                .into_iter()
                .filter(|t| t.action.category == PreparationCategory::Energy),
        );
        updates += report
            .events
            .iter()
            .filter(|e| matches!(e, EngineEvent::ScenarioUpdated { scenario } if scenario.key == COOLING_KEY))
            .count();
        if anticipator.now() == at(2, 12, 0) {
            let cooling = anticipator.scenario_engine().scenario_by_key(COOLING_KEY).expect("cooling scenario");
            assert_eq!(cooling.timeframe.start(), at(2, 14, 0));
        }
        clock.advance(Duration::minutes(1));
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].action.execute_at, at(2, 13, 30));
    assert_eq!(updates, 0);
    assert!(anticipator.scenario_engine().scenario_by_key(COOLING_KEY).is_none());
}

#[test]
fn test_conflicts_resolved_across_horizons() {
    let (mut anticipator, _clock) = anticipator_at(at(2, 22, 50));
    anticipator.restore_patterns([daily_pattern("sleeping", 23 * 60, 0.8)]);
    anticipator
        .update_calendar(vec![calendar_event(
            "party",
            at(2, 22, 55),
            Duration::minutes(125),
            CalendarCategory::Social,
        )])
        .unwrap();

    let report = anticipator.regenerate_scenarios();
    let engine = anticipator.scenario_engine();
    let party = engine.scenario_by_key("calendar:party:2026-03-02").expect("party scenario");
    let immediate = engine
        .scenarios()
        .into_iter()
        .find(|s| s.horizon == Horizon::Immediate && s.key.contains("sleeping"))
        .expect("immediate sleep scenario");
    let bedtime = engine.scenario_by_key("daily:sleep:bedtime:2026-03-02").expect("bedtime scenario");

    assert_eq!(immediate.horizon, Horizon::Immediate);
    assert_eq!(bedtime.horizon, Horizon::Daily);
    assert!(report.conflicts >= 2);
    assert!(party.conflicts_with.contains(&immediate.id));
    assert!(party.conflicts_with.contains(&bedtime.id));
    assert!(immediate.conflicts_with.contains(&party.id));
    assert!(bedtime.conflicts_with.contains(&party.id));

    // Party conflicts twice, each sleep scenario once
    assert!(party.probability < immediate.probability);
    assert!(party.probability < bedtime.probability);
    assert!(bedtime.probability < 0.8);
}
