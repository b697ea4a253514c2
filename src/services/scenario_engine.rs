//! Scenario engine.
//!
//! Owns the live scenario set and the context snapshots it is generated from.
//! Every regeneration runs in a fixed order: expiry, generation, conflict
//! resolution, preparation triggering.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CalendarEvent, ExternalContext, Horizon, LocalTime, OccupantState, Scenario,
    ScenarioEngineConfig, TriggeredPreparation,
};
use crate::domain::ports::PatternSource;
use crate::services::conflict_resolver::ConflictResolver;
use crate::services::event_bus::EngineEvent;
use crate::services::preparation_scheduler::PreparationScheduler;
use crate::services::scenario_generator::{GenerationInput, ScenarioGenerator};

/// Outcome of one regeneration.
#[derive(Debug, Clone, Default)]
pub struct RegenerationReport {
    pub expired: usize,
    pub generated: usize,
    pub updated: usize,
    pub conflicts: usize,
    pub triggered: Vec<TriggeredPreparation>,
    pub events: Vec<EngineEvent>,
}

enum Upsert {
    Inserted,
    Changed,
    Unchanged,
}

pub struct ScenarioEngine {
    config: ScenarioEngineConfig,
    generator: ScenarioGenerator,
    resolver: ConflictResolver,
    scheduler: PreparationScheduler,
    live: BTreeMap<String, Scenario>,
    calendar: Vec<CalendarEvent>,
    context: ExternalContext,
    occupants: Vec<OccupantState>,
    next_sequence: u64,
    /// Context changed since the last regeneration
    pending: bool,
}

impl ScenarioEngine {
    pub fn new(config: ScenarioEngineConfig, local_time: LocalTime) -> Self {
        Self {
            generator: ScenarioGenerator::new(&config, local_time),
            resolver: ConflictResolver::new(config.conflict_resolution_strategy),
            scheduler: PreparationScheduler::new(config.auto_execute_threshold),
            live: BTreeMap::new(),
            calendar: Vec::new(),
            context: ExternalContext::default(),
            occupants: Vec::new(),
            next_sequence: 0,
            pending: false,
            config,
        }
    }

    pub fn config(&self) -> &ScenarioEngineConfig {
        &self.config
    }

    /// Replace the calendar snapshot. A batch with any invalid event is rejected whole.
    pub fn update_calendar(&mut self, events: Vec<CalendarEvent>) -> DomainResult<()> {
        for event in &events {
            event.validate()?;
        }
        debug!(count = events.len(), "calendar updated");
        self.calendar = events;
        self.pending = true;
        Ok(())
    }

    pub fn update_context(&mut self, context: ExternalContext) {
        self.context = context;
        self.pending = true;
    }

    pub fn update_occupants(&mut self, occupants: Vec<OccupantState>) {
        self.occupants = occupants;
        self.pending = true;
    }

    /// Whether a context update is waiting for the next regeneration.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Expire, generate, resolve and trigger, in that order.
    #[instrument(skip(self, patterns), fields(live = self.live.len()))]
    pub fn regenerate_scenarios(&mut self, patterns: &dyn PatternSource, now: DateTime<Utc>) -> RegenerationReport {
        let mut report = RegenerationReport::default();

        let elapsed: Vec<String> = self
            .live
            .values()
            .filter(|s| s.timeframe.has_elapsed(now))
            .map(|s| s.key.clone())
            .collect();
        for key in elapsed {
            if let Some(scenario) = self.live.remove(&key) {
                report.expired += 1;
                report.events.push(EngineEvent::ScenarioExpired { scenario });
            }
        }

        let fresh = self.generator.generate(&GenerationInput {
            now,
            patterns,
            calendar: &self.calendar,
            context: &self.context,
            occupants: &self.occupants,
        });
        let mut inserted = Vec::new();
        let mut changed = Vec::new();
        for scenario in fresh {
            if self.resolver.is_suppressed(&scenario.key, now) {
                continue;
            }
            let key = scenario.key.clone();
            match self.upsert(scenario, now) {
                Upsert::Inserted => inserted.push(key),
                Upsert::Changed => changed.push(key),
                Upsert::Unchanged => {}
            }
        }

        let resolution = self.resolver.resolve(&mut self.live, now);
        let new_keys: HashSet<&str> = inserted.iter().map(String::as_str).collect();

        // Announce with resolved probabilities; scenarios created and removed
        // in the same pass are never announced
        for key in &inserted {
            if let Some(scenario) = self.live.get(key) {
                report.generated += 1;
                report.events.push(EngineEvent::ScenarioGenerated {
                    scenario: scenario.clone(),
                });
            }
        }
        for key in &changed {
            if let Some(scenario) = self.live.get(key) {
                report.updated += 1;
                report.events.push(EngineEvent::ScenarioUpdated {
                    scenario: scenario.clone(),
                });
            }
        }
        for event in resolution {
            if let EngineEvent::ScenarioExpired { scenario } = &event {
                if new_keys.contains(scenario.key.as_str()) {
                    continue;
                }
            }
            if matches!(event, EngineEvent::ConflictDetected { .. }) {
                report.conflicts += 1;
            }
            report.events.push(event);
        }

        report.triggered = self.scheduler.scan(self.live.values(), now);
        report.events.extend(
            report
                .triggered
                .iter()
                .cloned()
                .map(|preparation| EngineEvent::PreparationTriggered { preparation }),
        );
        self.pending = false;

        if report.generated + report.updated + report.expired > 0 {
            info!(
                generated = report.generated,
                updated = report.updated,
                expired = report.expired,
                conflicts = report.conflicts,
                triggered = report.triggered.len(),
                live = self.live.len(),
                "scenarios regenerated"
            );
        }
        report
    }

    fn upsert(&mut self, fresh: Scenario, now: DateTime<Utc>) -> Upsert {
        let Some(existing) = self.live.get_mut(&fresh.key) else {
            let mut fresh = fresh;
            fresh.sequence = self.next_sequence;
            self.next_sequence += 1;
            self.live.insert(fresh.key.clone(), fresh);
            return Upsert::Inserted;
        };

        let changed = existing.base_probability != fresh.base_probability
            || existing.timeframe != fresh.timeframe
            || existing.required_preparation != fresh.required_preparation;

        existing.horizon = fresh.horizon;
        existing.predicted_state = fresh.predicted_state;
        existing.description = fresh.description;
        if !changed {
            return Upsert::Unchanged;
        }
        existing.base_probability = fresh.base_probability;
        existing.probability = fresh.base_probability;
        existing.timeframe = fresh.timeframe;
        existing.required_preparation = fresh.required_preparation;
        existing.source = fresh.source;
        existing.updated_at = now;
        Upsert::Changed
    }

    /// Live scenarios ordered by start time.
    pub fn scenarios(&self) -> Vec<&Scenario> {
        let mut scenarios: Vec<&Scenario> = self.live.values().collect();
        scenarios.sort_by(|a, b| {
            a.timeframe
                .start()
                .cmp(&b.timeframe.start())
                .then_with(|| a.key.cmp(&b.key))
        });
        scenarios
    }

    pub fn scenarios_by_horizon(&self, horizon: Horizon) -> Vec<&Scenario> {
        self.scenarios()
            .into_iter()
            .filter(|s| s.horizon == horizon)
            .collect()
    }

    pub fn scenario(&self, id: Uuid) -> DomainResult<&Scenario> {
        self.live
            .values()
            .find(|s| s.id == id)
            .ok_or(DomainError::ScenarioNotFound(id))
    }

    pub fn scenario_by_key(&self, key: &str) -> Option<&Scenario> {
        self.live.get(key)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn calendar(&self) -> &[CalendarEvent] {
        &self.calendar
    }

    pub fn context(&self) -> &ExternalContext {
        &self.context
    }

    pub fn occupants(&self) -> &[OccupantState] {
        &self.occupants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{CalendarCategory, MomentPrediction, Pattern};
    use chrono::{Duration, TimeZone};

    struct NoPatterns;

    impl PatternSource for NoPatterns {
        fn patterns(&self) -> Vec<&Pattern> {
            Vec::new()
        }

        fn prediction_for_moment(&self, moment: DateTime<Utc>) -> MomentPrediction {
            MomentPrediction::empty(moment)
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
    }

    fn engine() -> ScenarioEngine {
        ScenarioEngine::new(ScenarioEngineConfig::default(), LocalTime::utc())
    }

    fn meeting(start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent::new("standup", "Standup", start, start + Duration::minutes(30), CalendarCategory::Work)
    }

    #[test]
    fn test_invalid_calendar_batch_is_rejected_whole() {
        let mut engine = engine();
        let bad = CalendarEvent::new("bad", "Bad", at(2, 10, 0), at(2, 9, 0), CalendarCategory::Work);
        let result = engine.update_calendar(vec![meeting(at(2, 9, 0)), bad]);
        assert!(matches!(result, Err(DomainError::InvalidTimeframe { .. })));
        assert!(engine.calendar().is_empty());
        assert!(!engine.is_pending());
    }

    #[test]
    fn test_regeneration_is_idempotent() {
        let mut engine = engine();
        engine.update_calendar(vec![meeting(at(2, 9, 20))]).unwrap();
        let now = at(2, 9, 0);

        let first = engine.regenerate_scenarios(&NoPatterns, now);
        assert_eq!(first.generated, 1);
        let id = engine.scenarios()[0].id;

        let second = engine.regenerate_scenarios(&NoPatterns, now);
        assert_eq!(second.generated, 0);
        assert_eq!(second.updated, 0);
        assert!(second.events.is_empty());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.scenarios()[0].id, id);
    }

    #[test]
    fn test_calendar_scenario_moves_between_horizons() {
        let mut engine = engine();
        engine.update_calendar(vec![meeting(at(5, 9, 0))]).unwrap();
        engine.regenerate_scenarios(&NoPatterns, at(2, 9, 0));
        let id = engine.scenarios()[0].id;
        assert_eq!(engine.scenarios()[0].horizon, Horizon::Weekly);

        let report = engine.regenerate_scenarios(&NoPatterns, at(5, 8, 45));
        assert_eq!(report.generated, 0);
        assert_eq!(engine.scenarios()[0].id, id);
        assert_eq!(engine.scenarios()[0].horizon, Horizon::Immediate);
    }

    #[test]
    fn test_elapsed_scenarios_expire() {
        let mut engine = engine();
        engine.update_calendar(vec![meeting(at(2, 9, 20))]).unwrap();
        engine.regenerate_scenarios(&NoPatterns, at(2, 9, 0));
        engine.update_calendar(Vec::new()).unwrap();

        let report = engine.regenerate_scenarios(&NoPatterns, at(2, 10, 0));
        assert_eq!(report.expired, 1);
        assert!(engine.is_empty());
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, EngineEvent::ScenarioExpired { .. })));
    }

    #[test]
    fn test_not_regenerated_scenario_is_retained() {
        let mut engine = engine();
        engine.update_calendar(vec![meeting(at(2, 9, 20))]).unwrap();
        engine.regenerate_scenarios(&NoPatterns, at(2, 9, 0));
        engine.update_calendar(Vec::new()).unwrap();

        engine.regenerate_scenarios(&NoPatterns, at(2, 9, 25));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_due_preparation_fires_once() {
        let mut engine = engine();
        engine.update_calendar(vec![meeting(at(2, 9, 20))]).unwrap();
        // Notification fires 15 minutes before the start
        let first = engine.regenerate_scenarios(&NoPatterns, at(2, 9, 5));
        assert_eq!(first.triggered.len(), 1);
        let again = engine.regenerate_scenarios(&NoPatterns, at(2, 9, 5));
        assert!(again.triggered.is_empty());
    }
}
