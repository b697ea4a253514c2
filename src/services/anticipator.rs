//! Anticipation facade.
//!
//! Wires the clock, both engines and the event bus. Engine operations return
//! their events; the facade stamps them with the clock and publishes them
//! once the operation has completed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    CalendarEvent, Config, DaemonConfig, ExternalContext, MomentPrediction, Observation,
    OccupantState, Pattern, Scenario,
};
use crate::domain::ports::{Clock, PatternSource};
use crate::services::event_bus::{EngineEvent, EventBus};
use crate::services::pattern_engine::{ObserveReport, PassReport, PatternEngine};
use crate::services::scenario_engine::{RegenerationReport, ScenarioEngine};

/// Outcome of one daemon tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub pattern_pass: Option<PassReport>,
    pub regeneration: Option<RegenerationReport>,
    /// Number of events published during the tick
    pub published: usize,
}

pub struct Anticipator {
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    patterns: PatternEngine,
    scenarios: ScenarioEngine,
    daemon: DaemonConfig,
}

impl Anticipator {
    pub fn new(config: &Config, clock: Arc<dyn Clock>, bus: Arc<EventBus>) -> Self {
        let patterns = PatternEngine::new(config.pattern_engine.clone());
        let scenarios = ScenarioEngine::new(config.scenario_engine.clone(), patterns.local_time());
        Self {
            clock,
            bus,
            patterns,
            scenarios,
            daemon: config.daemon.clone(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn pattern_engine(&self) -> &PatternEngine {
        &self.patterns
    }

    pub fn scenario_engine(&self) -> &ScenarioEngine {
        &self.scenarios
    }

    fn publish(&self, events: Vec<EngineEvent>) -> usize {
        let count = events.len();
        if count > 0 {
            self.bus.publish_all(events, self.clock.now());
        }
        count
    }

    pub fn observe(&mut self, observation: Observation) -> DomainResult<ObserveReport> {
        let report = self.patterns.observe(observation, self.clock.now())?;
        self.publish(report.events().to_vec());
        Ok(report)
    }

    #[instrument(skip(self, observations), fields(count = observations.len()))]
    pub fn import_history(&mut self, observations: &[Observation]) -> PassReport {
        let report = self.patterns.import_history(observations, self.clock.now());
        self.publish(report.events.clone());
        report
    }

    /// Restore persisted patterns without emitting discovery events.
    pub fn restore_patterns(&mut self, patterns: impl IntoIterator<Item = Pattern>) {
        self.patterns.restore_patterns(patterns);
    }

    pub fn update_calendar(&mut self, events: Vec<CalendarEvent>) -> DomainResult<()> {
        self.scenarios.update_calendar(events)
    }

    pub fn update_context(&mut self, context: ExternalContext) {
        self.scenarios.update_context(context);
    }

    pub fn update_occupants(&mut self, occupants: Vec<OccupantState>) {
        self.scenarios.update_occupants(occupants);
    }

    pub fn regenerate_scenarios(&mut self) -> RegenerationReport {
        let report = self
            .scenarios
            .regenerate_scenarios(&self.patterns, self.clock.now());
        self.publish(report.events.clone());
        report
    }

    /// Pattern maintenance, then scenario regeneration when configured or pending.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        let pattern_pass = self.patterns.tick(now);
        let mut published = pattern_pass
            .as_ref()
            .map_or(0, |pass| self.publish(pass.events.clone()));

        let regeneration = (self.daemon.regenerate_every_tick || self.scenarios.is_pending())
            .then(|| self.scenarios.regenerate_scenarios(&self.patterns, now));
        if let Some(report) = &regeneration {
            published += self.publish(report.events.clone());
        }
        debug!(published, "tick complete");
        TickReport {
            pattern_pass,
            regeneration,
            published,
        }
    }

    pub fn patterns(&self) -> Vec<&Pattern> {
        self.patterns.patterns()
    }

    pub fn prediction_for_moment(&self, moment: DateTime<Utc>) -> MomentPrediction {
        self.patterns.prediction_for_moment(moment)
    }

    pub fn scenarios(&self) -> Vec<&Scenario> {
        self.scenarios.scenarios()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::ManualClock;
    use crate::services::event_bus::EventBusConfig;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_import_publishes_discovery() {
        let clock = Arc::new(ManualClock::new(at(15, 20)));
        let bus = Arc::new(EventBus::new(EventBusConfig::default()));
        let mut rx = bus.subscribe();
        let mut anticipator = Anticipator::new(&Config::default(), clock, bus);

        let history: Vec<_> = (1..=15)
            .map(|d| Observation::activity(at(d, 19), "cooking").in_room("kitchen"))
            .collect();
        anticipator.import_history(&history);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event.name(), "patternDiscovered");
        assert_eq!(envelope.sequence.0, 0);
    }

    #[tokio::test]
    async fn test_tick_regenerates_on_pending_context() {
        let clock = Arc::new(ManualClock::new(at(2, 9)));
        let bus = Arc::new(EventBus::new(EventBusConfig::default()));
        let mut config = Config::default();
        config.daemon.regenerate_every_tick = false;
        let mut anticipator = Anticipator::new(&config, clock.clone(), bus);

        assert!(anticipator.tick().regeneration.is_none());

        anticipator
            .update_calendar(vec![CalendarEvent::new(
                "review",
                "Review",
                at(2, 9) + Duration::minutes(20),
                at(2, 10),
                crate::domain::models::CalendarCategory::Work,
            )])
            .unwrap();
        clock.advance(Duration::seconds(61));
        let report = anticipator.tick();
        assert_eq!(report.regeneration.map(|r| r.generated), Some(1));
        assert_eq!(anticipator.scenarios().len(), 1);
    }
}
