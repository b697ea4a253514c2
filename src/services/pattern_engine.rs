//! Pattern engine.
//!
//! Wires the observation store, candidate tracker and pattern registry into
//! one pass: strengthen from new observations, analyze, promote, decay.
//! Streaming input triggers at most one pass per analysis interval; bulk
//! imports always run a full pass.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    LocalTime, MomentPrediction, Observation, Pattern, PatternEngineConfig, PatternType,
};
use crate::domain::ports::PatternSource;
use crate::services::candidate_tracker::{AnalysisReport, CandidateTracker, TrackerSettings};
use crate::services::event_bus::EngineEvent;
use crate::services::observation_store::{ObservationStore, RecordOutcome};
use crate::services::pattern_registry::{PatternRegistry, RegistrySettings};

/// Result of one analysis pass.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    /// Observations applied to existing patterns
    pub observations_applied: usize,
    pub analysis: AnalysisReport,
    pub events: Vec<EngineEvent>,
}

/// Result of recording a single observation.
#[derive(Debug, Clone)]
pub struct ObserveReport {
    pub outcome: RecordOutcome,
    /// Present when the observation triggered an analysis pass
    pub pass: Option<PassReport>,
}

impl ObserveReport {
    pub fn events(&self) -> &[EngineEvent] {
        self.pass.as_ref().map_or(&[], |p| p.events.as_slice())
    }
}

pub struct PatternEngine {
    config: PatternEngineConfig,
    store: ObservationStore,
    tracker: CandidateTracker,
    registry: PatternRegistry,
    /// Retained observations not yet applied to patterns
    pending: Vec<Observation>,
    last_pass: Option<DateTime<Utc>>,
}

impl PatternEngine {
    pub fn new(config: PatternEngineConfig) -> Self {
        Self {
            store: ObservationStore::new(config.retention()),
            tracker: CandidateTracker::new(TrackerSettings::from(&config)),
            registry: PatternRegistry::new(RegistrySettings::from(&config)),
            pending: Vec::new(),
            last_pass: None,
            config,
        }
    }

    pub fn config(&self) -> &PatternEngineConfig {
        &self.config
    }

    pub fn local_time(&self) -> LocalTime {
        LocalTime::new(self.config.utc_offset_minutes)
    }

    /// Record one observation, running a pass if the analysis interval has elapsed.
    pub fn observe(&mut self, observation: Observation, now: DateTime<Utc>) -> DomainResult<ObserveReport> {
        let retained = observation.clone();
        let outcome = self.store.record(observation, now)?;
        if outcome == RecordOutcome::Retained {
            self.pending.push(retained);
        }

        let pass = if self.analysis_due(now) {
            Some(self.run_pass(now))
        } else {
            None
        };
        Ok(ObserveReport { outcome, pass })
    }

    /// Bulk-load history and run a full pass.
    #[instrument(skip(self, observations), fields(count = observations.len()))]
    pub fn import_history(&mut self, observations: &[Observation], now: DateTime<Utc>) -> PassReport {
        let before: std::collections::HashSet<_> =
            self.store.observations().iter().map(|o| o.id).collect();
        let retained = self.store.import(observations, now);
        self.pending.extend(
            self.store
                .observations()
                .iter()
                .filter(|o| !before.contains(&o.id))
                .cloned(),
        );
        info!(retained, window = self.store.len(), "history imported");
        self.run_pass(now)
    }

    /// Periodic maintenance: runs a pass when the analysis interval has elapsed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PassReport> {
        self.store.evict(now);
        self.analysis_due(now).then(|| self.run_pass(now))
    }

    /// Run a pass regardless of throttling.
    pub fn flush(&mut self, now: DateTime<Utc>) -> PassReport {
        self.run_pass(now)
    }

    /// Restore persisted patterns.
    pub fn restore_patterns(&mut self, patterns: impl IntoIterator<Item = Pattern>) {
        self.registry.restore(patterns);
    }

    fn analysis_due(&self, now: DateTime<Utc>) -> bool {
        self.last_pass
            .is_none_or(|last| now - last >= self.config.analysis_interval())
    }

    fn run_pass(&mut self, now: DateTime<Utc>) -> PassReport {
        let pending = std::mem::take(&mut self.pending);

        // Strengthen first so a pattern observed today is never decayed
        let mut events = self.registry.strengthen(&pending);
        let analysis = self.tracker.analyze(self.store.observations(), now);
        events.extend(self.registry.promote(self.tracker.candidates()));
        events.extend(self.registry.decay(now));
        self.last_pass = Some(now);

        debug!(
            applied = pending.len(),
            candidates = self.tracker.len(),
            patterns = self.registry.len(),
            events = events.len(),
            "pattern pass complete"
        );

        PassReport {
            observations_applied: pending.len(),
            analysis,
            events,
        }
    }

    pub fn observation_count(&self) -> usize {
        self.store.len()
    }

    pub fn observations(&self) -> &[Observation] {
        self.store.observations()
    }

    pub fn candidate_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn tracker(&self) -> &CandidateTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn pattern(&self, id: uuid::Uuid) -> Option<&Pattern> {
        self.registry.get(id)
    }

    pub fn patterns_by_type(&self, pattern_type: PatternType) -> Vec<&Pattern> {
        self.registry.patterns_by_type(pattern_type)
    }
}

impl PatternSource for PatternEngine {
    fn patterns(&self) -> Vec<&Pattern> {
        self.registry.patterns()
    }

    fn prediction_for_moment(&self, moment: DateTime<Utc>) -> MomentPrediction {
        self.registry.prediction_for_moment(moment)
    }
}
