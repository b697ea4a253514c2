//! Rolling, time-ordered observation window.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Observation;

/// Outcome of recording one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored in the window
    Retained,
    /// Already present, ignored
    Duplicate,
    /// Older than the retention cutoff, dropped
    Expired,
}

/// Bounded observation window ordered by timestamp.
#[derive(Debug, Clone)]
pub struct ObservationStore {
    observations: Vec<Observation>,
    ids: HashSet<Uuid>,
    retention: Duration,
}

impl ObservationStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            observations: Vec::new(),
            ids: HashSet::new(),
            retention,
        }
    }

    /// Insert one observation at its time position and evict expired entries.
    pub fn record(&mut self, observation: Observation, now: DateTime<Utc>) -> DomainResult<RecordOutcome> {
        observation.validate()?;
        let outcome = self.insert(observation, now);
        self.evict(now);
        Ok(outcome)
    }

    /// Bulk-load observations. Invalid entries are skipped and logged.
    ///
    /// Returns the number of observations that were newly retained.
    pub fn import(&mut self, observations: &[Observation], now: DateTime<Utc>) -> usize {
        let mut batch: Vec<&Observation> = observations.iter().collect();
        batch.sort_by_key(|o| o.timestamp);

        let mut retained = 0;
        for observation in batch {
            if let Err(err) = observation.validate() {
                warn!(observation_id = %observation.id, error = %err, "skipping invalid observation");
                continue;
            }
            if self.insert(observation.clone(), now) == RecordOutcome::Retained {
                retained += 1;
            }
        }
        self.evict(now);
        debug!(retained, total = self.observations.len(), "imported observation history");
        retained
    }

    fn insert(&mut self, observation: Observation, now: DateTime<Utc>) -> RecordOutcome {
        if observation.timestamp < self.cutoff(now) {
            return RecordOutcome::Expired;
        }
        if !self.ids.insert(observation.id) {
            return RecordOutcome::Duplicate;
        }
        let at = self
            .observations
            .partition_point(|o| o.timestamp <= observation.timestamp);
        self.observations.insert(at, observation);
        RecordOutcome::Retained
    }

    /// Drop observations that left the retention window. Returns how many were removed.
    pub fn evict(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = self.cutoff(now);
        let expired = self.observations.partition_point(|o| o.timestamp < cutoff);
        for observation in self.observations.drain(..expired) {
            self.ids.remove(&observation.id);
        }
        expired
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Observations strictly after `ts`.
    pub fn since(&self, ts: DateTime<Utc>) -> &[Observation] {
        let start = self.observations.partition_point(|o| o.timestamp <= ts);
        &self.observations[start..]
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Whole days between the oldest and newest observation.
    pub fn span_days(&self) -> i64 {
        match (self.observations.first(), self.observations.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_days(),
            _ => 0,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObservationStore {
        ObservationStore::new(Duration::days(90))
    }

    #[test]
    fn test_out_of_order_records_are_sorted() {
        let now = Utc::now();
        let mut store = store();
        store.record(Observation::activity(now - Duration::hours(1), "b"), now).unwrap();
        store.record(Observation::activity(now - Duration::hours(3), "a"), now).unwrap();
        store.record(Observation::activity(now, "c"), now).unwrap();

        let names: Vec<_> = store
            .observations()
            .iter()
            .filter_map(Observation::inferred_activity)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_expired_record_is_not_retained() {
        let now = Utc::now();
        let mut store = store();
        let outcome = store
            .record(Observation::activity(now - Duration::days(91), "old"), now)
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Expired);
        assert!(store.is_empty());
    }

    #[test]
    fn test_eviction_on_later_record() {
        let start = Utc::now();
        let mut store = store();
        store.record(Observation::activity(start, "first"), start).unwrap();
        let later = start + Duration::days(91);
        store.record(Observation::activity(later, "second"), later).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_import_is_idempotent() {
        let now = Utc::now();
        let batch: Vec<_> = (0..5)
            .map(|i| Observation::activity(now - Duration::hours(i), "reading"))
            .collect();
        let mut store = store();
        assert_eq!(store.import(&batch, now), 5);
        assert_eq!(store.import(&batch, now), 0);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_since_is_exclusive() {
        let now = Utc::now();
        let mut store = store();
        store.record(Observation::activity(now - Duration::hours(2), "a"), now).unwrap();
        store.record(Observation::activity(now - Duration::hours(1), "b"), now).unwrap();
        assert_eq!(store.since(now - Duration::hours(2)).len(), 1);
    }
}
