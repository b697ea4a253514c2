//! Observation repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::Observation;

/// Repository interface for observation persistence.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Append a single observation. Re-appending an existing id is a no-op.
    async fn append(&self, observation: &Observation) -> DomainResult<()>;

    /// Append a batch in one transaction, returning how many rows were new.
    async fn append_batch(&self, observations: &[Observation]) -> DomainResult<usize>;

    /// Observations at or after `since`, oldest first.
    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<Observation>>;

    /// Delete observations older than `cutoff`, returning the number removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;

    async fn count(&self) -> DomainResult<u64>;
}
