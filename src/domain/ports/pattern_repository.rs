//! Pattern repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Pattern, PatternType};

/// Repository interface for persisting promoted patterns between runs.
#[async_trait]
pub trait PatternRepository: Send + Sync {
    /// Insert or replace a pattern, keyed by its id.
    async fn upsert(&self, pattern: &Pattern) -> DomainResult<()>;

    async fn get(&self, id: Uuid) -> DomainResult<Option<Pattern>>;

    /// List patterns, optionally filtered by type.
    async fn list(&self, pattern_type: Option<PatternType>) -> DomainResult<Vec<Pattern>>;
}
