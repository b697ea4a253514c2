//! Persistent project state shared by the commands.
//!
//! Commands never keep engines between invocations: each one opens the
//! database, restores promoted patterns, replays the retained observation
//! window and writes the resulting patterns back.

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::sqlite::{
    initialize_from_config, SqliteObservationRepository, SqlitePatternRepository,
};
use crate::domain::models::{CalendarEvent, Config, ExternalContext, OccupantState};
use crate::domain::ports::{Clock, ObservationRepository, PatternRepository, SystemClock};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{Anticipator, EventBus, EventBusConfig, PassReport};

/// Calendar, external context and occupants read from a YAML or JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextSnapshot {
    #[serde(default)]
    pub calendar: Vec<CalendarEvent>,
    #[serde(default)]
    pub context: ExternalContext,
    #[serde(default)]
    pub occupants: Vec<OccupantState>,
}

impl ContextSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse context file {}", path.display()))
    }

    /// Push the snapshot into the scenario engine.
    pub fn apply(self, anticipator: &mut Anticipator) -> Result<()> {
        anticipator
            .update_calendar(self.calendar)
            .context("Calendar rejected")?;
        anticipator.update_context(self.context);
        anticipator.update_occupants(self.occupants);
        Ok(())
    }
}

pub struct Workspace {
    pub config: Config,
    pool: SqlitePool,
}

impl Workspace {
    /// Load configuration and open (migrating if needed) the database.
    pub async fn open() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    pub async fn with_config(config: Config) -> Result<Self> {
        let pool = initialize_from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        Ok(Self { config, pool })
    }

    pub fn observations(&self) -> SqliteObservationRepository {
        SqliteObservationRepository::new(self.pool.clone())
    }

    pub fn pattern_store(&self) -> SqlitePatternRepository {
        SqlitePatternRepository::new(self.pool.clone())
    }

    /// Build an anticipator from persisted state on the wall clock.
    pub async fn anticipator(&self) -> Result<(Anticipator, PassReport)> {
        self.anticipator_with_clock(Arc::new(SystemClock)).await
    }

    pub async fn anticipator_with_clock(
        &self,
        clock: Arc<dyn Clock>,
    ) -> Result<(Anticipator, PassReport)> {
        let bus = Arc::new(EventBus::new(EventBusConfig::default()));
        let mut anticipator = Anticipator::new(&self.config, clock, bus);

        let stored = self
            .pattern_store()
            .list(None)
            .await
            .context("Failed to load stored patterns")?;
        debug!(patterns = stored.len(), "restoring patterns");
        anticipator.restore_patterns(stored);

        let since = anticipator.now() - self.config.pattern_engine.retention();
        let history = self
            .observations()
            .list_since(since)
            .await
            .context("Failed to load observation history")?;
        let report = anticipator.import_history(&history);

        Ok((anticipator, report))
    }

    /// Write every promoted pattern back, returning how many were saved.
    pub async fn save_patterns(&self, anticipator: &Anticipator) -> Result<usize> {
        let store = self.pattern_store();
        let patterns = anticipator.patterns();
        for pattern in &patterns {
            store
                .upsert(pattern)
                .await
                .with_context(|| format!("Failed to save pattern {}", pattern.id))?;
        }
        Ok(patterns.len())
    }

    /// Drop observations that fell out of the retention window.
    pub async fn purge_expired(&self, anticipator: &Anticipator) -> Result<u64> {
        let cutoff = anticipator.now() - self.config.pattern_engine.retention();
        self.observations()
            .purge_before(cutoff)
            .await
            .context("Failed to purge old observations")
    }
}
