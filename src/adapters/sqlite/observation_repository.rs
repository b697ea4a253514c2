//! SQLite implementation of the ObservationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Observation, ObservationPayload};
use crate::domain::ports::ObservationRepository;

#[derive(Clone)]
pub struct SqliteObservationRepository {
    pool: SqlitePool,
}

impl SqliteObservationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const INSERT_OBSERVATION: &str = r#"INSERT OR IGNORE INTO observations
    (id, timestamp, kind, payload, user_id, room, device_id, recorded_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#;

#[async_trait]
impl ObservationRepository for SqliteObservationRepository {
    async fn append(&self, observation: &Observation) -> DomainResult<()> {
        let payload = serde_json::to_string(&observation.payload)?;

        sqlx::query(INSERT_OBSERVATION)
            .bind(observation.id.to_string())
            .bind(super::format_datetime(observation.timestamp))
            .bind(observation.kind().as_str())
            .bind(&payload)
            .bind(&observation.user_id)
            .bind(&observation.room)
            .bind(&observation.device_id)
            .bind(super::format_datetime(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append_batch(&self, observations: &[Observation]) -> DomainResult<usize> {
        let recorded_at = super::format_datetime(Utc::now());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for observation in observations {
            let payload = serde_json::to_string(&observation.payload)?;
            let result = sqlx::query(INSERT_OBSERVATION)
                .bind(observation.id.to_string())
                .bind(super::format_datetime(observation.timestamp))
                .bind(observation.kind().as_str())
                .bind(&payload)
                .bind(&observation.user_id)
                .bind(&observation.room)
                .bind(&observation.device_id)
                .bind(&recorded_at)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted as usize)
    }

    async fn list_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<Observation>> {
        let rows: Vec<ObservationRow> = sqlx::query_as(
            "SELECT * FROM observations WHERE timestamp >= ? ORDER BY timestamp ASC, id ASC"
        )
        .bind(super::format_datetime(since))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Observation::try_from).collect()
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM observations WHERE timestamp < ?")
            .bind(super::format_datetime(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count(&self) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM observations")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    id: String,
    timestamp: String,
    #[allow(dead_code)]
    kind: String,
    payload: String,
    user_id: Option<String>,
    room: Option<String>,
    device_id: Option<String>,
    #[allow(dead_code)]
    recorded_at: String,
}

impl TryFrom<ObservationRow> for Observation {
    type Error = DomainError;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        let payload: ObservationPayload = serde_json::from_str(&row.payload)?;

        Ok(Observation {
            id: super::parse_uuid(&row.id)?,
            timestamp: super::parse_datetime(&row.timestamp)?,
            payload,
            user_id: row.user_id,
            room: row.room,
            device_id: row.device_id,
        })
    }
}
