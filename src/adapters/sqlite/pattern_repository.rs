//! SQLite implementation of the PatternRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Pattern, PatternSignature, PatternStatus, PatternType};
use crate::domain::ports::PatternRepository;

#[derive(Clone)]
pub struct SqlitePatternRepository {
    pool: SqlitePool,
}

impl SqlitePatternRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatternRepository for SqlitePatternRepository {
    async fn upsert(&self, pattern: &Pattern) -> DomainResult<()> {
        let signature = serde_json::to_string(&pattern.signature)?;

        sqlx::query(
            r#"INSERT INTO patterns (id, key, pattern_type, signature, confidence, stability,
               first_observed, last_observed, occurrences, status, last_decayed_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   key = excluded.key,
                   pattern_type = excluded.pattern_type,
                   signature = excluded.signature,
                   confidence = excluded.confidence,
                   stability = excluded.stability,
                   first_observed = excluded.first_observed,
                   last_observed = excluded.last_observed,
                   occurrences = excluded.occurrences,
                   status = excluded.status,
                   last_decayed_at = excluded.last_decayed_at,
                   updated_at = excluded.updated_at"#
        )
        .bind(pattern.id.to_string())
        .bind(&pattern.key)
        .bind(pattern.pattern_type.as_str())
        .bind(&signature)
        .bind(pattern.confidence)
        .bind(pattern.stability)
        .bind(super::format_datetime(pattern.first_observed))
        .bind(super::format_datetime(pattern.last_observed))
        .bind(i64::try_from(pattern.occurrences).unwrap_or(i64::MAX))
        .bind(pattern.status.as_str())
        .bind(pattern.last_decayed_at.map(super::format_datetime))
        .bind(super::format_datetime(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Pattern>> {
        let row: Option<PatternRow> = sqlx::query_as("SELECT * FROM patterns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Pattern::try_from).transpose()
    }

    async fn list(&self, pattern_type: Option<PatternType>) -> DomainResult<Vec<Pattern>> {
        let rows: Vec<PatternRow> = match pattern_type {
            Some(pattern_type) => {
                sqlx::query_as(
                    "SELECT * FROM patterns WHERE pattern_type = ? ORDER BY confidence DESC, key ASC"
                )
                .bind(pattern_type.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM patterns ORDER BY confidence DESC, key ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(Pattern::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: String,
    key: String,
    pattern_type: String,
    signature: String,
    confidence: f64,
    stability: f64,
    first_observed: String,
    last_observed: String,
    occurrences: i64,
    status: String,
    last_decayed_at: Option<String>,
    #[allow(dead_code)]
    updated_at: String,
}

impl TryFrom<PatternRow> for Pattern {
    type Error = DomainError;

    fn try_from(row: PatternRow) -> Result<Self, Self::Error> {
        let signature: PatternSignature = serde_json::from_str(&row.signature)?;
        let pattern_type = PatternType::from_str(&row.pattern_type).ok_or_else(|| {
            DomainError::SerializationError(format!("unknown pattern type '{}'", row.pattern_type))
        })?;
        if signature.pattern_type() != pattern_type {
            return Err(DomainError::SerializationError(format!(
                "pattern {} signature does not match type {pattern_type}",
                row.id
            )));
        }
        let status = PatternStatus::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("unknown pattern status '{}'", row.status))
        })?;

        Ok(Pattern {
            id: super::parse_uuid(&row.id)?,
            key: row.key,
            pattern_type,
            signature,
            confidence: row.confidence,
            stability: row.stability,
            first_observed: super::parse_datetime(&row.first_observed)?,
            last_observed: super::parse_datetime(&row.last_observed)?,
            occurrences: u64::try_from(row.occurrences).unwrap_or(0),
            status,
            last_decayed_at: super::parse_optional_datetime(row.last_decayed_at)?,
        })
    }
}
