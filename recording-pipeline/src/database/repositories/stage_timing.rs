//! Stage timing repository — append-only analytics rows (§3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::converters::{datetime_to_string, optional_datetime_to_string, value_to_string};
use crate::database::models::StageTimingRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::StageTiming;
use crate::Result;

#[async_trait]
pub trait StageTimingRepository: Send + Sync {
    async fn start(&self, timing: &StageTiming) -> Result<i64>;
    async fn complete(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        status: &str,
        error: Option<&str>,
        meta: Option<serde_json::Value>,
    ) -> Result<()>;
    async fn list_for_recording(&self, recording_id: i64) -> Result<Vec<StageTiming>>;
}

pub struct SqliteStageTimingRepository {
    pool: SqlitePool,
}

impl SqliteStageTimingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StageTimingRepository for SqliteStageTimingRepository {
    async fn start(&self, timing: &StageTiming) -> Result<i64> {
        let row = StageTimingRow::from_domain(timing)?;
        let inserted: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO stage_timings (
                recording_id, stage_type, substep, attempt, started_at, status
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(row.recording_id)
        .bind(&row.stage_type)
        .bind(&row.substep)
        .bind(row.attempt)
        .bind(&row.started_at)
        .bind(&row.status)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(inserted.0)
    }

    async fn complete(
        &self,
        id: i64,
        completed_at: DateTime<Utc>,
        status: &str,
        error: Option<&str>,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        let meta_json = meta.as_ref().map(value_to_string).transpose()?;
        let started: (String,) =
            sqlx::query_as("SELECT started_at FROM stage_timings WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
        let started_at = crate::database::converters::string_to_datetime(&started.0)?;
        let duration_ms = (completed_at - started_at).num_milliseconds();

        sqlx::query(
            r#"
            UPDATE stage_timings SET
                completed_at = ?, duration_ms = ?, status = ?, error = ?, meta = ?
            WHERE id = ?
            "#,
        )
        .bind(optional_datetime_to_string(&Some(completed_at)))
        .bind(duration_ms)
        .bind(status)
        .bind(error)
        .bind(meta_json)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn list_for_recording(&self, recording_id: i64) -> Result<Vec<StageTiming>> {
        let rows = sqlx::query_as::<_, StageTimingRow>(
            "SELECT * FROM stage_timings WHERE recording_id = ? ORDER BY started_at",
        )
        .bind(recording_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }
}
