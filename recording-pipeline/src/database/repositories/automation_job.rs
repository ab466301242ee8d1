//! Automation job repository (§4.12).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::converters::{datetime_to_string, optional_datetime_to_string};
use crate::database::models::AutomationJobRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::AutomationJob;
use crate::Result;

#[async_trait]
pub trait AutomationJobRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<AutomationJob>;
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<AutomationJob>>;
    async fn record_run(&self, id: i64, next_run_at: Option<DateTime<Utc>>) -> Result<()>;
}

pub struct SqliteAutomationJobRepository {
    pool: SqlitePool,
}

impl SqliteAutomationJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AutomationJobRepository for SqliteAutomationJobRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<AutomationJob> {
        let row = sqlx::query_as::<_, AutomationJobRow>(
            "SELECT * FROM automation_jobs WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("AutomationJob", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<AutomationJob>> {
        let rows = sqlx::query_as::<_, AutomationJobRow>(
            r#"
            SELECT * FROM automation_jobs
            WHERE is_active = 1 AND (next_run_at IS NULL OR next_run_at <= ?)
            "#,
        )
        .bind(datetime_to_string(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }

    async fn record_run(&self, id: i64, next_run_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query(
            "UPDATE automation_jobs SET last_run_at = ?, next_run_at = ?, run_count = run_count + 1 WHERE id = ?",
        )
        .bind(datetime_to_string(&Utc::now()))
        .bind(optional_datetime_to_string(&next_run_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}
