//! Quota usage repository (§4.14).

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::QuotaUsageRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::QuotaUsage;
use crate::Result;

#[async_trait]
pub trait QuotaRepository: Send + Sync {
    async fn get_or_create(&self, user_id: i64, period: u32) -> Result<QuotaUsage>;
    async fn increment_recordings(&self, user_id: i64, period: u32, overage: bool) -> Result<()>;
    async fn adjust_storage(&self, user_id: i64, period: u32, delta_bytes: i64) -> Result<()>;
    async fn set_concurrent_tasks(&self, user_id: i64, period: u32, count: i64) -> Result<()>;
}

pub struct SqliteQuotaRepository {
    pool: SqlitePool,
}

impl SqliteQuotaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn get_or_create(&self, user_id: i64, period: u32) -> Result<QuotaUsage> {
        let existing = sqlx::query_as::<_, QuotaUsageRow>(
            "SELECT * FROM quota_usage WHERE user_id = ? AND period = ?",
        )
        .bind(user_id)
        .bind(period as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if let Some(row) = existing {
            return Ok(row.into_domain()?);
        }

        sqlx::query("INSERT INTO quota_usage (user_id, period) VALUES (?, ?)")
            .bind(user_id)
            .bind(period as i64)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(QuotaUsage::empty(user_id, period))
    }

    async fn increment_recordings(&self, user_id: i64, period: u32, overage: bool) -> Result<()> {
        self.get_or_create(user_id, period).await?;
        if overage {
            sqlx::query(
                "UPDATE quota_usage SET recordings_count = recordings_count + 1, recordings_overage = recordings_overage + 1 WHERE user_id = ? AND period = ?",
            )
        } else {
            sqlx::query(
                "UPDATE quota_usage SET recordings_count = recordings_count + 1 WHERE user_id = ? AND period = ?",
            )
        }
        .bind(user_id)
        .bind(period as i64)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn adjust_storage(&self, user_id: i64, period: u32, delta_bytes: i64) -> Result<()> {
        self.get_or_create(user_id, period).await?;
        sqlx::query(
            "UPDATE quota_usage SET storage_bytes = MAX(0, storage_bytes + ?) WHERE user_id = ? AND period = ?",
        )
        .bind(delta_bytes)
        .bind(user_id)
        .bind(period as i64)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_concurrent_tasks(&self, user_id: i64, period: u32, count: i64) -> Result<()> {
        self.get_or_create(user_id, period).await?;
        sqlx::query(
            "UPDATE quota_usage SET concurrent_tasks_count = ? WHERE user_id = ? AND period = ?",
        )
        .bind(count)
        .bind(user_id)
        .bind(period as i64)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}
