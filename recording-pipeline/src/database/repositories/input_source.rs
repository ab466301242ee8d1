//! Input source repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::converters::datetime_to_string;
use crate::database::models::InputSourceRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::InputSource;
use crate::Result;

#[async_trait]
pub trait InputSourceRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<InputSource>;
    async fn list_active_by_user(&self, user_id: i64) -> Result<Vec<InputSource>>;
    async fn update_last_sync(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

pub struct SqliteInputSourceRepository {
    pool: SqlitePool,
}

impl SqliteInputSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InputSourceRepository for SqliteInputSourceRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<InputSource> {
        let row = sqlx::query_as::<_, InputSourceRow>(
            "SELECT * FROM input_sources WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("InputSource", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn list_active_by_user(&self, user_id: i64) -> Result<Vec<InputSource>> {
        let rows = sqlx::query_as::<_, InputSourceRow>(
            "SELECT * FROM input_sources WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }

    async fn update_last_sync(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE input_sources SET last_sync_at = ? WHERE id = ?")
            .bind(datetime_to_string(&at))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}
