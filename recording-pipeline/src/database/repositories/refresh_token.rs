//! Refresh-token store (§6 persisted state layout). Unrelated to recordings,
//! but its expiry sweep is scheduled alongside the retention controller
//! (§4.13 "Also: expired refresh-tokens GC").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::converters::datetime_to_string;
use crate::database::repositories::errors::RepositoryError;
use crate::Result;

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Deletes every row with `expires_at <= now`, returning the count removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

pub struct SqliteRefreshTokenRepository {
    pool: SqlitePool,
}

impl SqliteRefreshTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for SqliteRefreshTokenRepository {
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(datetime_to_string(&now))
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(result.rows_affected())
    }
}
