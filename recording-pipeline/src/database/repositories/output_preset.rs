//! Output preset repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::OutputPresetRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::OutputPreset;
use crate::Result;

#[async_trait]
pub trait OutputPresetRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<OutputPreset>;
    /// Bulk lookup, tenant-scoped, preserving no particular order. Used to
    /// resolve `output_config.preset_ids` (a list of preset ids) into the
    /// presets themselves, e.g. to derive the platforms they target (§4.8
    /// step 3).
    async fn get_by_ids(&self, ids: &[i64], user_id: i64) -> Result<Vec<OutputPreset>>;
    async fn list_by_platform(&self, user_id: i64, platform: &str) -> Result<Vec<OutputPreset>>;
}

pub struct SqliteOutputPresetRepository {
    pool: SqlitePool,
}

impl SqliteOutputPresetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutputPresetRepository for SqliteOutputPresetRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<OutputPreset> {
        let row = sqlx::query_as::<_, OutputPresetRow>(
            "SELECT * FROM output_presets WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("OutputPreset", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn get_by_ids(&self, ids: &[i64], user_id: i64) -> Result<Vec<OutputPreset>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_by_id(*id, user_id).await {
                Ok(preset) => out.push(preset),
                Err(crate::Error::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    async fn list_by_platform(&self, user_id: i64, platform: &str) -> Result<Vec<OutputPreset>> {
        let rows = sqlx::query_as::<_, OutputPresetRow>(
            "SELECT * FROM output_presets WHERE user_id = ? AND platform = ?",
        )
        .bind(user_id)
        .bind(platform)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }
}
