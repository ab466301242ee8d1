//! User repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::UserRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::User;
use crate::Result;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<User>;
    async fn list_active(&self) -> Result<Vec<User>>;
    async fn update_config(&self, id: i64, config: &serde_json::Value) -> Result<()>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn get_by_id(&self, id: i64) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::not_found("User", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn list_active(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }

    async fn update_config(&self, id: i64, config: &serde_json::Value) -> Result<()> {
        sqlx::query("UPDATE users SET config = ? WHERE id = ?")
            .bind(serde_json::to_string(config).map_err(RepositoryError::from)?)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}
