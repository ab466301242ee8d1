//! Credential envelope repository (§3, §4.11). Encryption/decryption of the
//! blob itself is an external collaborator; this repository only stores and
//! retrieves the opaque bytes.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::CredentialRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::CredentialEnvelope;
use crate::Result;

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<CredentialEnvelope>;
    async fn get_by_account(
        &self,
        user_id: i64,
        platform: &str,
        account_name: &str,
    ) -> Result<CredentialEnvelope>;
}

pub struct SqliteCredentialRepository {
    pool: SqlitePool,
}

impl SqliteCredentialRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<CredentialEnvelope> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM credentials WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("CredentialEnvelope", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn get_by_account(
        &self,
        user_id: i64,
        platform: &str,
        account_name: &str,
    ) -> Result<CredentialEnvelope> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM credentials WHERE user_id = ? AND platform = ? AND account_name = ?",
        )
        .bind(user_id)
        .bind(platform)
        .bind(account_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("CredentialEnvelope", account_name.to_string()))?;
        Ok(row.into_domain()?)
    }
}
