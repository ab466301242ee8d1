use sqlx::FromRow;

use crate::database::repositories::errors::RepositoryResult;
use crate::domain::CredentialEnvelope;

#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub account_name: String,
    pub encrypted_blob: Vec<u8>,
}

impl CredentialRow {
    pub fn into_domain(self) -> RepositoryResult<CredentialEnvelope> {
        Ok(CredentialEnvelope {
            id: self.id,
            user_id: self.user_id,
            platform: self.platform,
            account_name: self.account_name,
            encrypted_blob: self.encrypted_blob,
        })
    }

    pub fn from_domain(c: &CredentialEnvelope) -> RepositoryResult<Self> {
        Ok(Self {
            id: c.id,
            user_id: c.user_id,
            platform: c.platform.clone(),
            account_name: c.account_name.clone(),
            encrypted_blob: c.encrypted_blob.clone(),
        })
    }
}
