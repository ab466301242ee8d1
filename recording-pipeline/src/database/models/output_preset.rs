use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::OutputPreset;

#[derive(Debug, Clone, FromRow)]
pub struct OutputPresetRow {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub credential_id: i64,
    pub metadata: String,
}

impl OutputPresetRow {
    pub fn into_domain(self) -> RepositoryResult<OutputPreset> {
        Ok(OutputPreset {
            id: self.id,
            user_id: self.user_id,
            platform: self.platform,
            credential_id: self.credential_id,
            metadata: string_to_value(&self.metadata)?,
        })
    }

    pub fn from_domain(p: &OutputPreset) -> RepositoryResult<Self> {
        Ok(Self {
            id: p.id,
            user_id: p.user_id,
            platform: p.platform.clone(),
            credential_id: p.credential_id,
            metadata: value_to_string(&p.metadata)?,
        })
    }
}
