use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{ProcessingStage, StageStatus, StageType};

#[derive(Debug, Clone, FromRow)]
pub struct ProcessingStageRow {
    pub id: i64,
    pub recording_id: i64,
    pub stage_type: String,
    pub status: String,
    pub failed: bool,
    pub failed_reason: Option<String>,
    pub skip_reason: Option<String>,
    pub retry_count: i64,
    pub max_retries: i64,
    pub completed_at: Option<String>,
    pub stage_meta: Option<String>,
}

impl ProcessingStageRow {
    pub fn into_domain(self) -> RepositoryResult<ProcessingStage> {
        Ok(ProcessingStage {
            id: self.id,
            recording_id: self.recording_id,
            stage_type: parse_enum::<StageType>(&self.stage_type, "stage type")?,
            status: parse_enum::<StageStatus>(&self.status, "stage status")?,
            failed: self.failed,
            failed_reason: self.failed_reason,
            skip_reason: self.skip_reason,
            retry_count: self.retry_count as u32,
            max_retries: self.max_retries as u32,
            completed_at: optional_string_to_datetime(&self.completed_at)?,
            stage_meta: self
                .stage_meta
                .as_deref()
                .map(string_to_value)
                .transpose()?,
        })
    }

    pub fn from_domain(s: &ProcessingStage) -> RepositoryResult<Self> {
        Ok(Self {
            id: s.id,
            recording_id: s.recording_id,
            stage_type: s.stage_type.to_string(),
            status: s.status.to_string(),
            failed: s.failed,
            failed_reason: s.failed_reason.clone(),
            skip_reason: s.skip_reason.clone(),
            retry_count: s.retry_count as i64,
            max_retries: s.max_retries as i64,
            completed_at: optional_datetime_to_string(&s.completed_at),
            stage_meta: s.stage_meta.as_ref().map(value_to_string).transpose()?,
        })
    }
}
