use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{StageTiming, StageType};

#[derive(Debug, Clone, FromRow)]
pub struct StageTimingRow {
    pub id: i64,
    pub recording_id: i64,
    pub stage_type: String,
    pub substep: Option<String>,
    pub attempt: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub error: Option<String>,
    pub meta: Option<String>,
}

impl StageTimingRow {
    pub fn into_domain(self) -> RepositoryResult<StageTiming> {
        Ok(StageTiming {
            id: self.id,
            recording_id: self.recording_id,
            stage_type: parse_enum::<StageType>(&self.stage_type, "stage type")?,
            substep: self.substep,
            attempt: self.attempt as u32,
            started_at: string_to_datetime(&self.started_at)?,
            completed_at: optional_string_to_datetime(&self.completed_at)?,
            duration_ms: self.duration_ms,
            status: self.status,
            error: self.error,
            meta: self.meta.as_deref().map(string_to_value).transpose()?,
        })
    }

    pub fn from_domain(t: &StageTiming) -> RepositoryResult<Self> {
        Ok(Self {
            id: t.id,
            recording_id: t.recording_id,
            stage_type: t.stage_type.to_string(),
            substep: t.substep.clone(),
            attempt: t.attempt as i64,
            started_at: datetime_to_string(&t.started_at),
            completed_at: optional_datetime_to_string(&t.completed_at),
            duration_ms: t.duration_ms,
            status: t.status.clone(),
            error: t.error.clone(),
            meta: t.meta.as_ref().map(value_to_string).transpose()?,
        })
    }
}
