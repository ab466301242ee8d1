use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{OutputTarget, TargetStatus};

#[derive(Debug, Clone, FromRow)]
pub struct OutputTargetRow {
    pub id: i64,
    pub recording_id: i64,
    pub target_type: String,
    pub status: String,
    pub preset_id: Option<i64>,
    pub uploaded_at: Option<String>,
    pub failed_reason: Option<String>,
    pub external_video_id: Option<String>,
    pub external_url: Option<String>,
    pub result_meta: Option<String>,
}

impl OutputTargetRow {
    pub fn into_domain(self) -> RepositoryResult<OutputTarget> {
        Ok(OutputTarget {
            id: self.id,
            recording_id: self.recording_id,
            target_type: self.target_type,
            status: parse_enum::<TargetStatus>(&self.status, "target status")?,
            preset_id: self.preset_id,
            uploaded_at: optional_string_to_datetime(&self.uploaded_at)?,
            failed_reason: self.failed_reason,
            external_video_id: self.external_video_id,
            external_url: self.external_url,
            result_meta: self
                .result_meta
                .as_deref()
                .map(string_to_value)
                .transpose()?,
        })
    }

    pub fn from_domain(t: &OutputTarget) -> RepositoryResult<Self> {
        Ok(Self {
            id: t.id,
            recording_id: t.recording_id,
            target_type: t.target_type.clone(),
            status: t.status.to_string(),
            preset_id: t.preset_id,
            uploaded_at: optional_datetime_to_string(&t.uploaded_at),
            failed_reason: t.failed_reason.clone(),
            external_video_id: t.external_video_id.clone(),
            external_url: t.external_url.clone(),
            result_meta: t.result_meta.as_ref().map(value_to_string).transpose()?,
        })
    }
}
