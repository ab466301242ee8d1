use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::SourceMetadata;

#[derive(Debug, Clone, FromRow)]
pub struct SourceMetadataRow {
    pub recording_id: i64,
    pub source_id: Option<String>,
    pub download_url: Option<String>,
    pub passcode: Option<String>,
    pub reported_duration_seconds: Option<f64>,
    pub reported_size_bytes: Option<i64>,
    pub download_token: Option<String>,
    pub download_token_fetched_at: Option<String>,
    pub still_processing_upstream: bool,
    pub extra: Option<String>,
}

impl SourceMetadataRow {
    pub fn into_domain(self) -> RepositoryResult<SourceMetadata> {
        Ok(SourceMetadata {
            recording_id: self.recording_id,
            source_id: self.source_id,
            download_url: self.download_url,
            passcode: self.passcode,
            reported_duration_seconds: self.reported_duration_seconds,
            reported_size_bytes: self.reported_size_bytes,
            download_token: self.download_token,
            download_token_fetched_at: optional_string_to_datetime(
                &self.download_token_fetched_at,
            )?,
            still_processing_upstream: self.still_processing_upstream,
            extra: self.extra.as_deref().map(string_to_value).transpose()?,
        })
    }

    pub fn from_domain(m: &SourceMetadata) -> RepositoryResult<Self> {
        Ok(Self {
            recording_id: m.recording_id,
            source_id: m.source_id.clone(),
            download_url: m.download_url.clone(),
            passcode: m.passcode.clone(),
            reported_duration_seconds: m.reported_duration_seconds,
            reported_size_bytes: m.reported_size_bytes,
            download_token: m.download_token.clone(),
            download_token_fetched_at: optional_datetime_to_string(
                &m.download_token_fetched_at,
            ),
            still_processing_upstream: m.still_processing_upstream,
            extra: m.extra.as_ref().map(value_to_string).transpose()?,
        })
    }
}
