use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{DeleteState, Recording, RecordingStatus, TopicTimestamp};

#[derive(Debug, Clone, FromRow)]
pub struct RecordingRow {
    pub id: i64,
    pub user_id: i64,
    pub input_source_id: Option<i64>,
    pub template_id: Option<i64>,
    pub display_name: String,
    pub start_time: String,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<i64>,
    pub status: String,
    pub is_mapped: bool,
    pub blank_record: bool,
    pub on_pause: bool,
    pub failed: bool,
    pub failed_at_stage: Option<String>,
    pub failed_reason: Option<String>,
    pub failed_at: Option<String>,
    pub local_video_path: Option<String>,
    pub processed_video_path: Option<String>,
    pub processed_audio_path: Option<String>,
    pub transcription_dir: Option<String>,
    pub delete_state: String,
    pub deleted: bool,
    pub deletion_reason: Option<String>,
    pub deleted_at: Option<String>,
    pub expire_at: Option<String>,
    pub soft_deleted_at: Option<String>,
    pub hard_delete_at: Option<String>,
    pub pipeline_started_at: Option<String>,
    pub pipeline_completed_at: Option<String>,
    pub pipeline_duration_seconds: Option<f64>,
    pub main_topics: Option<String>,
    pub topics_with_timestamps: Option<String>,
    pub processing_preferences: Option<String>,
}

impl RecordingRow {
    pub fn into_domain(self) -> RepositoryResult<Recording> {
        Ok(Recording {
            id: self.id,
            user_id: self.user_id,
            input_source_id: self.input_source_id,
            template_id: self.template_id,
            display_name: self.display_name,
            start_time: string_to_datetime(&self.start_time)?,
            duration_seconds: self.duration_seconds,
            size_bytes: self.size_bytes,
            status: parse_enum::<RecordingStatus>(&self.status, "recording status")?,
            is_mapped: self.is_mapped,
            blank_record: self.blank_record,
            on_pause: self.on_pause,
            failed: self.failed,
            failed_at_stage: self.failed_at_stage,
            failed_reason: self.failed_reason,
            failed_at: optional_string_to_datetime(&self.failed_at)?,
            local_video_path: self.local_video_path,
            processed_video_path: self.processed_video_path,
            processed_audio_path: self.processed_audio_path,
            transcription_dir: self.transcription_dir,
            delete_state: parse_enum::<DeleteState>(&self.delete_state, "delete state")?,
            deleted: self.deleted,
            deletion_reason: self.deletion_reason,
            deleted_at: optional_string_to_datetime(&self.deleted_at)?,
            expire_at: optional_string_to_datetime(&self.expire_at)?,
            soft_deleted_at: optional_string_to_datetime(&self.soft_deleted_at)?,
            hard_delete_at: optional_string_to_datetime(&self.hard_delete_at)?,
            pipeline_started_at: optional_string_to_datetime(&self.pipeline_started_at)?,
            pipeline_completed_at: optional_string_to_datetime(&self.pipeline_completed_at)?,
            pipeline_duration_seconds: self.pipeline_duration_seconds,
            main_topics: optional_string_to_json::<Vec<String>>(&self.main_topics)?,
            topics_with_timestamps: optional_string_to_json::<Vec<TopicTimestamp>>(
                &self.topics_with_timestamps,
            )?,
            processing_preferences: self
                .processing_preferences
                .as_deref()
                .map(string_to_value)
                .transpose()?,
            stages: None,
            targets: None,
            source_metadata: None,
        })
    }

    pub fn from_domain(r: &Recording) -> RepositoryResult<Self> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            input_source_id: r.input_source_id,
            template_id: r.template_id,
            display_name: r.display_name.clone(),
            start_time: datetime_to_string(&r.start_time),
            duration_seconds: r.duration_seconds,
            size_bytes: r.size_bytes,
            status: r.status.to_string(),
            is_mapped: r.is_mapped,
            blank_record: r.blank_record,
            on_pause: r.on_pause,
            failed: r.failed,
            failed_at_stage: r.failed_at_stage.clone(),
            failed_reason: r.failed_reason.clone(),
            failed_at: optional_datetime_to_string(&r.failed_at),
            local_video_path: r.local_video_path.clone(),
            processed_video_path: r.processed_video_path.clone(),
            processed_audio_path: r.processed_audio_path.clone(),
            transcription_dir: r.transcription_dir.clone(),
            delete_state: r.delete_state.to_string(),
            deleted: r.deleted,
            deletion_reason: r.deletion_reason.clone(),
            deleted_at: optional_datetime_to_string(&r.deleted_at),
            expire_at: optional_datetime_to_string(&r.expire_at),
            soft_deleted_at: optional_datetime_to_string(&r.soft_deleted_at),
            hard_delete_at: optional_datetime_to_string(&r.hard_delete_at),
            pipeline_started_at: optional_datetime_to_string(&r.pipeline_started_at),
            pipeline_completed_at: optional_datetime_to_string(&r.pipeline_completed_at),
            pipeline_duration_seconds: r.pipeline_duration_seconds,
            main_topics: optional_json_to_string(&r.main_topics)?,
            topics_with_timestamps: optional_json_to_string(&r.topics_with_timestamps)?,
            processing_preferences: r
                .processing_preferences
                .as_ref()
                .map(value_to_string)
                .transpose()?,
        })
    }
}
