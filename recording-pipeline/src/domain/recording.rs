//! The central `Recording` entity (§3 "Recording").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OutputTarget, ProcessingStage, SourceMetadata};

/// Aggregate lifecycle status. Derived — see `status_aggregator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingStatus {
    Initialized,
    Downloading,
    Downloaded,
    Processing,
    Processed,
    Uploading,
    Ready,
    Skipped,
    PendingSource,
    Expired,
}

impl RecordingStatus {
    /// Statuses set directly by source sync / explicit transitions rather
    /// than derived by the aggregator (invariant 4 in §3).
    pub fn is_base_transition(self) -> bool {
        matches!(
            self,
            RecordingStatus::Initialized
                | RecordingStatus::Downloading
                | RecordingStatus::Downloaded
                | RecordingStatus::Skipped
                | RecordingStatus::PendingSource
                | RecordingStatus::Expired
        )
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecordingStatus::Initialized => "INITIALIZED",
            RecordingStatus::Downloading => "DOWNLOADING",
            RecordingStatus::Downloaded => "DOWNLOADED",
            RecordingStatus::Processing => "PROCESSING",
            RecordingStatus::Processed => "PROCESSED",
            RecordingStatus::Uploading => "UPLOADING",
            RecordingStatus::Ready => "READY",
            RecordingStatus::Skipped => "SKIPPED",
            RecordingStatus::PendingSource => "PENDING_SOURCE",
            RecordingStatus::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RecordingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "INITIALIZED" => RecordingStatus::Initialized,
            "DOWNLOADING" => RecordingStatus::Downloading,
            "DOWNLOADED" => RecordingStatus::Downloaded,
            "PROCESSING" => RecordingStatus::Processing,
            "PROCESSED" => RecordingStatus::Processed,
            "UPLOADING" => RecordingStatus::Uploading,
            "READY" => RecordingStatus::Ready,
            "SKIPPED" => RecordingStatus::Skipped,
            "PENDING_SOURCE" => RecordingStatus::PendingSource,
            "EXPIRED" => RecordingStatus::Expired,
            other => return Err(format!("unknown recording status: {other}")),
        })
    }
}

/// Two-stage deletion state (invariant 2 in §3): active -> soft -> hard, monotone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteState {
    Active,
    Soft,
    Hard,
}

impl std::fmt::Display for DeleteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeleteState::Active => "active",
            DeleteState::Soft => "soft",
            DeleteState::Hard => "hard",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DeleteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => DeleteState::Active,
            "soft" => DeleteState::Soft,
            "hard" => DeleteState::Hard,
            other => return Err(format!("unknown delete state: {other}")),
        })
    }
}

/// A topic with an approximate timestamp into the recording, produced by the
/// topic-extraction stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicTimestamp {
    pub topic: String,
    pub timestamp_seconds: f64,
}

/// The central recording entity. See `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub user_id: i64,
    pub input_source_id: Option<i64>,
    pub template_id: Option<i64>,

    pub display_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<i64>,

    pub status: RecordingStatus,
    pub is_mapped: bool,
    pub blank_record: bool,
    pub on_pause: bool,

    pub failed: bool,
    pub failed_at_stage: Option<String>,
    pub failed_reason: Option<String>,
    pub failed_at: Option<DateTime<Utc>>,

    pub local_video_path: Option<String>,
    pub processed_video_path: Option<String>,
    pub processed_audio_path: Option<String>,
    pub transcription_dir: Option<String>,

    pub delete_state: DeleteState,
    pub deleted: bool,
    pub deletion_reason: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub expire_at: Option<DateTime<Utc>>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub hard_delete_at: Option<DateTime<Utc>>,

    pub pipeline_started_at: Option<DateTime<Utc>>,
    pub pipeline_completed_at: Option<DateTime<Utc>>,
    pub pipeline_duration_seconds: Option<f64>,

    pub main_topics: Option<Vec<String>>,
    pub topics_with_timestamps: Option<Vec<TopicTimestamp>>,
    pub processing_preferences: Option<serde_json::Value>,

    /// Eager-loaded children, populated by `get_by_id`/`get_by_ids`. `None`
    /// when the row was fetched without its children (e.g. list views).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<ProcessingStage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<OutputTarget>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SourceMetadata>,
}

impl Recording {
    pub fn stages(&self) -> &[ProcessingStage] {
        self.stages.as_deref().unwrap_or(&[])
    }

    pub fn targets(&self) -> &[OutputTarget] {
        self.targets.as_deref().unwrap_or(&[])
    }
}
