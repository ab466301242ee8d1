//! `OutputTarget` — one upload destination per recording (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetStatus {
    NotUploaded,
    Uploading,
    Uploaded,
    Failed,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetStatus::NotUploaded => "NOT_UPLOADED",
            TargetStatus::Uploading => "UPLOADING",
            TargetStatus::Uploaded => "UPLOADED",
            TargetStatus::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NOT_UPLOADED" => TargetStatus::NotUploaded,
            "UPLOADING" => TargetStatus::Uploading,
            "UPLOADED" => TargetStatus::Uploaded,
            "FAILED" => TargetStatus::Failed,
            other => return Err(format!("unknown target status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputTarget {
    pub id: i64,
    pub recording_id: i64,
    pub target_type: String,
    pub status: TargetStatus,
    pub preset_id: Option<i64>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub failed_reason: Option<String>,
    pub external_video_id: Option<String>,
    pub external_url: Option<String>,
    pub result_meta: Option<serde_json::Value>,
}

impl OutputTarget {
    pub fn new(recording_id: i64, target_type: impl Into<String>, preset_id: Option<i64>) -> Self {
        Self {
            id: 0,
            recording_id,
            target_type: target_type.into(),
            status: TargetStatus::NotUploaded,
            preset_id,
            uploaded_at: None,
            failed_reason: None,
            external_video_id: None,
            external_url: None,
            result_meta: None,
        }
    }
}
