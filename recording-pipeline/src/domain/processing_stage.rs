//! `ProcessingStage` — one step's persisted state (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageType {
    Trim,
    Transcribe,
    ExtractTopics,
    GenerateSubtitles,
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageType::Trim => "TRIM",
            StageType::Transcribe => "TRANSCRIBE",
            StageType::ExtractTopics => "EXTRACT_TOPICS",
            StageType::GenerateSubtitles => "GENERATE_SUBTITLES",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TRIM" => StageType::Trim,
            "TRANSCRIBE" => StageType::Transcribe,
            "EXTRACT_TOPICS" => StageType::ExtractTopics,
            "GENERATE_SUBTITLES" => StageType::GenerateSubtitles,
            other => return Err(format!("unknown stage type: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StageStatus::Pending => "PENDING",
            StageStatus::InProgress => "IN_PROGRESS",
            StageStatus::Completed => "COMPLETED",
            StageStatus::Failed => "FAILED",
            StageStatus::Skipped => "SKIPPED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => StageStatus::Pending,
            "IN_PROGRESS" => StageStatus::InProgress,
            "COMPLETED" => StageStatus::Completed,
            "FAILED" => StageStatus::Failed,
            "SKIPPED" => StageStatus::Skipped,
            other => return Err(format!("unknown stage status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStage {
    pub id: i64,
    pub recording_id: i64,
    pub stage_type: StageType,
    pub status: StageStatus,
    pub failed: bool,
    pub failed_reason: Option<String>,
    /// Set when a stage is SKIPPED: "error" (allow_errors short-circuit) or
    /// "parent_failed" (cascade skip, §4.6 / §8 property 7).
    pub skip_reason: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub completed_at: Option<DateTime<Utc>>,
    pub stage_meta: Option<serde_json::Value>,
}

impl ProcessingStage {
    pub fn new(recording_id: i64, stage_type: StageType) -> Self {
        Self {
            id: 0,
            recording_id,
            stage_type,
            status: StageStatus::Pending,
            failed: false,
            failed_reason: None,
            skip_reason: None,
            retry_count: 0,
            max_retries: 3,
            completed_at: None,
            stage_meta: None,
        }
    }

    /// Invariant 5 in §3: FAILED -> IN_PROGRESS only via `prepare_retry`,
    /// only while under the retry budget.
    pub fn can_retry(&self) -> bool {
        self.status == StageStatus::Failed && self.retry_count < self.max_retries
    }

    pub fn prepare_retry(&mut self) -> Result<(), String> {
        if !self.can_retry() {
            return Err(format!(
                "stage {} cannot be retried (status={}, retry_count={}, max_retries={})",
                self.stage_type, self.status, self.retry_count, self.max_retries
            ));
        }
        self.status = StageStatus::InProgress;
        self.retry_count += 1;
        self.failed = false;
        self.failed_reason = None;
        Ok(())
    }
}
