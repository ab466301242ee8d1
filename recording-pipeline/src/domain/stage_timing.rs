//! `StageTiming` — append-only analytics row (§3, §4's "Timing recorder").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::StageType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTiming {
    pub id: i64,
    pub recording_id: i64,
    pub stage_type: StageType,
    /// E.g. "primary_model", "secondary_model" for topic-extraction fallback.
    pub substep: Option<String>,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub error: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl StageTiming {
    pub fn start(recording_id: i64, stage_type: StageType, attempt: u32) -> Self {
        Self {
            id: 0,
            recording_id,
            stage_type,
            substep: None,
            attempt,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            status: "started".to_string(),
            error: None,
            meta: None,
        }
    }
}
