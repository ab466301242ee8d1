//! `AutomationJob` — cron-scheduled sync + template-match + pipeline launch (§3, §4.12).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub sync_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AutomationFilters {
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub exclude_blank: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationJob {
    pub id: i64,
    pub user_id: i64,
    pub template_ids: Vec<i64>,
    /// Cron expression, evaluated in `schedule_timezone`.
    pub schedule: String,
    pub schedule_timezone: String,
    pub sync_config: SyncConfig,
    pub filters: AutomationFilters,
    pub processing_config: Option<serde_json::Value>,
    pub is_active: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub run_count: i64,
}
