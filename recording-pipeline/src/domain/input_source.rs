//! `InputSource` — a per-user configured producer of recordings (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSourceKind {
    MeetingProvider,
    UrlList,
    CloudFolder,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSource {
    pub id: i64,
    pub user_id: i64,
    pub kind: InputSourceKind,
    pub credential_id: Option<i64>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}
