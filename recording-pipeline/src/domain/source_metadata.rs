//! `SourceMetadata` — 1:1 with a `Recording`; the provider-native payload
//! needed to fetch the source media (§3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceMetadata {
    pub recording_id: i64,
    pub source_id: Option<String>,
    pub download_url: Option<String>,
    pub passcode: Option<String>,
    pub reported_duration_seconds: Option<f64>,
    pub reported_size_bytes: Option<i64>,
    pub download_token: Option<String>,
    pub download_token_fetched_at: Option<chrono::DateTime<chrono::Utc>>,
    pub still_processing_upstream: bool,
    pub extra: Option<serde_json::Value>,
}
