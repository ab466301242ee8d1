//! `OutputPreset` — per-user, per-platform output configuration (§3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPreset {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub credential_id: i64,
    /// Title/description templates, tags, privacy, playlist/album id,
    /// thumbnail name, and any other platform-shaped metadata.
    pub metadata: serde_json::Value,
}
