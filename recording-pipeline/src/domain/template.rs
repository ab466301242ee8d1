//! `RecordingTemplate` — matching rules plus the three config layers it
//! contributes to the resolver (§3, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a template matched, surfaced for diagnostics (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Exact,
    Keyword,
    Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MatchingRules {
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub exact_matches: Vec<String>,
    #[serde(default)]
    pub include_keywords: Vec<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingTemplate {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub matching_rules: MatchingRules,
    pub processing_config: serde_json::Value,
    pub metadata_config: serde_json::Value,
    pub output_config: serde_json::Value,
    pub is_draft: bool,
    pub is_active: bool,
    pub used_count: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
