//! External collaborator traits (§1). The core never talks to a meeting
//! provider, a transcription API, a topic model, or a platform upload SDK
//! directly — it calls one of these traits and lets an adapter crate (out of
//! scope here, per §1) own the wire format. Grounded on the teacher's
//! `downloader::engine::DownloadEngine` trait shape: a small async trait per
//! collaborator, `Send + Sync`, taking owned/borrowed request data and
//! returning a `Result<T>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// One item enumerated by a source during sync (§4.10). `source_id` is the
/// provider-native identifier used as part of the `create_or_update` upsert
/// key.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub source_id: String,
    pub display_name: String,
    pub start_time: DateTime<Utc>,
    pub reported_duration_seconds: Option<f64>,
    pub reported_size_bytes: Option<i64>,
    pub download_url: Option<String>,
    pub passcode: Option<String>,
    pub still_processing_upstream: bool,
    pub extra: Option<serde_json::Value>,
}

/// One per-email (or per-sub-account) enumeration failure, tolerated by the
/// supplemented partial-failure handling in §4.10 step 2.
#[derive(Debug, Clone)]
pub struct SourceEnumerationError {
    pub scope: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceEnumerationResult {
    pub entries: Vec<SourceEntry>,
    pub errors: Vec<SourceEnumerationError>,
}

/// Meeting-provider OAuth + recording-list/detail API (§6 external protocols).
/// A "master account" credential may enumerate recordings across several
/// per-user emails; `list_emails` returns that set (empty for a single-user
/// credential, in which case the caller enumerates once with `email=None`).
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    async fn list_emails(&self, credential_id: i64) -> Result<Vec<String>>;
    async fn list_recordings(
        &self,
        credential_id: i64,
        email: Option<&str>,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
    ) -> Result<Vec<SourceEntry>>;
}

/// URL-list source: expands single URLs or playlist URLs into entries.
#[async_trait]
pub trait UrlListExpander: Send + Sync {
    async fn expand(&self, config: &serde_json::Value) -> Result<Vec<SourceEntry>>;
}

/// Cloud-folder source: lists files matching a pattern, optionally recursively.
#[async_trait]
pub trait CloudFolderLister: Send + Sync {
    async fn list(&self, credential_id: Option<i64>, config: &serde_json::Value) -> Result<Vec<SourceEntry>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub language: String,
    pub model: String,
    pub duration_seconds: f64,
    pub words: Vec<TranscriptWord>,
    pub segments: Vec<TranscriptSegment>,
    pub usage: Option<serde_json::Value>,
}

/// Transcription HTTP provider (§4.9.3, §6).
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
        prompt: &str,
        temperature: f64,
    ) -> Result<TranscriptionResult>;
}

#[derive(Debug, Clone)]
pub struct ExtractedTopic {
    pub topic: String,
    pub timestamp_seconds: f64,
}

/// Topic-extraction HTTP provider (§4.9.4). `model` distinguishes the primary
/// from the secondary model in the two-tier fallback the executor drives.
#[async_trait]
pub trait TopicExtractionProvider: Send + Sync {
    async fn extract_topics(
        &self,
        segments_text: &str,
        granularity: &str,
        model: &str,
    ) -> Result<Vec<ExtractedTopic>>;
}

#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    pub media_path: &'a Path,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub privacy: Option<String>,
    pub playlist_or_album_id: Option<String>,
    pub thumbnail_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub external_video_id: String,
    pub external_url: String,
    /// Platform-specific extras, e.g. whether a playlist/album add succeeded.
    pub result_meta: serde_json::Value,
}

/// Per-platform upload SDK client (§4.9.6, §6). One implementation per
/// `target_type`; the executor resolves which one to call by platform name.
#[async_trait]
pub trait UploadProvider: Send + Sync {
    async fn upload(&self, credential_id: i64, request: UploadRequest<'_>) -> Result<UploadResult>;
}

/// Registry of per-platform upload providers, keyed by platform name. A thin
/// lookup layer so the upload executor does not need a giant match statement
/// wired directly to concrete provider types.
pub struct UploadProviderRegistry {
    providers: std::collections::HashMap<String, std::sync::Arc<dyn UploadProvider>>,
}

impl UploadProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: std::collections::HashMap::new(),
        }
    }

    pub fn register(&mut self, platform: impl Into<String>, provider: std::sync::Arc<dyn UploadProvider>) {
        self.providers.insert(platform.into(), provider);
    }

    pub fn get(&self, platform: &str) -> Option<std::sync::Arc<dyn UploadProvider>> {
        self.providers.get(platform).cloned()
    }
}

impl Default for UploadProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in used when `ServiceContainer` is built without a real transcription
/// adapter wired in. `transcription_provider`/`topic_provider` are required
/// fields on `Services` (every other collaborator is optional because a
/// recording simply may not use it), so a container with no adapter crate
/// configured still needs something in the slot — this one fails loudly and
/// immediately instead of the field being unpopulatable.
pub struct UnconfiguredTranscriptionProvider;

#[async_trait]
impl TranscriptionProvider for UnconfiguredTranscriptionProvider {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language: &str,
        _prompt: &str,
        _temperature: f64,
    ) -> Result<TranscriptionResult> {
        Err(crate::Error::Configuration(
            "no transcription provider configured".to_string(),
        ))
    }
}

pub struct UnconfiguredTopicExtractionProvider;

#[async_trait]
impl TopicExtractionProvider for UnconfiguredTopicExtractionProvider {
    async fn extract_topics(
        &self,
        _segments_text: &str,
        _granularity: &str,
        _model: &str,
    ) -> Result<Vec<ExtractedTopic>> {
        Err(crate::Error::Configuration(
            "no topic extraction provider configured".to_string(),
        ))
    }
}
