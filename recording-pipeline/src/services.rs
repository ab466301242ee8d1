//! Dependency bundle shared by executors, the orchestrator, source sync, the
//! automation scheduler, and the retention controller (§9 "Global state").
//! Grounded on the teacher's `services::ServiceContainer`, which holds one
//! `Arc<...>` field per subsystem rather than threading a dozen parameters
//! through every call; `ServiceContainer` (this crate) owns construction and
//! the start/stop lifecycle, `Services` is the plain data bag it builds.

use std::sync::Arc;

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use crate::artifact_store::ArtifactStore;
use crate::config::Settings;
use crate::credentials::TokenManager;
use crate::database::repositories::{
    AutomationJobRepository, CredentialRepository, InputSourceRepository, OutputPresetRepository,
    QuotaRepository, RecordingRepository, RefreshTokenRepository, StageTimingRepository,
    SubscriptionRepository, TemplateRepository, UserRepository,
};
use crate::providers::{
    CloudFolderLister, MeetingProvider, TopicExtractionProvider, TranscriptionProvider,
    UploadProviderRegistry, UrlListExpander,
};
use crate::queue_dispatcher::QueueDispatcher;
use crate::quota_service::QuotaService;

pub struct Services {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub artifact_store: ArtifactStore,
    pub cancellation: CancellationToken,

    pub recordings: Arc<dyn RecordingRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub input_sources: Arc<dyn InputSourceRepository>,
    pub output_presets: Arc<dyn OutputPresetRepository>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub users: Arc<dyn UserRepository>,
    pub automation_jobs: Arc<dyn AutomationJobRepository>,
    pub stage_timings: Arc<dyn StageTimingRepository>,
    #[allow(dead_code)]
    pub quota_repo: Arc<dyn QuotaRepository>,
    #[allow(dead_code)]
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,

    pub quota: Arc<QuotaService>,
    pub dispatcher: Arc<QueueDispatcher>,
    pub token_manager: Arc<TokenManager>,

    pub meeting_provider: Option<Arc<dyn MeetingProvider>>,
    pub url_list_expander: Option<Arc<dyn UrlListExpander>>,
    pub cloud_folder_lister: Option<Arc<dyn CloudFolderLister>>,
    pub transcription_provider: Arc<dyn TranscriptionProvider>,
    pub topic_provider: Arc<dyn TopicExtractionProvider>,
    pub uploaders: Arc<UploadProviderRegistry>,
}
