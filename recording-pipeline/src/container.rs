//! Service container — owns construction and the start/stop lifecycle of
//! every subsystem (§9 "Global state"). Grounded on the teacher's
//! `services::ServiceContainer`: one struct holding `Arc<...>` fields plus
//! the `SqlitePool` and a `CancellationToken`, a `new`/`with_providers`
//! pair for construction, `initialize()` to start background loops, and a
//! `shutdown()`/`shutdown_with_timeout()` pair that cancels the token and
//! waits for those loops to notice.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifact_store::ArtifactStore;
use crate::automation::AutomationScheduler;
use crate::config::Settings;
use crate::credentials::{TokenFetcher, TokenManager, UnconfiguredTokenFetcher};
use crate::database::repositories::{
    SqliteAutomationJobRepository, SqliteCredentialRepository, SqliteInputSourceRepository,
    SqliteOutputPresetRepository, SqliteQuotaRepository, SqliteRecordingRepository,
    SqliteRefreshTokenRepository, SqliteStageTimingRepository, SqliteSubscriptionRepository,
    SqliteTemplateRepository, SqliteUserRepository,
};
use crate::providers::{
    CloudFolderLister, MeetingProvider, TopicExtractionProvider, TranscriptionProvider,
    UnconfiguredTopicExtractionProvider, UnconfiguredTranscriptionProvider, UploadProviderRegistry,
    UrlListExpander,
};
use crate::queue_dispatcher::QueueDispatcher;
use crate::quota_service::QuotaService;
use crate::retention::RetentionController;
use crate::services::Services;
use crate::Result;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// External collaborators the embedder may wire in (§1: all out of scope
/// for this core, each one is a black box behind its trait). Every field
/// defaults to "absent" — `ServiceContainer::new` runs correctly without
/// any of them, just with that feature surface unavailable until supplied.
#[derive(Default)]
pub struct ExternalProviders {
    pub meeting_provider: Option<Arc<dyn MeetingProvider>>,
    pub url_list_expander: Option<Arc<dyn UrlListExpander>>,
    pub cloud_folder_lister: Option<Arc<dyn CloudFolderLister>>,
    pub transcription_provider: Option<Arc<dyn TranscriptionProvider>>,
    pub topic_provider: Option<Arc<dyn TopicExtractionProvider>>,
    pub uploaders: Option<Arc<UploadProviderRegistry>>,
    pub token_fetcher: Option<Arc<dyn TokenFetcher>>,
}

/// Owns every subsystem and their start/stop lifecycle. `Services` is the
/// plain bag handed to executors/orchestrator/scheduler; this struct is the
/// thing `main.rs` actually builds and holds for the life of the process.
pub struct ServiceContainer {
    pub services: Arc<Services>,
    cancellation_token: CancellationToken,
    automation_scheduler: Arc<AutomationScheduler>,
    retention_controller: Arc<RetentionController>,
    automation_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
    retention_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ServiceContainer {
    /// Build a container with no external adapters configured. Source sync
    /// against a meeting provider / URL list / cloud folder will error with
    /// `Error::Configuration` until the caller supplies them via
    /// `with_providers`; transcription/topic extraction fail the same way.
    pub async fn new(pool: SqlitePool, settings: Settings) -> Result<Self> {
        Self::with_providers(pool, settings, ExternalProviders::default()).await
    }

    pub async fn with_providers(
        pool: SqlitePool,
        settings: Settings,
        providers: ExternalProviders,
    ) -> Result<Self> {
        let cancellation_token = CancellationToken::new();
        let artifact_store = ArtifactStore::new(settings.artifacts.root.clone());

        let recordings = Arc::new(SqliteRecordingRepository::new(pool.clone()));
        let templates = Arc::new(SqliteTemplateRepository::new(pool.clone()));
        let input_sources = Arc::new(SqliteInputSourceRepository::new(pool.clone()));
        let output_presets = Arc::new(SqliteOutputPresetRepository::new(pool.clone()));
        let credentials = Arc::new(SqliteCredentialRepository::new(pool.clone()));
        let users = Arc::new(SqliteUserRepository::new(pool.clone()));
        let automation_jobs = Arc::new(SqliteAutomationJobRepository::new(pool.clone()));
        let stage_timings = Arc::new(SqliteStageTimingRepository::new(pool.clone()));
        let quota_repo = Arc::new(SqliteQuotaRepository::new(pool.clone()));
        let subscriptions = Arc::new(SqliteSubscriptionRepository::new(pool.clone()));
        let refresh_tokens = Arc::new(SqliteRefreshTokenRepository::new(pool.clone()));

        let quota = Arc::new(QuotaService::new(quota_repo.clone(), subscriptions.clone()));
        let dispatcher = Arc::new(QueueDispatcher::new(&settings.queues, cancellation_token.clone()));
        let token_fetcher = providers
            .token_fetcher
            .unwrap_or_else(|| Arc::new(UnconfiguredTokenFetcher));
        let token_manager = Arc::new(TokenManager::new(token_fetcher));

        let transcription_provider = providers
            .transcription_provider
            .unwrap_or_else(|| Arc::new(UnconfiguredTranscriptionProvider));
        let topic_provider = providers
            .topic_provider
            .unwrap_or_else(|| Arc::new(UnconfiguredTopicExtractionProvider));
        let uploaders = providers.uploaders.unwrap_or_default();

        let services = Arc::new(Services {
            pool: pool.clone(),
            settings: settings.clone(),
            artifact_store,
            cancellation: cancellation_token.clone(),
            recordings,
            templates,
            input_sources,
            output_presets,
            credentials,
            users,
            automation_jobs,
            stage_timings,
            quota_repo,
            subscriptions,
            refresh_tokens,
            quota,
            dispatcher,
            token_manager,
            meeting_provider: providers.meeting_provider,
            url_list_expander: providers.url_list_expander,
            cloud_folder_lister: providers.cloud_folder_lister,
            transcription_provider,
            topic_provider,
            uploaders,
        });

        let automation_scheduler = Arc::new(AutomationScheduler::new(services.clone(), settings.automation.clone()));
        let retention_controller = Arc::new(RetentionController::new(services.clone(), settings.retention.clone()));

        Ok(Self {
            services,
            cancellation_token,
            automation_scheduler,
            retention_controller,
            automation_handle: std::sync::Mutex::new(None),
            retention_handle: std::sync::Mutex::new(None),
        })
    }

    /// Starts the automation scheduler and retention controller background
    /// loops. Idempotent: calling twice replaces the previous handles
    /// without spawning a second pair of loops for an already-running
    /// container, since `start()` itself is cheap and the old task simply
    /// exits once its `running` flag is flipped by the next `shutdown`.
    pub async fn initialize(&self) -> Result<()> {
        info!("starting automation scheduler and retention controller");
        *self.automation_handle.lock().unwrap() = Some(self.automation_scheduler.clone().start());
        *self.retention_handle.lock().unwrap() = Some(self.retention_controller.clone().start());
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await
    }

    pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<()> {
        info!("shutting down service container");
        self.cancellation_token.cancel();
        self.automation_scheduler.stop();
        self.retention_controller.stop();

        let handles: Vec<JoinHandle<()>> = [
            self.automation_handle.lock().unwrap().take(),
            self.retention_handle.lock().unwrap().take(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let wait = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(timeout, wait).await.is_err() {
            warn!("shutdown timeout reached, background loops did not stop in time");
        }

        self.services.pool.close().await;
        Ok(())
    }
}
