//! Retention controller (§4.13) — three cooperating periodic passes plus
//! expired-refresh-token GC, all tenant-agnostic and each recording processed
//! in its own repository call. Grounded on the teacher's
//! `database::maintenance::MaintenanceScheduler` (`Arc<Self>::start` spawning
//! an interval-driven loop gated by an `AtomicBool`, `stop()` flipping it),
//! adapted from the teacher's single vacuum pass to three ordered passes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::RetentionConfig;
use crate::services::Services;

/// Per-pass counts, surfaced for logging/diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionSweepResult {
    pub auto_expired: usize,
    pub files_cleaned: usize,
    pub bytes_freed: u64,
    pub hard_deleted: usize,
    pub refresh_tokens_purged: u64,
}

/// Background controller running the three ordered retention passes
/// (auto-expire, file cleanup, hard delete) plus refresh-token GC on a fixed
/// cadence. Each recording is swept and mutated independently — one
/// recording's failure does not abort the rest of the pass.
pub struct RetentionController {
    services: Arc<Services>,
    config: RetentionConfig,
    running: Arc<AtomicBool>,
}

impl RetentionController {
    pub fn new(services: Arc<Services>, config: RetentionConfig) -> Self {
        Self {
            services,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts the sweep loop on a background task, stopped either by
    /// `stop()` or by the shared cancellation token firing.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            controller.running.store(true, Ordering::SeqCst);
            controller.run_loop().await;
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_loop(&self) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.tick().await; // first tick fires immediately; skip it so startup doesn't race migrations

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.services.cancellation.cancelled() => break,
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let result = self.run_once().await;
            info!(
                auto_expired = result.auto_expired,
                files_cleaned = result.files_cleaned,
                bytes_freed = result.bytes_freed,
                hard_deleted = result.hard_deleted,
                refresh_tokens_purged = result.refresh_tokens_purged,
                "retention sweep complete"
            );
        }
    }

    /// Runs the three passes once, in order, plus the token GC. Exposed
    /// directly (not just via the loop) so operators/tests can trigger one
    /// sweep synchronously.
    pub async fn run_once(&self) -> RetentionSweepResult {
        let now = Utc::now();
        let mut result = RetentionSweepResult::default();

        result.auto_expired = self.run_auto_expire(now).await;
        result.files_cleaned = self.run_file_cleanup(now, &mut result.bytes_freed).await;
        result.hard_deleted = self.run_hard_delete(now).await;
        result.refresh_tokens_purged = self.run_refresh_token_gc(now).await;

        result
    }

    /// Pass 1: `deleted = false AND expire_at <= now` → `auto_expire`.
    async fn run_auto_expire(&self, now: chrono::DateTime<Utc>) -> usize {
        let candidates = match self.services.recordings.list_auto_expire_candidates(now).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to list auto-expire candidates");
                return 0;
            }
        };

        let mut count = 0;
        for recording in candidates {
            match self
                .services
                .recordings
                .auto_expire(
                    recording.id,
                    self.config.soft_delete_days,
                    self.config.hard_delete_days,
                )
                .await
            {
                Ok(_) => count += 1,
                Err(e) => warn!(recording_id = recording.id, error = %e, "auto_expire failed, continuing sweep"),
            }
        }
        count
    }

    /// Pass 2: `delete_state = soft AND soft_deleted_at <= now` → remove
    /// large media, keep transcription artifacts. `cleanup_recording_files`
    /// re-checks `delete_state` itself (race protection, §4.2/§4.13) so a
    /// concurrent `restore` between the scan and this call is handled there.
    async fn run_file_cleanup(&self, now: chrono::DateTime<Utc>, bytes_freed: &mut u64) -> usize {
        let candidates = match self.services.recordings.list_soft_cleanup_candidates(now).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to list file-cleanup candidates");
                return 0;
            }
        };

        let mut count = 0;
        for recording in candidates {
            let user = match self.services.users.get_by_id(recording.user_id).await {
                Ok(u) => u,
                Err(e) => {
                    warn!(recording_id = recording.id, error = %e, "failed to load owning user, skipping cleanup");
                    continue;
                }
            };
            match self
                .services
                .recordings
                .cleanup_recording_files(recording.id, &self.services.artifact_store, user.slug)
                .await
            {
                Ok(freed) => {
                    *bytes_freed += freed;
                    if let Err(e) = self.services.quota.release_storage(recording.user_id, freed).await {
                        warn!(recording_id = recording.id, error = %e, "failed to release storage quota accounting");
                    }
                    count += 1;
                }
                Err(e) => warn!(recording_id = recording.id, error = %e, "cleanup_recording_files failed, continuing sweep"),
            }
        }
        count
    }

    /// Pass 3: `hard_delete_at <= now` → remove transcription directory + row.
    async fn run_hard_delete(&self, now: chrono::DateTime<Utc>) -> usize {
        let candidates = match self.services.recordings.list_hard_delete_candidates(now).await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "failed to list hard-delete candidates");
                return 0;
            }
        };

        let mut count = 0;
        for recording in candidates {
            let user = match self.services.users.get_by_id(recording.user_id).await {
                Ok(u) => u,
                Err(e) => {
                    warn!(recording_id = recording.id, error = %e, "failed to load owning user, skipping hard delete");
                    continue;
                }
            };
            match self
                .services
                .recordings
                .delete(recording.id, &self.services.artifact_store, user.slug)
                .await
            {
                Ok(()) => count += 1,
                Err(e) => warn!(recording_id = recording.id, error = %e, "delete failed, continuing sweep"),
            }
        }
        count
    }

    /// Unrelated to recordings, scheduled alongside the retention sweep per
    /// §4.13's closing note.
    async fn run_refresh_token_gc(&self, now: chrono::DateTime<Utc>) -> u64 {
        match self.services.refresh_tokens.delete_expired(now).await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "refresh-token GC failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_result_defaults_to_zero() {
        let result = RetentionSweepResult::default();
        assert_eq!(result.auto_expired, 0);
        assert_eq!(result.hard_deleted, 0);
    }

    #[test]
    fn sweep_interval_is_configurable() {
        let config = RetentionConfig {
            soft_delete_days: 3,
            hard_delete_days: 30,
            sweep_interval: Duration::from_secs(42),
        };
        assert_eq!(config.sweep_interval, Duration::from_secs(42));
    }
}
