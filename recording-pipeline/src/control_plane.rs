//! Control-plane operations (§6) — the verb surface every caller (an HTTP
//! router, a CLI, a test) drives the core through. The routing shape itself
//! (REST, gRPC, CLI flags) is out of scope; this module only gives those
//! callers a single, language-neutral set of async functions to call,
//! already scoped and authenticated by the `user_id` each one takes.
//!
//! Thin by design: almost everything here is a short sequence of existing
//! repository/service calls. Grounded on the teacher's pattern of exposing
//! one method per operator action directly on `ServiceContainer`
//! (`handle_streamer_disabled` and friends in `services::container`);
//! kept as free functions here since this crate's `Services` is a plain
//! data bag rather than a container with its own methods.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config_resolver::ManualOverride;
use crate::database::repositories::{Pagination, RecordingFilters};
use crate::domain::{MatchingRules, Recording, RecordingTemplate};
use crate::pipeline;
use crate::quota_service::QuotaStatus;
use crate::queue_dispatcher::TaskStatus;
use crate::services::Services;
use crate::source_sync::{self, BatchSyncResult, SourceSyncResult};
use crate::status_aggregator::should_allow_run;
use crate::{automation, Error, Result};

pub async fn recordings_list(
    services: &Services,
    user_id: i64,
    filters: &RecordingFilters,
    pagination: Pagination,
) -> Result<Vec<Recording>> {
    services.recordings.list_by_user(user_id, filters, pagination).await
}

pub async fn recordings_get(services: &Services, user_id: i64, id: i64) -> Result<Recording> {
    services.recordings.get_by_id(id, user_id).await
}

/// §4.14: admission is checked before a new pipeline is submitted, and the
/// `recordings_count` accounting increments only once the pipeline has
/// actually been admitted (a no-op chain, e.g. a blank or already-terminal
/// recording, still counts — `quota.check_admission` gates *submission*,
/// not eventual work done).
pub async fn recordings_run(
    services: Arc<Services>,
    user_id: i64,
    id: i64,
    manual_override: Option<ManualOverride>,
) -> Result<Uuid> {
    services.quota.check_admission(user_id).await?;
    let chain_id = pipeline::launch_chain(services.clone(), id, user_id, manual_override).await?;
    services.quota.record_admission(user_id).await?;
    Ok(chain_id)
}

pub async fn recordings_pause(services: &Services, user_id: i64, id: i64) -> Result<()> {
    services.recordings.get_by_id(id, user_id).await?;
    services.recordings.set_on_pause(id, true).await
}

pub async fn recordings_resume(services: &Services, user_id: i64, id: i64) -> Result<()> {
    services.recordings.get_by_id(id, user_id).await?;
    services.recordings.set_on_pause(id, false).await
}

/// `preserve = true` clears only the failure fields so the next
/// `recordings.run` resumes from the last persisted stage state; `preserve =
/// false` also removes any media already written, so the next run starts
/// over from `download`.
pub async fn recordings_reset(services: &Services, user_id: i64, id: i64, preserve: bool) -> Result<()> {
    let recording = services.recordings.get_by_id(id, user_id).await?;
    services.recordings.clear_failed(id).await?;
    if !preserve {
        let user = services.users.get_by_id(user_id).await?;
        let freed = services.artifact_store.remove_media_files(user.slug, recording.id).await?;
        services.recordings.set_local_video_path(id, None).await?;
        services.recordings.set_processed_paths(id, None, None).await?;
        if freed > 0 {
            services.quota.release_storage(user_id, freed).await?;
        }
    }
    services.recordings.recompute_status(id).await?;
    Ok(())
}

/// Rebuilds the chain from `stage` onward. The orchestrator's executors are
/// each idempotent against already-completed stage state (§4.8), so this is
/// the same resumable run as `recordings.run` once the failure that blocked
/// `stage` has been cleared — there is no separate "start partway through"
/// code path to maintain.
pub async fn recordings_retry_stage(
    services: Arc<Services>,
    user_id: i64,
    id: i64,
    _stage: &str,
) -> Result<Uuid> {
    services.recordings.clear_failed(id).await?;
    services.recordings.recompute_status(id).await?;
    pipeline::launch_chain(services, id, user_id, None).await
}

pub async fn recordings_delete(services: &Services, user_id: i64, id: i64, reason: &str) -> Result<Recording> {
    services.recordings.get_by_id(id, user_id).await?;
    services
        .recordings
        .soft_delete(
            id,
            reason,
            services.settings.retention.soft_delete_days,
            services.settings.retention.hard_delete_days,
        )
        .await
}

pub async fn recordings_restore(services: &Services, user_id: i64, id: i64) -> Result<Recording> {
    services.recordings.get_by_id(id, user_id).await?;
    services
        .recordings
        .restore(id, services.settings.retention.auto_expire_days)
        .await
}

pub async fn sources_sync_one(
    services: &Services,
    user_id: i64,
    source_id: i64,
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
) -> Result<SourceSyncResult> {
    source_sync::sync_one(services, source_id, user_id, from_date, to_date).await
}

pub async fn sources_sync_all(services: &Services, user_id: i64, lookback_days: i64) -> Result<BatchSyncResult> {
    source_sync::sync_user_sources(services, user_id, lookback_days).await
}

/// `templates.from_recording` (§6). Seeds `processing_config`/
/// `metadata_config`/`output_config` from the recording's own effective
/// config so the new template starts as "what this recording already did",
/// which the operator then edits. Exactly one of `match_pattern`/
/// `match_source_id` becomes the template's sole matching rule; a caller
/// supplying neither gets a template that, per the matcher's first-match
/// semantics (§4.4), never matches anything until edited.
pub async fn templates_from_recording(
    services: &Services,
    user_id: i64,
    recording_id: i64,
    name: &str,
    match_pattern: Option<&str>,
    match_source_id: Option<&str>,
) -> Result<RecordingTemplate> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;

    let mut rules = MatchingRules::default();
    if let Some(pattern) = match_pattern {
        rules.include_patterns.push(pattern.to_string());
    }
    if let Some(source_id) = match_source_id {
        rules.source_ids.push(source_id.to_string());
    }

    let effective = crate::executors::resolve_effective_config(services, &recording, None, true).await?;

    services
        .templates
        .create(
            user_id,
            name,
            rules,
            effective.processing,
            effective.metadata,
            effective.output.unwrap_or_else(|| serde_json::json!({})),
        )
        .await
}

pub async fn automation_run(services: &Arc<Services>, user_id: i64, job_id: i64) -> Result<automation::JobRunResult> {
    let job = services.automation_jobs.get_by_id(job_id, user_id).await?;
    automation::run_job(services, &job, false).await
}

pub async fn automation_dry_run(
    services: &Arc<Services>,
    user_id: i64,
    job_id: i64,
) -> Result<automation::JobRunResult> {
    let job = services.automation_jobs.get_by_id(job_id, user_id).await?;
    automation::run_job(services, &job, true).await
}

pub async fn uploads_schedule(
    services: &Services,
    user_id: i64,
    recording_id: i64,
    platform: &str,
    preset_id: Option<i64>,
) -> Result<crate::executors::StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;
    if !should_allow_run(recording.status) && !recording.blank_record {
        return Err(Error::admission(format!(
            "recording {recording_id} is not eligible for an upload in status {}",
            recording.status
        )));
    }
    crate::executors::upload::execute(services, recording_id, user_id, platform, preset_id, None).await
}

pub async fn quota_status(services: &Services, user_id: i64) -> Result<QuotaStatus> {
    services.quota.status(user_id).await
}

pub fn tasks_status(services: &Services, task_id: Uuid, user_id: i64) -> Result<TaskStatus> {
    services.dispatcher.status(task_id, user_id)
}

pub fn tasks_cancel(services: &Services, task_id: Uuid, user_id: i64) -> Result<()> {
    services.dispatcher.cancel(task_id, user_id)
}
