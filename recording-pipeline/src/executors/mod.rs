//! Step executors (§4.9). General contract: every executor is invoked with
//! `(recording_id, user_id, manual_override?)`, resolves effective config via
//! `config_resolver`, verifies admission through the `status_aggregator`
//! helpers, does its work against artifacts from `artifact_store`, persists
//! stage/recording state through `RecordingRepository` (the sole mutator),
//! and returns a small result dict. Grounded on the teacher's
//! `pipeline/processors/*` one-processor-per-concern layout, adapted away
//! from the `Processor` trait hierarchy per the "eliminating dynamic-dispatch
//! class hierarchies" design note: executors here are free functions keyed
//! by `(recording_id, user_id, manual_override?)` rather than trait objects.

pub mod download;
pub mod extract_topics;
pub mod generate_subtitles;
pub mod transcribe;
pub mod trim;
pub mod upload;

use serde::Serialize;

use crate::config_resolver::{ConfigResolver, EffectiveConfig, ManualOverride};
use crate::domain::processing_stage::{StageStatus, StageType};
use crate::domain::{Recording, RecordingStatus};
use crate::failure_handler::FailureOutcome;
use crate::services::Services;
use crate::{Error, Result};

/// Minimal result shape every executor returns (§6 "Exit codes / return
/// semantics"). `task_id`/`ok` at the dispatcher level wrap this further;
/// executors themselves only know about the recording.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub ok: bool,
    pub status: RecordingStatus,
    pub recording_id: i64,
    pub user_id: i64,
}

/// Resolve the effective config for one executor invocation (§4.3), loading
/// the recording's bound template and, if present, the manual override's
/// runtime template.
pub(crate) async fn resolve_effective_config(
    services: &Services,
    recording: &Recording,
    manual_override: Option<&ManualOverride>,
    include_output_config: bool,
) -> Result<EffectiveConfig> {
    let user = services.users.get_by_id(recording.user_id).await?;

    let template = match recording.template_id {
        Some(id) => Some(services.templates.get_by_id(id, recording.user_id).await?),
        None => None,
    };

    let runtime_template = match manual_override.and_then(|m| m.runtime_template_id) {
        Some(id) => Some(services.templates.get_by_id(id, recording.user_id).await?),
        None => None,
    };

    Ok(ConfigResolver::resolve(
        &user.config,
        template.as_ref(),
        runtime_template.as_ref(),
        recording,
        manual_override,
        include_output_config,
    ))
}

/// Apply a `RollbackAndFail` or `CascadeSkip` outcome from the failure
/// handler (§4.6): mutate stage(s), mark the recording failed, and
/// recompute the aggregate in one pass. `UploadFailed` is handled directly
/// by the upload executor, which already holds the target id this helper
/// does not have.
pub(crate) async fn apply_failure_outcome(
    services: &Services,
    recording_id: i64,
    outcome: FailureOutcome,
    reason: &str,
) -> Result<()> {
    match outcome {
        FailureOutcome::RollbackAndFail {
            rollback_status,
            failed_at_stage,
            stage,
        } => {
            if let Some(stage_type) = stage {
                let mut s = services
                    .recordings
                    .get_or_create_stage(recording_id, stage_type)
                    .await?;
                s.status = StageStatus::Failed;
                s.failed = true;
                s.failed_reason = Some(reason.to_string());
                services.recordings.upsert_stage(&s).await?;
            }
            services
                .recordings
                .set_status(recording_id, rollback_status)
                .await?;
            services
                .recordings
                .set_failed(recording_id, Some(failed_at_stage), Some(reason))
                .await?;
            services.recordings.recompute_status(recording_id).await?;
        }
        FailureOutcome::CascadeSkip {
            stage,
            dependents,
            failed_at_stage,
        } => {
            mark_stage_skipped(services, recording_id, stage, "error").await?;
            for dep in dependents {
                mark_stage_skipped(services, recording_id, dep, "parent_failed").await?;
            }
            services
                .recordings
                .set_failed(recording_id, Some(failed_at_stage), Some(reason))
                .await?;
            services.recordings.recompute_status(recording_id).await?;
        }
        FailureOutcome::UploadFailed { .. } => {}
    }
    Ok(())
}

async fn mark_stage_skipped(
    services: &Services,
    recording_id: i64,
    stage_type: StageType,
    skip_reason: &str,
) -> Result<()> {
    let mut s = services
        .recordings
        .get_or_create_stage(recording_id, stage_type)
        .await?;
    s.status = StageStatus::Skipped;
    s.skip_reason = Some(skip_reason.to_string());
    services.recordings.upsert_stage(&s).await?;
    Ok(())
}

/// Begin a stage: fetch-or-create it, flip it to IN_PROGRESS, persist, and
/// recompute the aggregate so concurrent readers see PROCESSING immediately
/// (§4.8 "steps set stage IN_PROGRESS immediately before expensive work").
/// Handles the retry edge case: bumps `retry_count` via `prepare_retry` when
/// the stage is currently FAILED and under its retry budget, otherwise just
/// flips a PENDING stage to IN_PROGRESS.
pub(crate) async fn begin_stage(
    services: &Services,
    recording_id: i64,
    stage_type: StageType,
) -> Result<()> {
    let mut stage = services
        .recordings
        .get_or_create_stage(recording_id, stage_type)
        .await?;
    if stage.can_retry() {
        stage
            .prepare_retry()
            .map_err(|e| Error::Pipeline(format!("stage {stage_type} retry rejected: {e}")))?;
    } else {
        stage.status = StageStatus::InProgress;
        stage.failed = false;
        stage.failed_reason = None;
    }
    services.recordings.upsert_stage(&stage).await?;
    services.recordings.recompute_status(recording_id).await?;
    Ok(())
}

/// Complete a stage successfully, optionally attaching `stage_meta`.
pub(crate) async fn complete_stage(
    services: &Services,
    recording_id: i64,
    stage_type: StageType,
    stage_meta: Option<serde_json::Value>,
) -> Result<()> {
    let mut stage = services
        .recordings
        .get_or_create_stage(recording_id, stage_type)
        .await?;
    stage.status = StageStatus::Completed;
    stage.failed = false;
    stage.failed_reason = None;
    stage.completed_at = Some(chrono::Utc::now());
    stage.stage_meta = stage_meta;
    services.recordings.upsert_stage(&stage).await?;
    services.recordings.recompute_status(recording_id).await?;
    Ok(())
}

/// Variant of `begin_stage` for the two members of the post-transcribe
/// parallel group (extract_topics, generate_subtitles, §4.8). Neither member
/// recomputes the aggregate on its own — only the join step that waits on
/// both does, once, so a reader never observes a status flip based on half
/// of the pair finishing.
pub(crate) async fn begin_stage_no_recompute(
    services: &Services,
    recording_id: i64,
    stage_type: StageType,
) -> Result<()> {
    let mut stage = services
        .recordings
        .get_or_create_stage(recording_id, stage_type)
        .await?;
    if stage.can_retry() {
        stage
            .prepare_retry()
            .map_err(|e| Error::Pipeline(format!("stage {stage_type} retry rejected: {e}")))?;
    } else {
        stage.status = StageStatus::InProgress;
        stage.failed = false;
        stage.failed_reason = None;
    }
    services.recordings.upsert_stage(&stage).await?;
    Ok(())
}

/// Join-free counterpart to `complete_stage` — see `begin_stage_no_recompute`.
pub(crate) async fn complete_stage_no_recompute(
    services: &Services,
    recording_id: i64,
    stage_type: StageType,
    stage_meta: Option<serde_json::Value>,
) -> Result<()> {
    let mut stage = services
        .recordings
        .get_or_create_stage(recording_id, stage_type)
        .await?;
    stage.status = StageStatus::Completed;
    stage.failed = false;
    stage.failed_reason = None;
    stage.completed_at = Some(chrono::Utc::now());
    stage.stage_meta = stage_meta;
    services.recordings.upsert_stage(&stage).await?;
    Ok(())
}

/// Join-free counterpart used when a parallel member's failure is handled
/// via cascade-skip rather than `apply_failure_outcome` (which always
/// recomputes): mutate the stage(s) without touching the aggregate.
pub(crate) async fn apply_failure_outcome_no_recompute(
    services: &Services,
    recording_id: i64,
    outcome: FailureOutcome,
    reason: &str,
) -> Result<()> {
    match outcome {
        FailureOutcome::RollbackAndFail {
            rollback_status,
            failed_at_stage,
            stage,
        } => {
            if let Some(stage_type) = stage {
                let mut s = services
                    .recordings
                    .get_or_create_stage(recording_id, stage_type)
                    .await?;
                s.status = StageStatus::Failed;
                s.failed = true;
                s.failed_reason = Some(reason.to_string());
                services.recordings.upsert_stage(&s).await?;
            }
            services
                .recordings
                .set_status(recording_id, rollback_status)
                .await?;
            services
                .recordings
                .set_failed(recording_id, Some(failed_at_stage), Some(reason))
                .await?;
        }
        FailureOutcome::CascadeSkip {
            stage,
            dependents,
            failed_at_stage,
        } => {
            mark_stage_skipped(services, recording_id, stage, "error").await?;
            for dep in dependents {
                mark_stage_skipped(services, recording_id, dep, "parent_failed").await?;
            }
            services
                .recordings
                .set_failed(recording_id, Some(failed_at_stage), Some(reason))
                .await?;
        }
        FailureOutcome::UploadFailed { .. } => {}
    }
    Ok(())
}
