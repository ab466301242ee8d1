//! Download executor (§4.9.1).

use std::path::Path;

use chrono::{Duration, Utc};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::config_resolver::ManualOverride;
use crate::domain::RecordingStatus;
use crate::failure_handler::on_download_failure;
use crate::services::Services;
use crate::status_aggregator::should_allow_download;
use crate::{Error, Result};

use super::{apply_failure_outcome, resolve_effective_config, StepOutcome};

/// A download token is refreshed opportunistically once it is older than
/// this, or missing (§4.11).
const DOWNLOAD_TOKEN_MAX_AGE: Duration = Duration::minutes(30);

pub async fn execute(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
) -> Result<StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;
    let effective = resolve_effective_config(services, &recording, manual_override, false).await?;
    let force = effective.processing["download"]["force"]
        .as_bool()
        .unwrap_or(false);

    if !force && !should_allow_download(recording.status) {
        return Err(Error::admission(format!(
            "recording {recording_id} is not eligible for download (status={})",
            recording.status
        )));
    }

    let user = services.users.get_by_id(user_id).await?;
    let store = &services.artifact_store;
    let canonical_path = store.recording_video(user.slug, recording_id);

    if !force && recording.status == RecordingStatus::Downloaded && canonical_path.exists() {
        info!(recording_id, "download already satisfied, skipping");
        return Ok(StepOutcome {
            ok: true,
            status: recording.status,
            recording_id,
            user_id,
        });
    }

    let source = recording.source_metadata.as_ref().ok_or_else(|| {
        Error::validation(format!("recording {recording_id} has no source metadata"))
    })?;
    let download_url = source.download_url.as_deref().ok_or_else(|| {
        Error::validation(format!(
            "recording {recording_id} source has no download url"
        ))
    })?;

    let run = async {
        let token = resolve_download_token(services, recording_id, user_id, source).await?;
        services
            .recordings
            .set_status(recording_id, RecordingStatus::Downloading)
            .await?;
        services.recordings.recompute_status(recording_id).await?;
        store.ensure_dirs(user.slug, recording_id).await?;

        download_to_path(download_url, &token, &canonical_path).await?;

        // §4.14 accounting: increment storage usage at successful artifact
        // write. Best-effort against the file's on-disk size; a failure here
        // must not fail the download itself.
        match tokio::fs::metadata(&canonical_path).await {
            Ok(meta) => {
                if let Err(e) = services.quota.record_storage_delta(user_id, meta.len() as i64).await {
                    tracing::warn!(recording_id, error = %e, "failed to record storage accounting for download");
                }
            }
            Err(e) => {
                tracing::warn!(recording_id, error = %e, "failed to stat downloaded file for storage accounting");
            }
        }

        services
            .recordings
            .set_local_video_path(
                recording_id,
                Some(canonical_path.to_string_lossy().as_ref()),
            )
            .await?;
        services
            .recordings
            .set_status(recording_id, RecordingStatus::Downloaded)
            .await?;
        services.recordings.recompute_status(recording_id).await
    }
    .await;

    match run {
        Ok(status) => Ok(StepOutcome {
            ok: true,
            status,
            recording_id,
            user_id,
        }),
        Err(e) => {
            let outcome = on_download_failure(recording.is_mapped);
            apply_failure_outcome(services, recording_id, outcome, &e.to_string()).await?;
            Err(e)
        }
    }
}

/// Refresh the source's download token if stale or missing, serialising the
/// refresh through the per-account token manager (§4.11).
async fn resolve_download_token(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    source: &crate::domain::SourceMetadata,
) -> Result<String> {
    let stale = source.download_token.is_none()
        || source
            .download_token_fetched_at
            .map(|at| Utc::now() - at > DOWNLOAD_TOKEN_MAX_AGE)
            .unwrap_or(true);

    if !stale {
        return Ok(source.download_token.clone().unwrap_or_default());
    }

    let account_key = format!(
        "{user_id}:{}",
        source.source_id.as_deref().unwrap_or("default")
    );
    let token = services.token_manager.get_token(&account_key).await?;
    services
        .recordings
        .set_source_download_token(recording_id, Some(&token), Some(Utc::now()))
        .await?;
    Ok(token)
}

async fn download_to_path(url: &str, token: &str, dest: &Path) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| Error::Transient(format!("download request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Transient(format!(
            "download failed with status {}",
            response.status()
        )));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::Transient(format!("download stream failed: {e}")))?
    {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
