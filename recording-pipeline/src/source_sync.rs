//! Source sync (§4.10) — enumerates a configured input source, computes
//! blank-record and template-match status for each entry, and upserts a
//! `Recording` per entry. Exposed both as a single-source job and a batch
//! job over a user's active sources; both share `sync_one`, so the batch
//! path is just a fold that tolerates one source's failure without losing
//! the rest (the supplemented partial-failure tolerance also used for
//! per-email enumeration within a single meeting-provider source).

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::domain::{InputSource, InputSourceKind};
use crate::providers::{SourceEntry, SourceEnumerationError};
use crate::services::Services;
use crate::template_matcher;
use crate::{Error, Result};

const DEFAULT_BLANK_DURATION_THRESHOLD_SECS: f64 = 120.0;
const DEFAULT_BLANK_SIZE_THRESHOLD_BYTES: i64 = 5_000_000;

/// Outcome of syncing one source: how many entries were enumerated and
/// upserted, and any per-scope enumeration errors that were tolerated
/// rather than aborting the whole sync.
#[derive(Debug, Clone, Default)]
pub struct SourceSyncResult {
    pub source_id: i64,
    pub entries_seen: usize,
    pub recordings_upserted: usize,
    pub errors: Vec<SourceEnumerationError>,
}

/// Aggregate counts across a batch of sources (§4.10 "batch job").
#[derive(Debug, Clone, Default)]
pub struct BatchSyncResult {
    pub sources_synced: usize,
    pub sources_failed: usize,
    pub entries_seen: usize,
    pub recordings_upserted: usize,
}

fn blank_thresholds(user_config: &serde_json::Value) -> (f64, i64) {
    let sync = &user_config["sync"];
    let duration = sync["blank_duration_threshold_seconds"]
        .as_f64()
        .unwrap_or(DEFAULT_BLANK_DURATION_THRESHOLD_SECS);
    let size = sync["blank_size_threshold_bytes"]
        .as_i64()
        .unwrap_or(DEFAULT_BLANK_SIZE_THRESHOLD_BYTES);
    (duration, size)
}

/// Provider-reported duration or size under threshold, unless the source
/// reports the recording is still being produced on its end (§4.10 step 3).
fn is_blank(entry: &SourceEntry, duration_threshold: f64, size_threshold: i64) -> bool {
    if entry.still_processing_upstream {
        return false;
    }
    let short = entry
        .reported_duration_seconds
        .map(|d| d < duration_threshold)
        .unwrap_or(false);
    let small = entry
        .reported_size_bytes
        .map(|s| s < size_threshold)
        .unwrap_or(false);
    short || small
}

async fn enumerate(
    services: &Services,
    source: &InputSource,
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
) -> Result<(Vec<SourceEntry>, Vec<SourceEnumerationError>)> {
    match source.kind {
        InputSourceKind::MeetingProvider => {
            let provider = services.meeting_provider.as_ref().ok_or_else(|| {
                Error::Configuration("no meeting provider configured".to_string())
            })?;
            let credential_id = source.credential_id.ok_or_else(|| {
                Error::Configuration(format!(
                    "input source {} has no credential configured",
                    source.id
                ))
            })?;

            let emails = provider.list_emails(credential_id).await?;
            let scopes: Vec<Option<String>> = if emails.is_empty() {
                vec![None]
            } else {
                emails.into_iter().map(Some).collect()
            };

            let mut entries = Vec::new();
            let mut errors = Vec::new();
            for email in scopes {
                match provider
                    .list_recordings(credential_id, email.as_deref(), from_date, to_date)
                    .await
                {
                    Ok(found) => entries.extend(found),
                    Err(e) => {
                        let scope = email.unwrap_or_else(|| "default".to_string());
                        warn!(source_id = source.id, %scope, error = %e, "per-email enumeration failed, continuing with remaining scopes");
                        errors.push(SourceEnumerationError {
                            scope,
                            message: e.to_string(),
                        });
                    }
                }
            }
            Ok((entries, errors))
        }
        InputSourceKind::UrlList => {
            let expander = services.url_list_expander.as_ref().ok_or_else(|| {
                Error::Configuration("no url-list expander configured".to_string())
            })?;
            let entries = expander.expand(&source.config).await?;
            Ok((entries, Vec::new()))
        }
        InputSourceKind::CloudFolder => {
            let lister = services.cloud_folder_lister.as_ref().ok_or_else(|| {
                Error::Configuration("no cloud-folder lister configured".to_string())
            })?;
            let entries = lister.list(source.credential_id, &source.config).await?;
            Ok((entries, Vec::new()))
        }
        InputSourceKind::Local => Ok((Vec::new(), Vec::new())),
    }
}

/// Sync a single input source, bounded by `[from_date, to_date]`.
pub async fn sync_one(
    services: &Services,
    source_id: i64,
    user_id: i64,
    from_date: DateTime<Utc>,
    to_date: DateTime<Utc>,
) -> Result<SourceSyncResult> {
    let source = services.input_sources.get_by_id(source_id, user_id).await?;
    if !source.is_active {
        return Ok(SourceSyncResult {
            source_id,
            ..Default::default()
        });
    }

    let user = services.users.get_by_id(user_id).await?;
    let (duration_threshold, size_threshold) = blank_thresholds(&user.config);

    let (entries, errors) = enumerate(services, &source, from_date, to_date).await?;
    let templates = services.templates.list_matchable(user_id).await?;

    let mut upserted = 0usize;
    for entry in &entries {
        let blank = is_blank(entry, duration_threshold, size_threshold);
        let matched = template_matcher::find_match(&entry.display_name, Some(&entry.source_id), &templates);
        let (template_id, is_mapped) = match &matched {
            Some(m) => (Some(m.template.id), true),
            None => (None, false),
        };

        let source_metadata = crate::domain::SourceMetadata {
            recording_id: 0,
            source_id: Some(entry.source_id.clone()),
            download_url: entry.download_url.clone(),
            passcode: entry.passcode.clone(),
            reported_duration_seconds: entry.reported_duration_seconds,
            reported_size_bytes: entry.reported_size_bytes,
            download_token: None,
            download_token_fetched_at: None,
            still_processing_upstream: entry.still_processing_upstream,
            extra: entry.extra.clone(),
        };

        match services
            .recordings
            .create_or_update(
                user_id,
                source_id,
                &entry.source_id,
                &entry.display_name,
                entry.start_time,
                is_mapped,
                blank,
                template_id,
                Some(&source_metadata),
            )
            .await
        {
            Ok(_) => upserted += 1,
            Err(e) => warn!(source_id, entry_source_id = %entry.source_id, error = %e, "failed to upsert recording from sync entry"),
        }

        if let Some(m) = matched {
            if let Err(e) = services.templates.mark_used(m.template.id).await {
                warn!(template_id = m.template.id, error = %e, "failed to mark template as used");
            }
        }
    }

    services.input_sources.update_last_sync(source_id, Utc::now()).await?;

    info!(
        source_id,
        entries = entries.len(),
        upserted,
        errors = errors.len(),
        "source sync complete"
    );

    Ok(SourceSyncResult {
        source_id,
        entries_seen: entries.len(),
        recordings_upserted: upserted,
        errors,
    })
}

/// Sync every active source for a user, defaulting the lookback window to
/// `lookback_days` ending now. One source's failure does not abort the rest
/// (the same partial-failure tolerance as per-email enumeration, applied one
/// level up).
pub async fn sync_user_sources(services: &Services, user_id: i64, lookback_days: i64) -> Result<BatchSyncResult> {
    let sources = services.input_sources.list_active_by_user(user_id).await?;
    let to_date = Utc::now();
    let from_date = to_date - Duration::days(lookback_days);

    let mut result = BatchSyncResult::default();
    for source in sources {
        match sync_one(services, source.id, user_id, from_date, to_date).await {
            Ok(r) => {
                result.sources_synced += 1;
                result.entries_seen += r.entries_seen;
                result.recordings_upserted += r.recordings_upserted;
            }
            Err(e) => {
                result.sources_failed += 1;
                warn!(source_id = source.id, error = %e, "source sync failed, continuing with remaining sources");
            }
        }
    }
    Ok(result)
}
