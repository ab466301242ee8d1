//! Upload executor (§4.9.6) — the pipeline's tail step, invoked once per
//! `(recording_id, platform)` pair by the orchestrator's upload-launcher.
//!
//! No `StageTiming` row is recorded for uploads: `StageType` only models the
//! four `ProcessingStage` steps, and an upload is tracked instead through its
//! own `OutputTarget` row (`status`, `uploaded_at`, `failed_reason`), which
//! already gives callers start/outcome visibility without stretching the
//! stage-timing schema to cover a concept (per-platform fan-out) it wasn't
//! shaped for.

use std::collections::HashMap;

use serde_json::Value;
use tracing::info;

use crate::config_resolver::ManualOverride;
use crate::domain::TargetStatus;
use crate::failure_handler::on_upload_failure;
use crate::providers::UploadRequest;
use crate::services::Services;
use crate::status_aggregator::should_allow_upload;
use crate::topic_formatter::{format_topics, TopicFormat};
use crate::{Error, Result};

use super::{apply_failure_outcome, resolve_effective_config, StepOutcome};

struct RenderedMetadata {
    title: String,
    description: String,
    tags: Vec<String>,
    privacy: Option<String>,
    playlist_or_album_id: Option<String>,
    thumbnail_path: Option<String>,
}

fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

fn build_metadata(
    metadata: &Value,
    display_name: &str,
    main_topics: &[String],
    topics_with_timestamps: Option<&[crate::domain::recording::TopicTimestamp]>,
) -> RenderedMetadata {
    let topic_format = metadata["topic_format"]
        .as_str()
        .and_then(|s| s.parse::<TopicFormat>().ok())
        .unwrap_or(TopicFormat::Bullet);
    let with_timestamps = metadata["include_timestamps"].as_bool().unwrap_or(true);
    let topics_rendered = format_topics(main_topics, topics_with_timestamps, topic_format, with_timestamps);

    let mut vars = HashMap::new();
    vars.insert("display_name", display_name.to_string());
    vars.insert("topics", topics_rendered);

    let title_template = metadata["title_template"].as_str().unwrap_or("{display_name}");
    let description_template = metadata["description_template"].as_str().unwrap_or("{topics}");

    let tags = metadata["tags"]
        .as_array()
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    RenderedMetadata {
        title: render_template(title_template, &vars),
        description: render_template(description_template, &vars),
        tags,
        privacy: metadata["privacy"].as_str().map(str::to_string),
        playlist_or_album_id: metadata["playlist_or_album_id"].as_str().map(str::to_string),
        thumbnail_path: metadata["thumbnail_path"].as_str().map(str::to_string),
    }
}

/// Resolve which preset applies to this upload (§4.9.6 "preset resolution
/// precedence"): an explicit `preset_id` passed to this invocation (e.g. the
/// one the orchestrator's upload launcher already resolved per platform,
/// §4.8 step 3) beats a template-bound preset for the platform, which in
/// turn beats the user's only configured preset for that platform.
///
/// `output_config.preset_ids` is a list of preset ids, matching the
/// ground-truth original's `find_by_ids(preset_ids_list)` — not a
/// `{platform: id}` map — so the template-bound tier loads that list and
/// picks the one whose own `.platform` matches.
async fn resolve_preset(
    services: &Services,
    user_id: i64,
    platform: &str,
    preset_id: Option<i64>,
    output_config: Option<&Value>,
) -> Result<crate::domain::OutputPreset> {
    if let Some(id) = preset_id {
        return services.output_presets.get_by_id(id, user_id).await;
    }

    if let Some(preset_ids) = output_config.and_then(|o| o["preset_ids"].as_array()) {
        let preset_ids: Vec<i64> = preset_ids.iter().filter_map(Value::as_i64).collect();
        if !preset_ids.is_empty() {
            let presets = services.output_presets.get_by_ids(&preset_ids, user_id).await?;
            if let Some(preset) = presets.into_iter().find(|p| p.platform == platform) {
                return Ok(preset);
            }
        }
    }

    services
        .output_presets
        .list_by_platform(user_id, platform)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::validation(format!("no output preset configured for platform {platform}")))
}

pub async fn execute(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    platform: &str,
    preset_id: Option<i64>,
    manual_override: Option<&ManualOverride>,
) -> Result<StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;

    // Pause gate read once at entry (§C open question: a running upload
    // cannot be interrupted by a pause set mid-flight).
    if recording.on_pause {
        return Err(Error::admission(format!(
            "recording {recording_id} is paused"
        )));
    }

    let target = services
        .recordings
        .get_or_create_output_target(recording_id, platform, preset_id)
        .await?;

    if target.status == TargetStatus::Uploaded {
        info!(recording_id, platform, "upload already satisfied, skipping");
        return Ok(StepOutcome {
            ok: true,
            status: recording.status,
            recording_id,
            user_id,
        });
    }

    if !should_allow_upload(recording.status, Some(&target)) {
        return Err(Error::admission(format!(
            "recording {recording_id} is not eligible for upload to {platform} (status={})",
            recording.status
        )));
    }

    let effective = resolve_effective_config(services, &recording, manual_override, true).await?;
    let preset = resolve_preset(
        services,
        user_id,
        platform,
        preset_id,
        effective.output.as_ref(),
    )
    .await?;

    // Per-call overrides always win: merge the preset's stored metadata under
    // the effective config's metadata, then the manual override's output
    // config (if any) on top of that.
    let mut metadata = crate::config_resolver::deep_merge(&effective.metadata, &preset.metadata);
    if let Some(override_config) = manual_override.and_then(|m| m.output_config.as_ref()) {
        metadata = crate::config_resolver::deep_merge(&metadata, override_config);
    }

    let rendered = build_metadata(
        &metadata,
        &recording.display_name,
        recording.main_topics.as_deref().unwrap_or(&[]),
        recording.topics_with_timestamps.as_deref(),
    );

    let media_path = recording
        .processed_video_path
        .clone()
        .or_else(|| recording.local_video_path.clone())
        .ok_or_else(|| Error::validation(format!("recording {recording_id} has no media to upload")))?;

    let provider = services
        .uploaders
        .get(platform)
        .ok_or_else(|| Error::Configuration(format!("no upload provider registered for {platform}")))?;

    services.recordings.mark_output_uploading(target.id).await?;

    let run = provider
        .upload(
            preset.credential_id,
            UploadRequest {
                media_path: std::path::Path::new(&media_path),
                title: rendered.title,
                description: rendered.description,
                tags: rendered.tags,
                privacy: rendered.privacy,
                playlist_or_album_id: rendered.playlist_or_album_id,
                thumbnail_path: rendered.thumbnail_path,
            },
        )
        .await;

    match run {
        Ok(result) => {
            services
                .recordings
                .save_upload_result(
                    target.id,
                    Some(&result.external_video_id),
                    Some(&result.external_url),
                    Some(result.result_meta),
                )
                .await?;
            let status = services.recordings.recompute_status(recording_id).await?;
            Ok(StepOutcome {
                ok: true,
                status,
                recording_id,
                user_id,
            })
        }
        Err(e) => {
            services
                .recordings
                .mark_output_failed(target.id, &e.to_string())
                .await?;
            // `apply_failure_outcome`'s `UploadFailed` branch is a no-op —
            // the stage/recording mutation for this path already happened
            // above, via `mark_output_failed`, which has the target id this
            // helper does not.
            apply_failure_outcome(services, recording_id, on_upload_failure(platform), &e.to_string())
                .await?;
            Err(e)
        }
    }
}
