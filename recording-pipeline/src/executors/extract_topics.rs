//! Extract-topics executor (§4.9.4) — one of the two members of the
//! post-transcribe parallel group (the other is `generate_subtitles`).
//!
//! Neither parallel member recomputes the recording's aggregate status on
//! its own; only the orchestrator's join step does, once, after both have
//! reported. See `executors::begin_stage_no_recompute` /
//! `complete_stage_no_recompute`.

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config_resolver::ManualOverride;
use crate::domain::processing_stage::StageStatus;
use crate::domain::StageType;
use crate::failure_handler::on_transcription_family_failure;
use crate::providers::ExtractedTopic;
use crate::services::Services;
use crate::{Error, Result};

use super::transcribe::read_segments_text;
use super::{
    apply_failure_outcome_no_recompute, begin_stage_no_recompute, complete_stage_no_recompute,
    resolve_effective_config, StepOutcome,
};

struct TopicParams {
    granularity: String,
    primary_model: String,
    secondary_model: Option<String>,
    allow_errors: bool,
}

impl TopicParams {
    fn from_config(processing: &Value) -> Self {
        let t = &processing["topics"];
        Self {
            granularity: t["granularity"].as_str().unwrap_or("medium").to_string(),
            primary_model: t["primary_model"].as_str().unwrap_or("gpt-4o-mini").to_string(),
            secondary_model: t["secondary_model"].as_str().map(str::to_string),
            allow_errors: processing["transcription"]["allow_errors"]
                .as_bool()
                .unwrap_or(false),
        }
    }
}

pub async fn execute(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
) -> Result<StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;

    let stage = services
        .recordings
        .get_or_create_stage(recording_id, StageType::ExtractTopics)
        .await?;
    if stage.status == StageStatus::Skipped {
        info!(recording_id, "extract_topics already skipped, short-circuiting");
        return Ok(StepOutcome {
            ok: true,
            status: recording.status,
            recording_id,
            user_id,
        });
    }

    let effective = resolve_effective_config(services, &recording, manual_override, false).await?;
    let params = TopicParams::from_config(&effective.processing);

    let transcription_dir = recording.transcription_dir.clone().ok_or_else(|| {
        Error::validation(format!(
            "recording {recording_id} has no transcription_dir to extract topics from"
        ))
    })?;

    begin_stage_no_recompute(services, recording_id, StageType::ExtractTopics).await?;

    let run = run_extract_topics(services, &transcription_dir, &params).await;

    match run {
        Ok((topics, model_used)) => {
            let main_topics: Vec<String> = topics.iter().map(|t| t.topic.clone()).collect();
            let timestamps: Vec<crate::domain::recording::TopicTimestamp> = topics
                .iter()
                .map(|t| crate::domain::recording::TopicTimestamp {
                    topic: t.topic.clone(),
                    timestamp_seconds: t.timestamp_seconds,
                })
                .collect();
            services
                .recordings
                .set_topics(recording_id, Some(&main_topics), Some(&timestamps))
                .await?;

            let stage_meta = serde_json::json!({
                "version_id": Uuid::new_v4().to_string(),
                "model": model_used,
                "topic_count": topics.len(),
            });
            complete_stage_no_recompute(services, recording_id, StageType::ExtractTopics, Some(stage_meta))
                .await?;
            Ok(StepOutcome {
                ok: true,
                status: recording.status,
                recording_id,
                user_id,
            })
        }
        Err(e) => {
            let outcome = on_transcription_family_failure(StageType::ExtractTopics, params.allow_errors);
            apply_failure_outcome_no_recompute(services, recording_id, outcome, &e.to_string()).await?;
            Err(e)
        }
    }
}

/// Try the primary model, then the secondary model if configured, before
/// giving up (§4.9.4 "two-tier model fallback").
async fn run_extract_topics(
    services: &Services,
    transcription_dir: &str,
    params: &TopicParams,
) -> Result<(Vec<ExtractedTopic>, String)> {
    let segments_text = read_segments_text(std::path::Path::new(transcription_dir)).await?;

    match services
        .topic_provider
        .extract_topics(&segments_text, &params.granularity, &params.primary_model)
        .await
    {
        Ok(topics) => Ok((topics, params.primary_model.clone())),
        Err(primary_err) => {
            let Some(secondary) = params.secondary_model.as_deref() else {
                return Err(primary_err);
            };
            warn!(
                model = params.primary_model,
                error = %primary_err,
                "primary topic-extraction model failed, falling back to secondary"
            );
            let topics = services
                .topic_provider
                .extract_topics(&segments_text, &params.granularity, secondary)
                .await?;
            Ok((topics, secondary.to_string()))
        }
    }
}
