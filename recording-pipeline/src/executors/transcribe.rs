//! Transcribe executor (§4.9.3).
//!
//! Runs once per recording, ahead of the extract-topics/generate-subtitles
//! fan-out, and is itself sequential — both later steps depend on the cache
//! files it writes into the recording's transcription directory. Grounded on
//! the teacher's provider-call shape in `pipeline/processors/*` (resolve
//! config, call the collaborator, persist the result, flip the stage), with
//! the actual HTTP call delegated to `providers::TranscriptionProvider`
//! (out of scope here, per §1).

use serde_json::Value;
use tracing::info;

use crate::config_resolver::ManualOverride;
use crate::domain::StageType;
use crate::failure_handler::on_transcription_family_failure;
use crate::providers::TranscriptionResult;
use crate::services::Services;
use crate::status_aggregator::should_allow_transcription;
use crate::{Error, Result};

use super::{apply_failure_outcome, begin_stage, complete_stage, resolve_effective_config, StepOutcome};

struct TranscribeParams {
    language: String,
    base_prompt: String,
    vocabulary: Vec<String>,
    temperature: f64,
    allow_errors: bool,
}

impl TranscribeParams {
    fn from_config(processing: &Value) -> Self {
        let t = &processing["transcription"];
        Self {
            language: t["language"].as_str().unwrap_or("en").to_string(),
            base_prompt: t["prompt"].as_str().unwrap_or("").to_string(),
            vocabulary: t["vocabulary"]
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            temperature: t["temperature"].as_f64().unwrap_or(0.0),
            allow_errors: t["allow_errors"].as_bool().unwrap_or(false),
        }
    }
}

fn compose_prompt(params: &TranscribeParams, display_name: &str) -> String {
    let mut prompt = params.base_prompt.clone();
    if !prompt.is_empty() {
        prompt.push(' ');
    }
    prompt.push_str(&format!("Recording: {display_name}."));
    if !params.vocabulary.is_empty() {
        prompt.push_str(&format!(" Vocabulary: {}.", params.vocabulary.join(", ")));
    }
    prompt
}

/// Pick the best available media file to transcribe: processed audio first
/// (smallest, already extracted by trim), then processed video, then the raw
/// download (§4.9.3 "input priority").
fn select_audio_source(
    processed_audio_path: Option<&str>,
    processed_video_path: Option<&str>,
    local_video_path: Option<&str>,
) -> Result<String> {
    processed_audio_path
        .or(processed_video_path)
        .or(local_video_path)
        .map(str::to_string)
        .ok_or_else(|| Error::validation("recording has no media to transcribe"))
}

pub async fn execute(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
) -> Result<StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;

    if !should_allow_transcription(recording.stages()) {
        return Err(Error::admission(format!(
            "recording {recording_id} transcribe stage is not eligible to run"
        )));
    }

    let effective = resolve_effective_config(services, &recording, manual_override, false).await?;
    let params = TranscribeParams::from_config(&effective.processing);

    let audio_path = select_audio_source(
        recording.processed_audio_path.as_deref(),
        recording.processed_video_path.as_deref(),
        recording.local_video_path.as_deref(),
    )?;

    let user = services.users.get_by_id(user_id).await?;
    let transcription_dir = services.artifact_store.transcription_dir(user.slug, recording_id);
    let prompt = compose_prompt(&params, &recording.display_name);

    begin_stage(services, recording_id, StageType::Transcribe).await?;

    let run = run_transcribe(
        services,
        recording_id,
        &audio_path,
        &transcription_dir,
        &params,
        &prompt,
    )
    .await;

    match run {
        Ok(result) => {
            let stage_meta = serde_json::json!({
                "language": result.language,
                "model": result.model,
                "duration_seconds": result.duration_seconds,
                "segment_count": result.segments.len(),
            });
            complete_stage(services, recording_id, StageType::Transcribe, Some(stage_meta)).await?;
            let status = services.recordings.recompute_status(recording_id).await?;
            Ok(StepOutcome {
                ok: true,
                status,
                recording_id,
                user_id,
            })
        }
        Err(e) => {
            let outcome = on_transcription_family_failure(StageType::Transcribe, params.allow_errors);
            apply_failure_outcome(services, recording_id, outcome, &e.to_string()).await?;
            Err(e)
        }
    }
}

async fn run_transcribe(
    services: &Services,
    recording_id: i64,
    audio_path: &str,
    transcription_dir: &std::path::Path,
    params: &TranscribeParams,
    prompt: &str,
) -> Result<TranscriptionResult> {
    tokio::fs::create_dir_all(transcription_dir).await?;

    let result = services
        .transcription_provider
        .transcribe(
            std::path::Path::new(audio_path),
            &params.language,
            prompt,
            params.temperature,
        )
        .await?;

    write_master_json(transcription_dir, &result).await?;
    write_segments_text(transcription_dir, &result).await?;
    write_words_text(transcription_dir, &result).await?;

    services
        .recordings
        .set_transcription_dir(recording_id, Some(&transcription_dir.to_string_lossy()))
        .await?;

    info!(
        recording_id,
        segments = result.segments.len(),
        "transcription complete"
    );
    Ok(result)
}

async fn write_master_json(dir: &std::path::Path, result: &TranscriptionResult) -> Result<()> {
    let json = serde_json::to_vec_pretty(result)?;
    tokio::fs::write(dir.join("master.json"), json).await?;
    Ok(())
}

async fn write_segments_text(dir: &std::path::Path, result: &TranscriptionResult) -> Result<()> {
    let text = result
        .segments
        .iter()
        .map(|s| format!("{:.2}\t{:.2}\t{}", s.start, s.end, s.text))
        .collect::<Vec<_>>()
        .join("\n");
    tokio::fs::write(dir.join("segments.txt"), text).await?;
    Ok(())
}

async fn write_words_text(dir: &std::path::Path, result: &TranscriptionResult) -> Result<()> {
    let text = result
        .words
        .iter()
        .map(|w| format!("{:.2}\t{:.2}\t{}", w.start, w.end, w.text))
        .collect::<Vec<_>>()
        .join("\n");
    tokio::fs::write(dir.join("words.txt"), text).await?;
    Ok(())
}

/// Parse back the `segments.txt` cache file written above. Used by
/// extract_topics and generate_subtitles so neither has to re-parse
/// `master.json` or re-derive segment boundaries.
pub(crate) async fn read_segments_text(dir: &std::path::Path) -> Result<String> {
    Ok(tokio::fs::read_to_string(dir.join("segments.txt")).await?)
}
