//! Generate-subtitles executor (§4.9.5) — the other member of the
//! post-transcribe parallel group (the other is `extract_topics`).
//!
//! Same short-circuit and no-recompute discipline as `extract_topics`: see
//! that module's doc comment and `executors::begin_stage_no_recompute`.

use serde_json::Value;
use tracing::info;

use crate::config_resolver::ManualOverride;
use crate::domain::processing_stage::StageStatus;
use crate::domain::StageType;
use crate::failure_handler::on_transcription_family_failure;
use crate::providers::TranscriptSegment;
use crate::services::Services;
use crate::{Error, Result};

use super::transcribe::read_segments_text;
use super::{
    apply_failure_outcome_no_recompute, begin_stage_no_recompute, complete_stage_no_recompute,
    resolve_effective_config, StepOutcome,
};

struct SubtitleParams {
    formats: Vec<String>,
    allow_errors: bool,
}

impl SubtitleParams {
    fn from_config(processing: &Value) -> Self {
        let t = &processing["subtitles"];
        let formats = t["formats"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_lowercase)).collect())
            .filter(|v: &Vec<String>| !v.is_empty())
            .unwrap_or_else(|| vec!["srt".to_string(), "vtt".to_string()]);
        Self {
            formats,
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
        .get_or_create_stage(recording_id, StageType::GenerateSubtitles)
        .await?;
    if stage.status == StageStatus::Skipped {
        info!(recording_id, "generate_subtitles already skipped, short-circuiting");
        return Ok(StepOutcome {
            ok: true,
            status: recording.status,
            recording_id,
            user_id,
        });
    }

    let effective = resolve_effective_config(services, &recording, manual_override, false).await?;
    let params = SubtitleParams::from_config(&effective.processing);

    let transcription_dir = recording.transcription_dir.clone().ok_or_else(|| {
        Error::validation(format!(
            "recording {recording_id} has no transcription_dir to generate subtitles from"
        ))
    })?;

    begin_stage_no_recompute(services, recording_id, StageType::GenerateSubtitles).await?;

    let run = run_generate_subtitles(&transcription_dir, &params).await;

    match run {
        Ok(output_paths) => {
            let stage_meta = serde_json::json!({ "outputs": output_paths });
            complete_stage_no_recompute(
                services,
                recording_id,
                StageType::GenerateSubtitles,
                Some(stage_meta),
            )
            .await?;
            Ok(StepOutcome {
                ok: true,
                status: recording.status,
                recording_id,
                user_id,
            })
        }
        Err(e) => {
            let outcome =
                on_transcription_family_failure(StageType::GenerateSubtitles, params.allow_errors);
            apply_failure_outcome_no_recompute(services, recording_id, outcome, &e.to_string()).await?;
            Err(e)
        }
    }
}

async fn run_generate_subtitles(
    transcription_dir: &str,
    params: &SubtitleParams,
) -> Result<Vec<String>> {
    let dir = std::path::Path::new(transcription_dir);
    let segments = parse_segments(&read_segments_text(dir).await?);

    let mut outputs = Vec::with_capacity(params.formats.len());
    for format in &params.formats {
        let path = dir.join(format!("subtitles.{format}"));
        let contents = match format.as_str() {
            "srt" => render_srt(&segments),
            "vtt" => render_vtt(&segments),
            other => {
                return Err(Error::validation(format!(
                    "unsupported subtitle format: {other}"
                )))
            }
        };
        tokio::fs::write(&path, contents).await?;
        outputs.push(path.to_string_lossy().into_owned());
    }
    Ok(outputs)
}

fn parse_segments(segments_text: &str) -> Vec<TranscriptSegment> {
    segments_text
        .lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let start: f64 = parts.next()?.parse().ok()?;
            let end: f64 = parts.next()?.parse().ok()?;
            let text = parts.next().unwrap_or("").to_string();
            Some(TranscriptSegment { start, end, text })
        })
        .collect()
}

fn srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let m = (total_s / 60) % 60;
    let h = total_s / 3600;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

fn vtt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    let s = total_s % 60;
    let m = (total_s / 60) % 60;
    let h = total_s / 3600;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

fn render_srt(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(i, seg)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                i + 1,
                srt_timestamp(seg.start),
                srt_timestamp(seg.end),
                seg.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_vtt(segments: &[TranscriptSegment]) -> String {
    let body = segments
        .iter()
        .map(|seg| {
            format!(
                "{} --> {}\n{}\n",
                vtt_timestamp(seg.start),
                vtt_timestamp(seg.end),
                seg.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("WEBVTT\n\n{body}")
}
