//! Trim executor (§4.9.2) — silence removal.
//!
//! Grounded on the teacher's FFmpeg subprocess idiom
//! (`downloader/engine/ffmpeg.rs`: spawn via `process_utils::tokio_command`,
//! collect output, treat a non-zero exit as a terminal step failure) and its
//! `ffprobe`-first-then-ffmpeg pattern for media inspection
//! (`pipeline/processors/audio_extract.rs`). The silence-detection itself
//! uses FFmpeg's own `silencedetect` filter and parses its stderr, since the
//! algorithm in §4.9.2 (extract audio first, detect from the audio file, a
//! no-reencode fast path) has no direct analog among the teacher's
//! processors, which only extract or remux and never trim on detected
//! silence.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::info;

use crate::config_resolver::ManualOverride;
use crate::domain::StageType;
use crate::failure_handler::on_trim_failure;
use crate::services::Services;
use crate::{Error, Result};

use super::{apply_failure_outcome, begin_stage, complete_stage, resolve_effective_config, StepOutcome};

struct TrimParams {
    silence_threshold_db: f64,
    min_silence_duration: f64,
    padding_before: f64,
    padding_after: f64,
}

impl TrimParams {
    fn from_config(processing: &serde_json::Value) -> Self {
        let t = &processing["trimming"];
        Self {
            silence_threshold_db: t["silence_threshold"].as_f64().unwrap_or(-40.0),
            min_silence_duration: t["min_silence_duration"].as_f64().unwrap_or(0.5),
            padding_before: t["padding_before"].as_f64().unwrap_or(0.5),
            padding_after: t["padding_after"].as_f64().unwrap_or(0.5),
        }
    }
}

struct SilenceWindow {
    /// First instant that is not part of leading silence.
    start: f64,
    /// Last instant that is not part of trailing silence.
    end: f64,
    has_leading_silence: bool,
    has_trailing_silence: bool,
}

pub async fn execute(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
) -> Result<StepOutcome> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;
    let effective = resolve_effective_config(services, &recording, manual_override, false).await?;
    let params = TrimParams::from_config(&effective.processing);

    let video_path = recording.local_video_path.clone().ok_or_else(|| {
        Error::validation(format!(
            "recording {recording_id} has no local_video_path to trim"
        ))
    })?;

    let user = services.users.get_by_id(user_id).await?;
    let store = &services.artifact_store;
    let temp_audio = store.temp_dir().join(format!("{recording_id}-trim-audio.wav"));

    begin_stage(services, recording_id, StageType::Trim).await?;

    let run = run_trim(services, user.slug, recording_id, &video_path, &temp_audio, &params).await;

    let _ = tokio::fs::remove_file(&temp_audio).await;

    match run {
        Ok(()) => {
            complete_stage(services, recording_id, StageType::Trim, None).await?;
            let status = services.recordings.recompute_status(recording_id).await?;
            Ok(StepOutcome {
                ok: true,
                status,
                recording_id,
                user_id,
            })
        }
        Err(e) => {
            apply_failure_outcome(services, recording_id, on_trim_failure(), &e.to_string()).await?;
            Err(e)
        }
    }
}

async fn run_trim(
    services: &Services,
    user_slug: u32,
    recording_id: i64,
    video_path: &str,
    temp_audio: &Path,
    params: &TrimParams,
) -> Result<()> {
    extract_audio(video_path, temp_audio).await?;
    let duration = probe_duration(temp_audio).await?;
    let window = detect_silence_window(temp_audio, params, duration).await?;

    let store = &services.artifact_store;
    let processed_video = store.processed_video(user_slug, recording_id);
    let processed_audio = store.recording_audio(user_slug, recording_id);
    tokio::fs::create_dir_all(store.recording_video_dir(user_slug)).await?;
    tokio::fs::create_dir_all(store.recording_audio_dir(user_slug)).await?;

    if !window.has_leading_silence && !window.has_trailing_silence {
        info!(recording_id, "no silence detected at edges, skipping re-encode");
        services
            .recordings
            .set_processed_paths(recording_id, Some(video_path), None)
            .await?;
        tokio::fs::copy(temp_audio, &processed_audio).await?;
        services
            .recordings
            .set_processed_paths(
                recording_id,
                Some(video_path),
                Some(processed_audio.to_string_lossy().as_ref()),
            )
            .await?;
        return Ok(());
    }

    let start = (window.start - params.padding_before).max(0.0);
    let end = window.end + params.padding_after;

    trim_media(video_path, &processed_video, start, end).await?;
    trim_media(&temp_audio.to_string_lossy(), &processed_audio, start, end).await?;

    services
        .recordings
        .set_processed_paths(
            recording_id,
            Some(processed_video.to_string_lossy().as_ref()),
            Some(processed_audio.to_string_lossy().as_ref()),
        )
        .await?;
    Ok(())
}

fn ffmpeg_path() -> String {
    std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string())
}

fn ffprobe_path() -> String {
    std::env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string())
}

async fn extract_audio(video_path: &str, dest: &Path) -> Result<()> {
    let output = process_utils::tokio_command(ffmpeg_path())
        .args([
            "-y",
            "-i",
            video_path,
            "-vn",
            "-acodec",
            "pcm_s16le",
            "-ar",
            "16000",
            "-ac",
            "1",
        ])
        .arg(dest)
        .output()
        .await?;
    if !output.status.success() {
        return Err(Error::Pipeline(format!(
            "ffmpeg audio extraction failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

async fn probe_duration(path: &Path) -> Result<f64> {
    let output = process_utils::tokio_command(ffprobe_path())
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(path)
        .output()
        .await?;
    if !output.status.success() {
        return Err(Error::Pipeline(format!(
            "ffprobe duration probe failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::Pipeline(format!("could not parse audio duration: {e}")))
}

async fn detect_silence_window(
    audio_path: &Path,
    params: &TrimParams,
    duration: f64,
) -> Result<SilenceWindow> {
    let filter = format!(
        "silencedetect=noise={}dB:d={}",
        params.silence_threshold_db, params.min_silence_duration
    );
    let output = process_utils::tokio_command(ffmpeg_path())
        .args(["-i"])
        .arg(audio_path)
        .args(["-af", &filter, "-f", "null", "-"])
        .output()
        .await?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    let start_re = Regex::new(r"silence_start:\s*(-?[0-9.]+)").expect("static regex");
    let end_re = Regex::new(r"silence_end:\s*(-?[0-9.]+)").expect("static regex");

    let starts: Vec<f64> = start_re
        .captures_iter(&stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    let ends: Vec<f64> = end_re
        .captures_iter(&stderr)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    let has_leading_silence = starts.first().map(|s| *s <= 0.01).unwrap_or(false);
    let content_start = if has_leading_silence {
        ends.first().copied().unwrap_or(0.0)
    } else {
        0.0
    };

    let has_trailing_silence = ends.len() > starts.len()
        || starts
            .last()
            .map(|s| ends.len() <= starts.len() && *s < duration - 0.01 && starts.len() > ends.len())
            .unwrap_or(false);
    // An un-terminated trailing silence_start with no matching silence_end
    // (ffmpeg never logs `silence_end` for silence running to EOF) means the
    // clip trails into silence.
    let trailing_unterminated = starts.len() > ends.len();
    let content_end = if trailing_unterminated {
        starts.last().copied().unwrap_or(duration)
    } else {
        duration
    };

    Ok(SilenceWindow {
        start: content_start,
        end: content_end,
        has_leading_silence,
        has_trailing_silence: trailing_unterminated || has_trailing_silence,
    })
}

async fn trim_media(input: &str, output: &PathBuf, start: f64, end: f64) -> Result<()> {
    let out = process_utils::tokio_command(ffmpeg_path())
        .args(["-y", "-i", input, "-ss"])
        .arg(format!("{start}"))
        .arg("-to")
        .arg(format!("{end}"))
        .args(["-c", "copy"])
        .arg(output)
        .output()
        .await?;
    if !out.status.success() {
        return Err(Error::Pipeline(format!(
            "ffmpeg trim failed for {}: {}",
            output.display(),
            String::from_utf8_lossy(&out.stderr)
        )));
    }
    Ok(())
}
