//! Pipeline orchestrator (§4.8).
//!
//! Builds the per-recording step chain from the resolved effective config —
//! an optional sequential prefix (download → trim → transcribe), a parallel
//! fan-out into {extract_topics, generate_subtitles} joined by a single
//! aggregate recompute, and an upload-launcher tail step that fans out one
//! upload task per platform — and drives it to completion on a background
//! task. Grounded on the teacher's `pipeline/orchestrator.rs` chain-builder
//! (one driver task per chain, submissions routed through the queue
//! dispatcher), adapted from the teacher's fixed two-stage live/VOD chain to
//! this crate's variable five-stage DAG assembled from config flags rather
//! than hardcoded.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config_resolver::ManualOverride;
use crate::executors::{self, resolve_effective_config, StepOutcome};
use crate::queue_dispatcher::QueueName;
use crate::services::Services;
use crate::status_aggregator::should_allow_run;
use crate::Result;

#[derive(Debug, Clone, Copy, Default)]
struct ChainPlan {
    download: bool,
    trim: bool,
    transcribe: bool,
    topics: bool,
    subtitles: bool,
    upload: bool,
    allow_errors: bool,
}

impl ChainPlan {
    fn from_config(processing: &Value, output: Option<&Value>) -> Self {
        let download = processing["download"]["enabled"].as_bool().unwrap_or(true);
        let trim = processing["trimming"]["enable_trimming"].as_bool().unwrap_or(false);
        let transcribe = processing["transcription"]["enable_transcription"]
            .as_bool()
            .unwrap_or(false);
        let allow_errors = processing["transcription"]["allow_errors"].as_bool().unwrap_or(false);
        let topics = transcribe
            && processing["transcription"]["enable_topics"].as_bool().unwrap_or(false);
        let subtitles = transcribe
            && processing["transcription"]["enable_subtitles"].as_bool().unwrap_or(false);
        let upload = output
            .map(|o| o["auto_upload"].as_bool().unwrap_or(false))
            .unwrap_or(false);
        Self {
            download,
            trim,
            transcribe,
            topics,
            subtitles,
            upload,
            allow_errors,
        }
    }
}

/// Resolve the platforms to upload to and the preset each one should use
/// (§4.8 step 3: "platforms = `default_platforms` or, if empty, the
/// platforms of the resolved preset list"). `output_config.preset_ids` is a
/// list of preset ids (matching the ground-truth original's
/// `find_by_ids(preset_ids_list)`); this loads those presets and derives
/// both the fallback platform list and a `platform -> preset_id` map so the
/// upload launcher can hand each platform its template-bound preset
/// directly instead of re-deriving it from the raw config.
async fn resolve_platforms_and_presets(
    services: &Services,
    user_id: i64,
    output: Option<&Value>,
) -> Result<(Vec<String>, std::collections::HashMap<String, i64>)> {
    let Some(output) = output else {
        return Ok((Vec::new(), std::collections::HashMap::new()));
    };

    let preset_ids: Vec<i64> = output["preset_ids"]
        .as_array()
        .map(|list| list.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let presets = if preset_ids.is_empty() {
        Vec::new()
    } else {
        services.output_presets.get_by_ids(&preset_ids, user_id).await?
    };

    Ok(derive_platforms_and_preset_map(output, &presets))
}

/// Pure half of the above: given the already-loaded presets named by
/// `output_config.preset_ids`, derive the `platform -> preset_id` map and
/// the fallback platform list (used only when `default_platforms` is
/// empty), kept side-effect-free for unit testing.
fn derive_platforms_and_preset_map(
    output: &Value,
    presets: &[crate::domain::OutputPreset],
) -> (Vec<String>, std::collections::HashMap<String, i64>) {
    let preset_map: std::collections::HashMap<String, i64> =
        presets.iter().map(|p| (p.platform.clone(), p.id)).collect();

    let mut platforms: Vec<String> = output["default_platforms"]
        .as_array()
        .map(|list| list.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    if platforms.is_empty() && !presets.is_empty() {
        platforms = presets.iter().map(|p| p.platform.clone()).collect();
    }

    (platforms, preset_map)
}

/// Submit the recording's full step chain without blocking: returns an
/// opaque chain id immediately and drives the chain to completion on a
/// background task. Admission (blank-record short-circuit, `on_pause`, a
/// sticky SKIPPED/PENDING_SOURCE/EXPIRED status) is checked once up front —
/// a chain that is not eligible to run is simply a no-op, not an error, so
/// callers triggering a routine re-scan of many recordings do not need to
/// filter first.
pub async fn launch_chain(
    services: Arc<Services>,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<ManualOverride>,
) -> Result<Uuid> {
    let recording = services.recordings.get_by_id(recording_id, user_id).await?;
    let chain_id = Uuid::new_v4();

    if recording.blank_record || !should_allow_run(recording.status) {
        info!(
            recording_id,
            status = %recording.status,
            "recording not eligible for a pipeline run, chain is a no-op"
        );
        return Ok(chain_id);
    }

    tokio::spawn(async move {
        if let Err(e) = run_chain(&services, recording_id, user_id, manual_override, chain_id).await {
            error!(recording_id, %chain_id, error = %e, "pipeline chain aborted");
        }
    });

    Ok(chain_id)
}

/// Submit one step to its queue and report whether the chain may continue.
/// A step failure is always fully persisted by the executor itself (stage
/// state, `recording.failed`, aggregate recompute) before this returns —
/// the orchestrator only decides whether downstream steps still run.
async fn run_step<F, Fut>(services: &Services, queue: QueueName, user_id: i64, priority: u8, job: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<StepOutcome>>,
{
    match services.dispatcher.submit(queue, user_id, priority, job).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "pipeline step failed, remainder of chain halted");
            false
        }
    }
}

async fn run_chain(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<ManualOverride>,
    chain_id: Uuid,
) -> Result<()> {
    services
        .recordings
        .set_pipeline_started(recording_id, chrono::Utc::now())
        .await?;

    let recording = services.recordings.get_by_id(recording_id, user_id).await?;
    let effective = resolve_effective_config(services, &recording, manual_override.as_ref(), true).await?;
    let plan = ChainPlan::from_config(&effective.processing, effective.output.as_ref());
    let mo = manual_override.as_ref();

    info!(recording_id, %chain_id, ?plan, "pipeline chain starting");

    if plan.download {
        let ok = run_step(services, QueueName::Downloads, user_id, 5, || async {
            executors::download::execute(services, recording_id, user_id, mo).await
        })
        .await;
        if !ok {
            return Ok(());
        }
    }

    if plan.trim {
        let ok = run_step(services, QueueName::ProcessingCpu, user_id, 5, || async {
            executors::trim::execute(services, recording_id, user_id, mo).await
        })
        .await;
        if !ok {
            return Ok(());
        }
    }

    if plan.transcribe {
        let ok = run_step(services, QueueName::AsyncOperations, user_id, 5, || async {
            executors::transcribe::execute(services, recording_id, user_id, mo).await
        })
        .await;
        if !ok {
            if plan.allow_errors {
                // transcribe's own failure handling already cascade-skipped
                // extract_topics/generate_subtitles and recomputed the
                // aggregate once (§4.6) — the parallel group never runs.
                info!(recording_id, %chain_id, "transcribe cascade-skipped downstream steps, continuing to upload");
            } else {
                return Ok(());
            }
        } else if plan.topics || plan.subtitles {
            run_parallel_group(services, recording_id, user_id, mo, &plan).await;
        }
    }

    if plan.upload {
        let (platforms, preset_map) =
            resolve_platforms_and_presets(services, user_id, effective.output.as_ref()).await?;
        if platforms.is_empty() {
            warn!(recording_id, %chain_id, "auto_upload is set but no platforms are configured");
        } else {
            run_upload_launcher(services, recording_id, user_id, mo, &platforms, &preset_map).await;
        }
    }

    info!(recording_id, %chain_id, "pipeline chain finished");
    Ok(())
}

/// Run the post-transcribe parallel group and perform the single join
/// re-read (§C open question: the join recomputes the aggregate exactly
/// once after both members report, success or cascade-skip).
async fn run_parallel_group(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
    plan: &ChainPlan,
) {
    let topics_fut = async {
        if plan.topics {
            Some(
                services
                    .dispatcher
                    .submit(QueueName::AsyncOperations, user_id, 5, || async {
                        executors::extract_topics::execute(services, recording_id, user_id, manual_override).await
                    })
                    .await,
            )
        } else {
            None
        }
    };
    let subtitles_fut = async {
        if plan.subtitles {
            Some(
                services
                    .dispatcher
                    .submit(QueueName::AsyncOperations, user_id, 5, || async {
                        executors::generate_subtitles::execute(services, recording_id, user_id, manual_override)
                            .await
                    })
                    .await,
            )
        } else {
            None
        }
    };

    let (topics_result, subtitles_result) = tokio::join!(topics_fut, subtitles_fut);

    if let Some(Err(e)) = &topics_result {
        warn!(recording_id, error = %e, "extract_topics failed");
    }
    if let Some(Err(e)) = &subtitles_result {
        warn!(recording_id, error = %e, "generate_subtitles failed");
    }

    if let Err(e) = services.recordings.recompute_status(recording_id).await {
        error!(recording_id, error = %e, "join re-read failed to recompute aggregate status");
    }
}

/// Fan out one upload task per platform (§4.8 "upload-launcher"). Each
/// platform uploads independently — one platform's failure does not block
/// another's attempt.
async fn run_upload_launcher(
    services: &Services,
    recording_id: i64,
    user_id: i64,
    manual_override: Option<&ManualOverride>,
    platforms: &[String],
    preset_map: &std::collections::HashMap<String, i64>,
) {
    let uploads = platforms.iter().map(|platform| async move {
        let preset_id = preset_map.get(platform).copied();
        let result = services
            .dispatcher
            .submit(QueueName::Uploads, user_id, 5, || async {
                executors::upload::execute(services, recording_id, user_id, platform, preset_id, manual_override)
                    .await
            })
            .await;
        (platform, result)
    });

    for (platform, result) in futures::future::join_all(uploads).await {
        if let Err(e) = result {
            warn!(recording_id, %platform, error = %e, "upload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topics_and_subtitles_require_transcribe_enabled() {
        let processing = json!({
            "trimming": {"enable_trimming": true},
            "transcription": {
                "enable_transcription": false,
                "enable_topics": true,
                "enable_subtitles": true
            }
        });
        let plan = ChainPlan::from_config(&processing, None);
        assert!(plan.trim);
        assert!(!plan.transcribe);
        assert!(!plan.topics, "topics must not run without transcription");
        assert!(!plan.subtitles, "subtitles must not run without transcription");
    }

    #[test]
    fn full_plan_from_config_matches_s1_scenario() {
        let processing = json!({
            "trimming": {"enable_trimming": true},
            "transcription": {
                "enable_transcription": true,
                "enable_topics": true,
                "enable_subtitles": true
            }
        });
        let output = json!({"auto_upload": true, "preset_ids": [42]});
        let plan = ChainPlan::from_config(&processing, Some(&output));
        assert!(plan.download);
        assert!(plan.trim);
        assert!(plan.transcribe);
        assert!(plan.topics);
        assert!(plan.subtitles);
        assert!(plan.upload);
        assert!(!plan.allow_errors);
    }

    #[test]
    fn download_defaults_to_enabled_when_absent() {
        let plan = ChainPlan::from_config(&json!({}), None);
        assert!(plan.download);
        assert!(!plan.trim);
        assert!(!plan.upload);
    }

    fn preset(id: i64, platform: &str) -> crate::domain::OutputPreset {
        crate::domain::OutputPreset {
            id,
            user_id: 1,
            platform: platform.to_string(),
            credential_id: 1,
            metadata: json!({}),
        }
    }

    #[test]
    fn resolve_platforms_prefers_default_platforms() {
        let output = json!({
            "default_platforms": ["youtube", "s3"],
            "preset_ids": [1, 2]
        });
        let presets = vec![preset(1, "youtube"), preset(2, "drive")];
        let (platforms, preset_map) = derive_platforms_and_preset_map(&output, &presets);
        assert_eq!(platforms, vec!["youtube", "s3"]);
        assert_eq!(preset_map.get("youtube"), Some(&1));
        assert_eq!(preset_map.get("drive"), Some(&2));
    }

    #[test]
    fn resolve_platforms_falls_back_to_resolved_preset_list_s1_scenario() {
        // §4.8 step 3 / S1: preset_ids:[42] with no default_platforms must
        // derive the platform from the loaded preset, not an empty list.
        let output = json!({"preset_ids": [42]});
        let presets = vec![preset(42, "youtube")];
        let (mut platforms, preset_map) = derive_platforms_and_preset_map(&output, &presets);
        platforms.sort();
        assert_eq!(platforms, vec!["youtube"]);
        assert_eq!(preset_map.get("youtube"), Some(&42));
    }

    #[test]
    fn resolve_platforms_empty_without_output_config_or_presets() {
        let (platforms, preset_map) = derive_platforms_and_preset_map(&json!({}), &[]);
        assert!(platforms.is_empty());
        assert!(preset_map.is_empty());
    }
}
