//! Failure handler (§4.6) — translates a step failure into state mutations.
//! This module is pure: it decides *what* should change; the repository
//! layer (`database::repositories::RecordingRepository`) is the sole
//! mutator and calls back into here.

use crate::domain::{RecordingStatus, StageType};

const MAX_ERROR_LEN: usize = 1000;

pub fn truncate_error(reason: &str) -> String {
    if reason.chars().count() <= MAX_ERROR_LEN {
        reason.to_string()
    } else {
        reason.chars().take(MAX_ERROR_LEN).collect()
    }
}

/// What the failure handler decided to do with a stage/recording after a
/// step raised an error. The repository applies this as one mutation, then
/// recomputes the aggregate status.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Roll back the recording to `rollback_status`, mark the stage (if
    /// any) FAILED, and set `recording.failed`/`failed_at_stage`.
    RollbackAndFail {
        rollback_status: RecordingStatus,
        failed_at_stage: &'static str,
        stage: Option<StageType>,
    },
    /// `transcription.allow_errors = true` path: mark the stage (and its
    /// dependents) SKIPPED, keep `recording.failed = true` for visibility,
    /// but do not roll back `status` (the aggregator will recompute it).
    CascadeSkip {
        stage: StageType,
        dependents: Vec<StageType>,
        failed_at_stage: &'static str,
    },
    /// Mark one output target FAILED; if this was the last non-failed
    /// target, also set `recording.failed` with stage="upload".
    UploadFailed { target_type: String },
}

/// Decide the outcome for a download failure.
pub fn on_download_failure(is_mapped: bool) -> FailureOutcome {
    FailureOutcome::RollbackAndFail {
        rollback_status: if is_mapped {
            RecordingStatus::Initialized
        } else {
            RecordingStatus::Skipped
        },
        failed_at_stage: "download",
        stage: None,
    }
}

pub fn on_trim_failure() -> FailureOutcome {
    FailureOutcome::RollbackAndFail {
        rollback_status: RecordingStatus::Downloaded,
        failed_at_stage: "trim",
        stage: Some(StageType::Trim),
    }
}

/// Decide the outcome for a transcribe/topics/subtitles failure.
///
/// `stage` is the stage that failed; `allow_errors` is the resolved
/// `transcription.allow_errors` config value.
pub fn on_transcription_family_failure(stage: StageType, allow_errors: bool) -> FailureOutcome {
    if allow_errors {
        let dependents = match stage {
            StageType::Transcribe => {
                vec![StageType::ExtractTopics, StageType::GenerateSubtitles]
            }
            StageType::ExtractTopics | StageType::GenerateSubtitles => vec![],
            StageType::Trim => vec![],
        };
        FailureOutcome::CascadeSkip {
            stage,
            dependents,
            failed_at_stage: stage_label(stage),
        }
    } else {
        FailureOutcome::RollbackAndFail {
            rollback_status: RecordingStatus::Downloaded,
            failed_at_stage: stage_label(stage),
            stage: Some(stage),
        }
    }
}

pub fn on_upload_failure(target_type: impl Into<String>) -> FailureOutcome {
    FailureOutcome::UploadFailed {
        target_type: target_type.into(),
    }
}

fn stage_label(stage: StageType) -> &'static str {
    match stage {
        StageType::Trim => "trim",
        StageType::Transcribe => "transcribe",
        StageType::ExtractTopics => "extract_topics",
        StageType::GenerateSubtitles => "generate_subtitles",
    }
}

/// Whether clearing `recording.failed` on retry is permitted: only when
/// the stage being retried is the one recorded in `failed_at_stage` (§4.8
/// retry edge case — another stage may have failed later).
pub fn should_clear_failed_on_retry(failed_at_stage: Option<&str>, retrying_stage_label: &str) -> bool {
    failed_at_stage == Some(retrying_stage_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_strings_are_truncated() {
        let long = "x".repeat(2000);
        assert_eq!(truncate_error(&long).chars().count(), MAX_ERROR_LEN);
    }

    #[test]
    fn download_failure_rolls_back_per_mapped_flag() {
        assert_eq!(
            on_download_failure(true),
            FailureOutcome::RollbackAndFail {
                rollback_status: RecordingStatus::Initialized,
                failed_at_stage: "download",
                stage: None,
            }
        );
        assert_eq!(
            on_download_failure(false),
            FailureOutcome::RollbackAndFail {
                rollback_status: RecordingStatus::Skipped,
                failed_at_stage: "download",
                stage: None,
            }
        );
    }

    #[test]
    fn cascade_skip_only_from_transcribe() {
        let outcome = on_transcription_family_failure(StageType::Transcribe, true);
        assert_eq!(
            outcome,
            FailureOutcome::CascadeSkip {
                stage: StageType::Transcribe,
                dependents: vec![StageType::ExtractTopics, StageType::GenerateSubtitles],
                failed_at_stage: "transcribe",
            }
        );
        let outcome = on_transcription_family_failure(StageType::ExtractTopics, true);
        assert_eq!(
            outcome,
            FailureOutcome::CascadeSkip {
                stage: StageType::ExtractTopics,
                dependents: vec![],
                failed_at_stage: "extract_topics",
            }
        );
    }

    #[test]
    fn retry_clears_failed_only_for_matching_stage() {
        assert!(should_clear_failed_on_retry(Some("download"), "download"));
        assert!(!should_clear_failed_on_retry(Some("trim"), "download"));
        assert!(!should_clear_failed_on_retry(None, "download"));
    }
}
