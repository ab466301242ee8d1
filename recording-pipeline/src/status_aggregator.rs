//! Status aggregator (§4.5) — a pure function over a recording's delete
//! state, stages, and targets. Called as the final step of any mutating
//! repository method (§5's ordering guarantee).

use chrono::{DateTime, Utc};

use crate::domain::{OutputTarget, ProcessingStage, RecordingStatus, StageStatus, TargetStatus};

/// Minimal view needed to compute the aggregate; keeps the function usable
/// without a full `Recording` (e.g. in property tests).
pub struct AggregateInput<'a> {
    pub current_status: RecordingStatus,
    pub deleted: bool,
    pub deletion_reason: Option<&'a str>,
    pub expire_at: Option<DateTime<Utc>>,
    pub stages: &'a [ProcessingStage],
    pub targets: &'a [OutputTarget],
    pub now: DateTime<Utc>,
}

pub fn compute_aggregate_status(input: &AggregateInput<'_>) -> RecordingStatus {
    // 1. EXPIRED (explicit reason).
    if input.deleted && input.deletion_reason == Some("expired") {
        return RecordingStatus::Expired;
    }
    // 2. EXPIRED (timestamp).
    if let Some(expire_at) = input.expire_at {
        if expire_at <= input.now {
            return RecordingStatus::Expired;
        }
    }
    // 3. Special statuses set by source sync are sticky.
    if matches!(
        input.current_status,
        RecordingStatus::Skipped | RecordingStatus::PendingSource
    ) {
        return input.current_status;
    }
    // 4. IN_PROGRESS stage takes priority over base statuses.
    if input
        .stages
        .iter()
        .any(|s| s.status == StageStatus::InProgress)
    {
        return RecordingStatus::Processing;
    }
    // 5. Base statuses, kept as-is.
    if matches!(
        input.current_status,
        RecordingStatus::Initialized | RecordingStatus::Downloading | RecordingStatus::Downloaded
    ) {
        return input.current_status;
    }
    // 6/7. Evaluate stage completion, then destinations.
    if !input.stages.is_empty() {
        let active: Vec<&ProcessingStage> = input
            .stages
            .iter()
            .filter(|s| s.status != StageStatus::Skipped)
            .collect();
        if !active.is_empty() && active.iter().all(|s| s.status == StageStatus::Completed) {
            return evaluate_targets(input.targets);
        }
        if input
            .stages
            .iter()
            .all(|s| matches!(s.status, StageStatus::Pending | StageStatus::Skipped))
        {
            return RecordingStatus::Processed;
        }
        // Stages present but not all completed and not all pending/skipped
        // (e.g. a FAILED stage) — fall through to destination evaluation,
        // which degrades to PROCESSED when there are no uploads either.
        return evaluate_targets(input.targets);
    }
    // No stages: evaluate destinations directly.
    evaluate_targets(input.targets)
}

fn evaluate_targets(targets: &[OutputTarget]) -> RecordingStatus {
    if targets.is_empty() {
        return RecordingStatus::Processed;
    }
    if targets.iter().any(|t| t.status == TargetStatus::Uploading) {
        return RecordingStatus::Uploading;
    }
    if targets.iter().all(|t| t.status == TargetStatus::Uploaded) {
        return RecordingStatus::Ready;
    }
    RecordingStatus::Processed
}

/// Admission predicates derived from the aggregate (§4.5).
pub fn should_allow_download(status: RecordingStatus) -> bool {
    status == RecordingStatus::Initialized
}

pub fn should_allow_run(status: RecordingStatus) -> bool {
    !matches!(
        status,
        RecordingStatus::Skipped | RecordingStatus::PendingSource | RecordingStatus::Expired
    )
}

pub fn should_allow_transcription(stages: &[ProcessingStage]) -> bool {
    stages
        .iter()
        .find(|s| s.stage_type == crate::domain::StageType::Transcribe)
        .map(|s| matches!(s.status, StageStatus::Pending | StageStatus::Failed))
        .unwrap_or(true)
}

/// Can this destination be (re-)uploaded? Uploads require every non-skipped
/// stage to be COMPLETED, and the target must not already be UPLOADED or
/// in-flight (upload idempotence, §8 property 6).
pub fn should_allow_upload(status: RecordingStatus, target: Option<&OutputTarget>) -> bool {
    if matches!(
        status,
        RecordingStatus::Skipped | RecordingStatus::PendingSource | RecordingStatus::Expired
    ) {
        return false;
    }
    if let Some(target) = target {
        if matches!(target.status, TargetStatus::Uploaded | TargetStatus::Uploading) {
            return false;
        }
    }
    matches!(
        status,
        RecordingStatus::Processed | RecordingStatus::Uploading | RecordingStatus::Ready
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageType;

    fn stage(stage_type: StageType, status: StageStatus) -> ProcessingStage {
        let mut s = ProcessingStage::new(1, stage_type);
        s.status = status;
        s
    }

    fn base_input<'a>(
        status: RecordingStatus,
        stages: &'a [ProcessingStage],
        targets: &'a [OutputTarget],
    ) -> AggregateInput<'a> {
        AggregateInput {
            current_status: status,
            deleted: false,
            deletion_reason: None,
            expire_at: None,
            stages,
            targets,
            now: Utc::now(),
        }
    }

    #[test]
    fn all_completed_stages_with_no_targets_is_processed() {
        let stages = vec![stage(StageType::Trim, StageStatus::Completed)];
        let input = base_input(RecordingStatus::Processed, &stages, &[]);
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Processed);
    }

    #[test]
    fn in_progress_stage_overrides_downloaded() {
        let stages = vec![stage(StageType::Trim, StageStatus::InProgress)];
        let input = base_input(RecordingStatus::Downloaded, &stages, &[]);
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Processing);
    }

    #[test]
    fn skipped_is_sticky() {
        let input = base_input(RecordingStatus::Skipped, &[], &[]);
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Skipped);
    }

    #[test]
    fn expire_at_in_past_wins_over_everything() {
        let mut input = base_input(RecordingStatus::Downloaded, &[], &[]);
        input.expire_at = Some(Utc::now() - chrono::Duration::seconds(1));
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Expired);
    }

    #[test]
    fn all_uploaded_targets_is_ready() {
        let stages = vec![stage(StageType::Trim, StageStatus::Completed)];
        let mut target = OutputTarget::new(1, "youtube", None);
        target.status = TargetStatus::Uploaded;
        let targets = vec![target];
        let input = base_input(RecordingStatus::Processed, &stages, &targets);
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Ready);
    }

    #[test]
    fn cascade_skip_scenario_s3() {
        // TRANSCRIBE skipped (error), dependents skipped (parent_failed), TRIM completed.
        let stages = vec![
            stage(StageType::Trim, StageStatus::Completed),
            stage(StageType::Transcribe, StageStatus::Skipped),
            stage(StageType::ExtractTopics, StageStatus::Skipped),
            stage(StageType::GenerateSubtitles, StageStatus::Skipped),
        ];
        let input = base_input(RecordingStatus::Processed, &stages, &[]);
        assert_eq!(compute_aggregate_status(&input), RecordingStatus::Processed);
    }
}
