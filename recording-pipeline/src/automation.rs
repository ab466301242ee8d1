//! Automation scheduler (§4.12) — cron-evaluated jobs that drive source sync
//! (§4.10) and the pipeline orchestrator (§4.8) together. Cron evaluation and
//! `next_run_at` computation are grounded on the teacher's
//! `domain::filter::evaluator::FilterEvaluator::evaluate_cron` (`cron::Schedule`
//! parsed per call, times converted into the job's IANA timezone via
//! `chrono_tz::Tz` before comparison); the poll loop is grounded on the same
//! `database::maintenance::MaintenanceScheduler` interval-loop shape used by
//! `retention::RetentionController`.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{error, info, warn};

use crate::config::AutomationConfig;
use crate::config_resolver::ManualOverride;
use crate::database::repositories::RecordingFilters;
use crate::domain::{AutomationJob, RecordingStatus};
use crate::services::Services;
use crate::template_matcher;
use crate::{source_sync, Error, Result};

/// Outcome of one job run (real or dry-run), returned to `automation.run` /
/// `automation.dry_run` callers (§6 control plane).
#[derive(Debug, Clone, Default)]
pub struct JobRunResult {
    pub job_id: i64,
    pub sources_synced: usize,
    pub candidates_considered: usize,
    pub matched_and_launched: usize,
    pub skipped_unmatched: usize,
    pub dry_run: bool,
}

fn parse_next_run(schedule: &str, timezone: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let parsed = cron::Schedule::from_str(schedule)
        .map_err(|e| Error::Configuration(format!("invalid cron expression '{schedule}': {e}")))?;
    let tz: Tz = timezone
        .parse()
        .map_err(|_| Error::Configuration(format!("'{timezone}' is not a valid IANA timezone")))?;

    let after_in_tz = after.with_timezone(&tz);
    let next = parsed
        .after(&after_in_tz)
        .next()
        .ok_or_else(|| Error::Configuration(format!("cron expression '{schedule}' has no future occurrences")))?;
    Ok(next.with_timezone(&Utc))
}

/// Which `InputSource`s a job should sync before matching (§4.12 step 2):
/// the union of `matching_rules.source_ids` across the job's templates, or
/// every active source if any template has no source filter. Template
/// `source_ids` are stored as strings; here they are resolved against
/// `InputSource.id` (an operator-facing decision documented in DESIGN.md —
/// §4.4's own per-recording source filter instead compares against the
/// provider-native per-entry source id, a deliberately different use of the
/// same field).
async fn sources_to_sync(services: &Arc<Services>, user_id: i64, job: &AutomationJob) -> Result<Vec<i64>> {
    let mut any_unfiltered = false;
    let mut union: Vec<i64> = Vec::new();

    for &template_id in &job.template_ids {
        let template = match services.templates.get_by_id(template_id, user_id).await {
            Ok(t) => t,
            Err(e) => {
                warn!(template_id, error = %e, "automation job references missing template, skipping it");
                continue;
            }
        };
        if template.matching_rules.source_ids.is_empty() {
            any_unfiltered = true;
            continue;
        }
        for sid in &template.matching_rules.source_ids {
            match sid.parse::<i64>() {
                Ok(id) if !union.contains(&id) => union.push(id),
                Ok(_) => {}
                Err(_) => warn!(source_id = %sid, template_id, "template source_ids entry is not a numeric input source id, ignoring"),
            }
        }
    }

    if any_unfiltered {
        let active = services.input_sources.list_active_by_user(user_id).await?;
        return Ok(active.into_iter().map(|s| s.id).collect());
    }
    Ok(union)
}

fn default_statuses(job: &AutomationJob) -> Vec<RecordingStatus> {
    if job.filters.status.is_empty() {
        return vec![RecordingStatus::Initialized];
    }
    job.filters
        .status
        .iter()
        .filter_map(|s| match s.parse::<RecordingStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                warn!(status = %s, "automation job filter names an unknown recording status, ignoring");
                None
            }
        })
        .collect()
}

/// Runs one job: syncs its sources, finds candidates, and either submits a
/// pipeline run per matched candidate (`dry_run = false`) or only counts what
/// would happen (`dry_run = true`). Shared by `automation.run` and
/// `automation.dry_run` (§6) — the only difference is whether step 5 submits.
pub async fn run_job(services: &Arc<Services>, job: &AutomationJob, dry_run: bool) -> Result<JobRunResult> {
    let user_id = job.user_id;
    let mut result = JobRunResult {
        job_id: job.id,
        dry_run,
        ..Default::default()
    };

    // Step 1: load active, non-draft templates named by the job.
    let mut templates = Vec::new();
    for &template_id in &job.template_ids {
        match services.templates.get_by_id(template_id, user_id).await {
            Ok(t) if t.is_active && !t.is_draft => templates.push(t),
            Ok(_) => {}
            Err(e) => warn!(template_id, error = %e, "automation job template lookup failed"),
        }
    }
    if templates.is_empty() {
        warn!(job_id = job.id, "no active non-draft templates for job, aborting run");
        return Err(Error::Configuration(format!(
            "automation job {} has no active, non-draft templates",
            job.id
        )));
    }

    // Step 2-3: sync the relevant sources, bounded by sync_config.sync_days.
    let source_ids = sources_to_sync(services, user_id, job).await?;
    let to_date = Utc::now();
    let from_date = to_date - Duration::days(job.sync_config.sync_days as i64);
    for source_id in source_ids {
        if dry_run {
            // A dry run still needs to see what sync *would* find, but must
            // not mutate state. Source sync always upserts recordings, so a
            // dry run instead skips the sync step and matches only against
            // recordings already on record — the same limitation the
            // control plane surfaces to callers of `automation.dry_run`.
            continue;
        }
        match source_sync::sync_one(services, source_id, user_id, from_date, to_date).await {
            Ok(_) => result.sources_synced += 1,
            Err(e) => warn!(source_id, job_id = job.id, error = %e, "source sync failed during automation run, continuing"),
        }
    }

    // Step 4: candidates matching filters.status within the sync window.
    let statuses = default_statuses(job);
    let filters = RecordingFilters {
        status_in: statuses,
        template_id: None,
        input_source_id: None,
        include_deleted: false,
    };
    let candidates = services
        .recordings
        .list_by_user(user_id, &filters, crate::database::repositories::Pagination { limit: 10_000, offset: 0 })
        .await?;

    let in_window: Vec<_> = candidates
        .into_iter()
        .filter(|r| r.start_time >= from_date && r.start_time <= to_date)
        .filter(|r| !(job.filters.exclude_blank && r.blank_record))
        .collect();
    result.candidates_considered = in_window.len();

    // Step 5: match + launch (or count, for dry runs).
    for recording in in_window {
        let source_id = recording
            .source_metadata
            .as_ref()
            .and_then(|sm| sm.source_id.as_deref());
        let matched = template_matcher::find_match(&recording.display_name, source_id, &templates);
        match matched {
            Some(m) => {
                result.matched_and_launched += 1;
                if dry_run {
                    continue;
                }
                if let Err(e) = services.recordings.set_template(recording.id, m.template.id).await {
                    warn!(recording_id = recording.id, error = %e, "failed to bind matched template");
                    continue;
                }
                if let Err(e) = services.templates.mark_used(m.template.id).await {
                    warn!(template_id = m.template.id, error = %e, "failed to mark template as used");
                }
                let manual_override = job.processing_config.clone().map(|pc| ManualOverride {
                    runtime_template_id: None,
                    processing_config: Some(pc),
                    output_config: None,
                });
                // §4.14: admission is gated the same way a manual
                // `recordings.run` is; a candidate that would blow the
                // user's quota is skipped rather than aborting the whole
                // job run, since the remaining candidates are independent.
                if let Err(e) = services.quota.check_admission(user_id).await {
                    warn!(recording_id = recording.id, error = %e, "quota exceeded, skipping automation candidate");
                    continue;
                }
                match crate::pipeline::launch_chain(services.clone(), recording.id, user_id, manual_override).await {
                    Ok(_) => {
                        if let Err(e) = services.quota.record_admission(user_id).await {
                            warn!(recording_id = recording.id, error = %e, "failed to record quota admission");
                        }
                    }
                    Err(e) => {
                        warn!(recording_id = recording.id, error = %e, "failed to launch pipeline for automation candidate");
                    }
                }
            }
            None => {
                result.skipped_unmatched += 1;
                if !dry_run {
                    if let Err(e) = services
                        .recordings
                        .set_status(recording.id, RecordingStatus::Skipped)
                        .await
                    {
                        warn!(recording_id = recording.id, error = %e, "failed to mark unmatched candidate skipped");
                    }
                }
            }
        }
    }

    Ok(result)
}

/// Computes and persists `next_run_at` for every due job whose schedule
/// still has a future occurrence, after running it (§4.12 step 6).
async fn tick_due_jobs(services: &Arc<Services>) {
    let now = Utc::now();
    let due = match services.automation_jobs.list_due(now).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!(error = %e, "failed to list due automation jobs");
            return;
        }
    };

    for job in due {
        info!(job_id = job.id, user_id = job.user_id, "automation job due, running");
        let outcome = run_job(services, &job, false).await;
        match &outcome {
            Ok(r) => info!(
                job_id = job.id,
                sources_synced = r.sources_synced,
                candidates = r.candidates_considered,
                launched = r.matched_and_launched,
                skipped = r.skipped_unmatched,
                "automation job run complete"
            ),
            Err(e) => warn!(job_id = job.id, error = %e, "automation job run failed"),
        }

        let next_run_at = match parse_next_run(&job.schedule, &job.schedule_timezone, now) {
            Ok(next) => Some(next),
            Err(e) => {
                error!(job_id = job.id, error = %e, "failed to compute next_run_at, job will not be rescheduled automatically");
                None
            }
        };
        if let Err(e) = services.automation_jobs.record_run(job.id, next_run_at).await {
            error!(job_id = job.id, error = %e, "failed to persist automation job run bookkeeping");
        }
    }
}

/// Background poller that evaluates due automation jobs on a fixed cadence.
/// Grounded on `retention::RetentionController`'s loop shape (itself
/// grounded on the teacher's `MaintenanceScheduler`).
pub struct AutomationScheduler {
    services: Arc<Services>,
    config: AutomationConfig,
    running: Arc<AtomicBool>,
}

impl AutomationScheduler {
    pub fn new(services: Arc<Services>, config: AutomationConfig) -> Self {
        Self {
            services,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.running.store(true, Ordering::SeqCst);
            scheduler.run_loop().await;
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_loop(&self) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.tick().await;

        while self.running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.services.cancellation.cancelled() => break,
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tick_due_jobs(&self.services).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn next_run_after_is_strictly_future() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let next = parse_next_run("0 0 9 * * *", "UTC", now).unwrap();
        assert!(next > now);
    }

    #[test]
    fn invalid_cron_expression_is_configuration_error() {
        let now = Utc::now();
        let err = parse_next_run("not a cron expr", "UTC", now).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn invalid_timezone_is_configuration_error() {
        let now = Utc::now();
        let err = parse_next_run("0 0 9 * * *", "Not/AZone", now).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
