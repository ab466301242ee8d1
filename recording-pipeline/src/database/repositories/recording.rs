//! Recording repository (§4.2) — the sole mutator of `Recording` rows.
//!
//! Every mutating method ends by recomputing and persisting the aggregate
//! status via `status_aggregator`, so callers never need to derive status
//! themselves.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::artifact_store::ArtifactStore;
use crate::database::converters::*;
use crate::database::models::{
    OutputTargetRow, ProcessingStageRow, RecordingRow, SourceMetadataRow,
};
use crate::database::repositories::errors::{RepositoryError, RepositoryResult};
use crate::domain::{
    DeleteState, OutputTarget, ProcessingStage, Recording, RecordingStatus, SourceMetadata,
    StageType,
};
use crate::status_aggregator::{compute_aggregate_status, AggregateInput};
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RecordingFilters {
    pub status_in: Vec<RecordingStatus>,
    pub template_id: Option<i64>,
    pub input_source_id: Option<i64>,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

#[async_trait]
pub trait RecordingRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<Recording>;
    async fn get_by_ids(&self, ids: &[i64], user_id: i64) -> Result<Vec<Recording>>;
    async fn list_by_user(
        &self,
        user_id: i64,
        filters: &RecordingFilters,
        pagination: Pagination,
    ) -> Result<Vec<Recording>>;

    #[allow(clippy::too_many_arguments)]
    async fn create_or_update(
        &self,
        user_id: i64,
        input_source_id: i64,
        source_key: &str,
        display_name: &str,
        start_time: DateTime<Utc>,
        is_mapped: bool,
        blank_record: bool,
        template_id: Option<i64>,
        source_metadata: Option<&SourceMetadata>,
    ) -> Result<Recording>;

    async fn soft_delete(
        &self,
        recording_id: i64,
        reason: &str,
        soft_delete_days: i64,
        hard_delete_days: i64,
    ) -> Result<Recording>;
    async fn auto_expire(
        &self,
        recording_id: i64,
        soft_delete_days: i64,
        hard_delete_days: i64,
    ) -> Result<Recording>;
    /// Fails unless `delete_state == soft` (§4.2). Clears every deletion
    /// field and sets a fresh `expire_at = now + auto_expire_days` so the
    /// restored recording re-enters the auto-expire pass on its own clock
    /// rather than never expiring again.
    async fn restore(&self, recording_id: i64, auto_expire_days: i64) -> Result<Recording>;
    /// Guarded: re-reads `delete_state` under the same transaction and
    /// aborts if it is no longer `soft` (race protection, §4.2).
    async fn cleanup_recording_files(
        &self,
        recording_id: i64,
        store: &ArtifactStore,
        user_slug: u32,
    ) -> Result<u64>;
    async fn set_expire_at(&self, recording_id: i64, expire_at: Option<DateTime<Utc>>) -> Result<()>;
    /// `deleted = 0 AND expire_at <= now` (retention controller pass 1, §4.13).
    async fn list_auto_expire_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>>;
    /// `delete_state = soft AND soft_deleted_at <= now` (pass 2).
    async fn list_soft_cleanup_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>>;
    /// `hard_delete_at <= now` (pass 3, regardless of current `delete_state`).
    async fn list_hard_delete_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>>;
    async fn delete(&self, recording_id: i64, store: &ArtifactStore, user_slug: u32)
        -> Result<()>;

    async fn set_status(&self, recording_id: i64, status: RecordingStatus) -> Result<()>;
    /// Binds a template match found after the fact (automation scheduler,
    /// §4.12 step 5 — sync already ran without a match, a later template
    /// becomes active/non-draft, or an operator rebinds manually).
    async fn set_template(&self, recording_id: i64, template_id: i64) -> Result<()>;
    /// `recordings.pause`/`recordings.resume` (§6 control plane).
    async fn set_on_pause(&self, recording_id: i64, on_pause: bool) -> Result<()>;
    async fn set_failed(
        &self,
        recording_id: i64,
        failed_at_stage: Option<&str>,
        failed_reason: Option<&str>,
    ) -> Result<()>;
    /// `recordings.reset` (§6 control plane) — clears failure fields so a
    /// subsequent `recordings.run` is eligible again.
    async fn clear_failed(&self, recording_id: i64) -> Result<()>;
    async fn set_local_video_path(&self, recording_id: i64, path: Option<&str>) -> Result<()>;
    async fn set_processed_paths(
        &self,
        recording_id: i64,
        video: Option<&str>,
        audio: Option<&str>,
    ) -> Result<()>;
    async fn set_transcription_dir(&self, recording_id: i64, dir: Option<&str>) -> Result<()>;
    async fn set_source_download_token(
        &self,
        recording_id: i64,
        token: Option<&str>,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<()>;
    async fn set_topics(
        &self,
        recording_id: i64,
        main_topics: Option<&[String]>,
        topics_with_timestamps: Option<&[crate::domain::recording::TopicTimestamp]>,
    ) -> Result<()>;
    async fn set_pipeline_started(&self, recording_id: i64, at: DateTime<Utc>) -> Result<()>;
    async fn set_pipeline_completed(&self, recording_id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn upsert_stage(&self, stage: &ProcessingStage) -> Result<ProcessingStage>;
    async fn get_or_create_stage(
        &self,
        recording_id: i64,
        stage_type: StageType,
    ) -> Result<ProcessingStage>;
    async fn recompute_status(&self, recording_id: i64) -> Result<RecordingStatus>;

    async fn get_or_create_output_target(
        &self,
        recording_id: i64,
        target_type: &str,
        preset_id: Option<i64>,
    ) -> Result<OutputTarget>;
    async fn mark_output_uploading(&self, target_id: i64) -> Result<OutputTarget>;
    async fn mark_output_failed(&self, target_id: i64, reason: &str) -> Result<OutputTarget>;
    #[allow(clippy::too_many_arguments)]
    async fn save_upload_result(
        &self,
        target_id: i64,
        external_video_id: Option<&str>,
        external_url: Option<&str>,
        result_meta: Option<serde_json::Value>,
    ) -> Result<OutputTarget>;
}

pub struct SqliteRecordingRepository {
    pool: SqlitePool,
}

impl SqliteRecordingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_row(&self, id: i64, user_id: i64) -> RepositoryResult<RecordingRow> {
        sqlx::query_as::<_, RecordingRow>(
            "SELECT * FROM recordings WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Recording", id.to_string()))
    }

    async fn load_stages(&self, recording_id: i64) -> RepositoryResult<Vec<ProcessingStage>> {
        let rows = sqlx::query_as::<_, ProcessingStageRow>(
            "SELECT * FROM processing_stages WHERE recording_id = ? ORDER BY id",
        )
        .bind(recording_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn load_targets(&self, recording_id: i64) -> RepositoryResult<Vec<OutputTarget>> {
        let rows = sqlx::query_as::<_, OutputTargetRow>(
            "SELECT * FROM output_targets WHERE recording_id = ? ORDER BY id",
        )
        .bind(recording_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| r.into_domain()).collect()
    }

    async fn load_source_metadata(
        &self,
        recording_id: i64,
    ) -> RepositoryResult<Option<SourceMetadata>> {
        let row = sqlx::query_as::<_, SourceMetadataRow>(
            "SELECT * FROM source_metadata WHERE recording_id = ?",
        )
        .bind(recording_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.into_domain()).transpose()
    }

    async fn hydrate(&self, row: RecordingRow) -> RepositoryResult<Recording> {
        let id = row.id;
        let mut rec = row.into_domain()?;
        rec.stages = Some(self.load_stages(id).await?);
        rec.targets = Some(self.load_targets(id).await?);
        rec.source_metadata = self.load_source_metadata(id).await?;
        Ok(rec)
    }

    async fn recompute_status_inner(&self, recording_id: i64) -> RepositoryResult<RecordingStatus> {
        let row = sqlx::query_as::<_, RecordingRow>("SELECT * FROM recordings WHERE id = ?")
            .bind(recording_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Recording", recording_id.to_string()))?;
        let current_status = parse_enum::<RecordingStatus>(&row.status, "recording status")?;
        let deleted = row.deleted;
        let deletion_reason = row.deletion_reason.clone();
        let expire_at = optional_string_to_datetime(&row.expire_at)?;
        let stages = self.load_stages(recording_id).await?;
        let targets = self.load_targets(recording_id).await?;

        let new_status = compute_aggregate_status(&AggregateInput {
            current_status,
            deleted,
            deletion_reason: deletion_reason.as_deref(),
            expire_at,
            stages: &stages,
            targets: &targets,
            now: Utc::now(),
        });

        sqlx::query("UPDATE recordings SET status = ? WHERE id = ?")
            .bind(new_status.to_string())
            .bind(recording_id)
            .execute(&self.pool)
            .await?;

        Ok(new_status)
    }
}

#[async_trait]
impl RecordingRepository for SqliteRecordingRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<Recording> {
        let row = self.load_row(id, user_id).await?;
        Ok(self.hydrate(row).await?)
    }

    async fn get_by_ids(&self, ids: &[i64], user_id: i64) -> Result<Vec<Recording>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.get_by_id(*id, user_id).await?);
        }
        Ok(out)
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        filters: &RecordingFilters,
        pagination: Pagination,
    ) -> Result<Vec<Recording>> {
        let mut sql = String::from("SELECT * FROM recordings WHERE user_id = ?");
        if !filters.include_deleted {
            sql.push_str(" AND deleted = 0");
        }
        if !filters.status_in.is_empty() {
            let list = filters
                .status_in
                .iter()
                .map(|s| format!("'{}'", s))
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&format!(" AND status IN ({list})"));
        }
        if filters.template_id.is_some() {
            sql.push_str(" AND template_id = ?");
        }
        if filters.input_source_id.is_some() {
            sql.push_str(" AND input_source_id = ?");
        }
        sql.push_str(" ORDER BY start_time DESC LIMIT ? OFFSET ?");

        let mut query = sqlx::query_as::<_, RecordingRow>(&sql).bind(user_id);
        if let Some(tid) = filters.template_id {
            query = query.bind(tid);
        }
        if let Some(sid) = filters.input_source_id {
            query = query.bind(sid);
        }
        query = query.bind(pagination.limit).bind(pagination.offset);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    async fn create_or_update(
        &self,
        user_id: i64,
        input_source_id: i64,
        source_key: &str,
        display_name: &str,
        start_time: DateTime<Utc>,
        is_mapped: bool,
        blank_record: bool,
        template_id: Option<i64>,
        source_metadata: Option<&SourceMetadata>,
    ) -> Result<Recording> {
        let existing = sqlx::query_as::<_, RecordingRow>(
            r#"
            SELECT r.* FROM recordings r
            JOIN source_metadata sm ON sm.recording_id = r.id
            WHERE r.user_id = ? AND r.input_source_id = ? AND sm.source_id = ? AND r.start_time = ?
            "#,
        )
        .bind(user_id)
        .bind(input_source_id)
        .bind(source_key)
        .bind(datetime_to_string(&start_time))
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let id = if let Some(row) = existing {
            let status = parse_enum::<RecordingStatus>(&row.status, "recording status")
                .map_err(Error::from)?;
            if row.deleted || status == RecordingStatus::Ready {
                return Ok(self.hydrate(row).await?);
            }
            if status == RecordingStatus::PendingSource {
                let new_status = if is_mapped {
                    RecordingStatus::Initialized
                } else {
                    RecordingStatus::Skipped
                };
                sqlx::query("UPDATE recordings SET status = ?, is_mapped = ?, display_name = ?, template_id = COALESCE(?, template_id) WHERE id = ?")
                    .bind(new_status.to_string())
                    .bind(is_mapped)
                    .bind(display_name)
                    .bind(template_id)
                    .bind(row.id)
                    .execute(&self.pool)
                    .await
                    .map_err(RepositoryError::from)?;
            }
            row.id
        } else {
            let status = if blank_record {
                RecordingStatus::Skipped
            } else if is_mapped {
                RecordingStatus::Initialized
            } else {
                RecordingStatus::PendingSource
            };
            let inserted: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO recordings (
                    user_id, input_source_id, template_id, display_name, start_time,
                    status, is_mapped, blank_record, delete_state
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'active')
                RETURNING id
                "#,
            )
            .bind(user_id)
            .bind(input_source_id)
            .bind(template_id)
            .bind(display_name)
            .bind(datetime_to_string(&start_time))
            .bind(status.to_string())
            .bind(is_mapped)
            .bind(blank_record)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

            if let Some(meta) = source_metadata {
                let row = SourceMetadataRow::from_domain(meta).map_err(Error::from)?;
                sqlx::query(
                    r#"
                    INSERT INTO source_metadata (
                        recording_id, source_id, download_url, passcode,
                        reported_duration_seconds, reported_size_bytes,
                        download_token, download_token_fetched_at,
                        still_processing_upstream, extra
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(inserted.0)
                .bind(&row.source_id)
                .bind(&row.download_url)
                .bind(&row.passcode)
                .bind(row.reported_duration_seconds)
                .bind(row.reported_size_bytes)
                .bind(&row.download_token)
                .bind(&row.download_token_fetched_at)
                .bind(row.still_processing_upstream)
                .bind(&row.extra)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
            }
            inserted.0
        };

        self.recompute_status_inner(id).await.map_err(Error::from)?;
        self.get_by_id(id, user_id).await
    }

    async fn soft_delete(
        &self,
        recording_id: i64,
        reason: &str,
        soft_delete_days: i64,
        hard_delete_days: i64,
    ) -> Result<Recording> {
        let now = Utc::now();
        let soft_at = now + Duration::days(soft_delete_days);
        let hard_at = soft_at + Duration::days(hard_delete_days);
        sqlx::query(
            r#"
            UPDATE recordings SET
                delete_state = 'soft', deleted = 1, deletion_reason = ?, deleted_at = ?,
                soft_deleted_at = ?, hard_delete_at = ?
            WHERE id = ?
            "#,
        )
        .bind(reason)
        .bind(datetime_to_string(&now))
        .bind(datetime_to_string(&soft_at))
        .bind(datetime_to_string(&hard_at))
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        self.recompute_status_inner(recording_id)
            .await
            .map_err(Error::from)?;
        let row = self.load_row_any(recording_id).await?;
        Ok(self.hydrate(row).await?)
    }

    async fn auto_expire(
        &self,
        recording_id: i64,
        soft_delete_days: i64,
        hard_delete_days: i64,
    ) -> Result<Recording> {
        self.soft_delete(recording_id, "expired", soft_delete_days, hard_delete_days)
            .await
    }

    async fn restore(&self, recording_id: i64, auto_expire_days: i64) -> Result<Recording> {
        let row = self.load_row_any(recording_id).await?;
        let delete_state = parse_enum::<DeleteState>(&row.delete_state, "delete state")
            .map_err(Error::from)?;
        if delete_state != DeleteState::Soft {
            return Err(Error::validation(format!(
                "recording {recording_id} cannot be restored from delete_state={delete_state}"
            )));
        }
        let fresh_expire_at = Utc::now() + Duration::days(auto_expire_days);
        sqlx::query(
            r#"
            UPDATE recordings SET
                delete_state = 'active', deleted = 0, deletion_reason = NULL,
                deleted_at = NULL, soft_deleted_at = NULL, hard_delete_at = NULL, expire_at = ?
            WHERE id = ?
            "#,
        )
        .bind(datetime_to_string(&fresh_expire_at))
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        self.recompute_status_inner(recording_id)
            .await
            .map_err(Error::from)?;
        let row = self.load_row_any(recording_id).await?;
        Ok(self.hydrate(row).await?)
    }

    async fn cleanup_recording_files(
        &self,
        recording_id: i64,
        store: &ArtifactStore,
        user_slug: u32,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let delete_state: (String,) =
            sqlx::query_as("SELECT delete_state FROM recordings WHERE id = ?")
                .bind(recording_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(RepositoryError::from)?
                .ok_or_else(|| RepositoryError::not_found("Recording", recording_id.to_string()))?;
        if delete_state.0 != "soft" {
            return Err(Error::Race(format!(
                "recording {recording_id} is no longer in delete_state=soft, skipping cleanup"
            )));
        }
        sqlx::query(
            r#"
            UPDATE recordings SET
                delete_state = 'hard', local_video_path = NULL,
                processed_video_path = NULL, processed_audio_path = NULL
            WHERE id = ?
            "#,
        )
        .bind(recording_id)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;
        tx.commit().await.map_err(RepositoryError::from)?;

        let freed = store.remove_media_files(user_slug, recording_id).await?;
        Ok(freed)
    }

    async fn set_expire_at(&self, recording_id: i64, expire_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("UPDATE recordings SET expire_at = ? WHERE id = ?")
            .bind(optional_datetime_to_string(&expire_at))
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        self.recompute_status_inner(recording_id)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn list_auto_expire_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>> {
        let rows = sqlx::query_as::<_, RecordingRow>(
            "SELECT * FROM recordings WHERE deleted = 0 AND expire_at IS NOT NULL AND expire_at <= ?",
        )
        .bind(datetime_to_string(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    async fn list_soft_cleanup_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>> {
        let rows = sqlx::query_as::<_, RecordingRow>(
            "SELECT * FROM recordings WHERE delete_state = 'soft' AND soft_deleted_at IS NOT NULL AND soft_deleted_at <= ?",
        )
        .bind(datetime_to_string(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    async fn list_hard_delete_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Recording>> {
        let rows = sqlx::query_as::<_, RecordingRow>(
            "SELECT * FROM recordings WHERE hard_delete_at IS NOT NULL AND hard_delete_at <= ?",
        )
        .bind(datetime_to_string(&now))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    async fn delete(
        &self,
        recording_id: i64,
        store: &ArtifactStore,
        user_slug: u32,
    ) -> Result<()> {
        let row = self.load_row_any(recording_id).await?;
        let delete_state =
            parse_enum::<DeleteState>(&row.delete_state, "delete state").map_err(Error::from)?;
        if delete_state != DeleteState::Hard {
            self.cleanup_recording_files(recording_id, store, user_slug)
                .await?;
        }
        store
            .remove_transcription_dir(user_slug, recording_id)
            .await?;
        sqlx::query("DELETE FROM recordings WHERE id = ?")
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_status(&self, recording_id: i64, status: RecordingStatus) -> Result<()> {
        sqlx::query("UPDATE recordings SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_template(&self, recording_id: i64, template_id: i64) -> Result<()> {
        sqlx::query("UPDATE recordings SET template_id = ?, is_mapped = 1 WHERE id = ?")
            .bind(template_id)
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_on_pause(&self, recording_id: i64, on_pause: bool) -> Result<()> {
        sqlx::query("UPDATE recordings SET on_pause = ? WHERE id = ?")
            .bind(on_pause)
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_failed(
        &self,
        recording_id: i64,
        failed_at_stage: Option<&str>,
        failed_reason: Option<&str>,
    ) -> Result<()> {
        let truncated = failed_reason.map(crate::failure_handler::truncate_error);
        sqlx::query(
            "UPDATE recordings SET failed = 1, failed_at_stage = ?, failed_reason = ?, failed_at = ? WHERE id = ?",
        )
        .bind(failed_at_stage)
        .bind(truncated)
        .bind(datetime_to_string(&Utc::now()))
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn clear_failed(&self, recording_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE recordings SET failed = 0, failed_at_stage = NULL, failed_reason = NULL, failed_at = NULL WHERE id = ?",
        )
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_local_video_path(&self, recording_id: i64, path: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE recordings SET local_video_path = ? WHERE id = ?")
            .bind(path)
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_processed_paths(
        &self,
        recording_id: i64,
        video: Option<&str>,
        audio: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE recordings SET processed_video_path = ?, processed_audio_path = ? WHERE id = ?",
        )
        .bind(video)
        .bind(audio)
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_transcription_dir(&self, recording_id: i64, dir: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE recordings SET transcription_dir = ? WHERE id = ?")
            .bind(dir)
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_source_download_token(
        &self,
        recording_id: i64,
        token: Option<&str>,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE source_metadata SET download_token = ?, download_token_fetched_at = ? WHERE recording_id = ?",
        )
        .bind(token)
        .bind(optional_datetime_to_string(&fetched_at))
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_topics(
        &self,
        recording_id: i64,
        main_topics: Option<&[String]>,
        topics_with_timestamps: Option<&[crate::domain::recording::TopicTimestamp]>,
    ) -> Result<()> {
        let topics_json = main_topics.map(json_to_string).transpose().map_err(Error::from)?;
        let timestamps_json = topics_with_timestamps
            .map(json_to_string)
            .transpose()
            .map_err(Error::from)?;
        sqlx::query(
            "UPDATE recordings SET main_topics = ?, topics_with_timestamps = ? WHERE id = ?",
        )
        .bind(topics_json)
        .bind(timestamps_json)
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_pipeline_started(&self, recording_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE recordings SET pipeline_started_at = ? WHERE id = ?")
            .bind(datetime_to_string(&at))
            .bind(recording_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn set_pipeline_completed(&self, recording_id: i64, at: DateTime<Utc>) -> Result<()> {
        let started: Option<(Option<String>,)> =
            sqlx::query_as("SELECT pipeline_started_at FROM recordings WHERE id = ?")
                .bind(recording_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;
        let duration = started
            .and_then(|s| s.0)
            .and_then(|s| string_to_datetime(&s).ok())
            .map(|started_at| (at - started_at).num_milliseconds() as f64 / 1000.0);

        sqlx::query(
            "UPDATE recordings SET pipeline_completed_at = ?, pipeline_duration_seconds = ? WHERE id = ?",
        )
        .bind(datetime_to_string(&at))
        .bind(duration)
        .bind(recording_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn upsert_stage(&self, stage: &ProcessingStage) -> Result<ProcessingStage> {
        let row = ProcessingStageRow::from_domain(stage).map_err(Error::from)?;
        if stage.id == 0 {
            let inserted: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO processing_stages (
                    recording_id, stage_type, status, failed, failed_reason,
                    skip_reason, retry_count, max_retries, completed_at, stage_meta
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (recording_id, stage_type) DO UPDATE SET
                    status = excluded.status, failed = excluded.failed,
                    failed_reason = excluded.failed_reason, skip_reason = excluded.skip_reason,
                    retry_count = excluded.retry_count, max_retries = excluded.max_retries,
                    completed_at = excluded.completed_at, stage_meta = excluded.stage_meta
                RETURNING id
                "#,
            )
            .bind(row.recording_id)
            .bind(&row.stage_type)
            .bind(&row.status)
            .bind(row.failed)
            .bind(&row.failed_reason)
            .bind(&row.skip_reason)
            .bind(row.retry_count)
            .bind(row.max_retries)
            .bind(&row.completed_at)
            .bind(&row.stage_meta)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
            let mut updated = stage.clone();
            updated.id = inserted.0;
            Ok(updated)
        } else {
            sqlx::query(
                r#"
                UPDATE processing_stages SET
                    status = ?, failed = ?, failed_reason = ?, skip_reason = ?,
                    retry_count = ?, max_retries = ?, completed_at = ?, stage_meta = ?
                WHERE id = ?
                "#,
            )
            .bind(&row.status)
            .bind(row.failed)
            .bind(&row.failed_reason)
            .bind(&row.skip_reason)
            .bind(row.retry_count)
            .bind(row.max_retries)
            .bind(&row.completed_at)
            .bind(&row.stage_meta)
            .bind(row.id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
            Ok(stage.clone())
        }
    }

    async fn get_or_create_stage(
        &self,
        recording_id: i64,
        stage_type: StageType,
    ) -> Result<ProcessingStage> {
        let existing = sqlx::query_as::<_, ProcessingStageRow>(
            "SELECT * FROM processing_stages WHERE recording_id = ? AND stage_type = ?",
        )
        .bind(recording_id)
        .bind(stage_type.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if let Some(row) = existing {
            Ok(row.into_domain().map_err(Error::from)?)
        } else {
            let stage = ProcessingStage::new(recording_id, stage_type);
            self.upsert_stage(&stage).await
        }
    }

    async fn recompute_status(&self, recording_id: i64) -> Result<RecordingStatus> {
        Ok(self.recompute_status_inner(recording_id).await?)
    }

    async fn get_or_create_output_target(
        &self,
        recording_id: i64,
        target_type: &str,
        preset_id: Option<i64>,
    ) -> Result<OutputTarget> {
        let existing = sqlx::query_as::<_, OutputTargetRow>(
            "SELECT * FROM output_targets WHERE recording_id = ? AND target_type = ?",
        )
        .bind(recording_id)
        .bind(target_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if let Some(row) = existing {
            return Ok(row.into_domain().map_err(Error::from)?);
        }

        let inserted: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO output_targets (recording_id, target_type, status, preset_id)
            VALUES (?, ?, 'NOT_UPLOADED', ?)
            RETURNING id
            "#,
        )
        .bind(recording_id)
        .bind(target_type)
        .bind(preset_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(OutputTarget {
            id: inserted.0,
            ..OutputTarget::new(recording_id, target_type, preset_id)
        })
    }

    async fn mark_output_uploading(&self, target_id: i64) -> Result<OutputTarget> {
        sqlx::query("UPDATE output_targets SET status = 'UPLOADING' WHERE id = ?")
            .bind(target_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        let row = self.load_target_row(target_id).await?;
        self.recompute_status_inner(row.recording_id)
            .await
            .map_err(Error::from)?;
        Ok(row.into_domain().map_err(Error::from)?)
    }

    async fn mark_output_failed(&self, target_id: i64, reason: &str) -> Result<OutputTarget> {
        let truncated = crate::failure_handler::truncate_error(reason);
        sqlx::query("UPDATE output_targets SET status = 'FAILED', failed_reason = ? WHERE id = ?")
            .bind(&truncated)
            .bind(target_id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        let row = self.load_target_row(target_id).await?;

        let all_failed: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM output_targets WHERE recording_id = ? AND status != 'FAILED'",
        )
        .bind(row.recording_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        if all_failed.0 == 0 {
            self.set_failed(row.recording_id, Some("upload"), Some(&truncated))
                .await?;
        }

        self.recompute_status_inner(row.recording_id)
            .await
            .map_err(Error::from)?;
        Ok(row.into_domain().map_err(Error::from)?)
    }

    async fn save_upload_result(
        &self,
        target_id: i64,
        external_video_id: Option<&str>,
        external_url: Option<&str>,
        result_meta: Option<serde_json::Value>,
    ) -> Result<OutputTarget> {
        let meta_json = result_meta
            .as_ref()
            .map(value_to_string)
            .transpose()
            .map_err(Error::from)?;
        sqlx::query(
            r#"
            UPDATE output_targets SET
                status = 'UPLOADED', uploaded_at = ?, external_video_id = ?,
                external_url = ?, result_meta = ?, failed_reason = NULL
            WHERE id = ?
            "#,
        )
        .bind(datetime_to_string(&Utc::now()))
        .bind(external_video_id)
        .bind(external_url)
        .bind(meta_json)
        .bind(target_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let row = self.load_target_row(target_id).await?;

        let now = Utc::now();
        self.set_pipeline_completed(row.recording_id, now).await?;
        self.recompute_status_inner(row.recording_id)
            .await
            .map_err(Error::from)?;
        Ok(row.into_domain().map_err(Error::from)?)
    }
}

impl SqliteRecordingRepository {
    async fn load_row_any(&self, id: i64) -> Result<RecordingRow> {
        Ok(
            sqlx::query_as::<_, RecordingRow>("SELECT * FROM recordings WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?
                .ok_or_else(|| RepositoryError::not_found("Recording", id.to_string()))?,
        )
    }

    async fn load_target_row(&self, target_id: i64) -> Result<OutputTargetRow> {
        Ok(
            sqlx::query_as::<_, OutputTargetRow>("SELECT * FROM output_targets WHERE id = ?")
                .bind(target_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?
                .ok_or_else(|| RepositoryError::not_found("OutputTarget", target_id.to_string()))?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::db::create_pool;

    async fn test_pool() -> SqlitePool {
        create_pool("sqlite::memory:", 1).await.unwrap()
    }

    async fn make_user(pool: &SqlitePool, slug: i64) -> i64 {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO users (slug, role, config) VALUES (?, 'member', '{}') RETURNING id",
        )
        .bind(slug)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    async fn make_source(pool: &SqlitePool, user_id: i64) -> i64 {
        let row: (i64,) =
            sqlx::query_as("INSERT INTO input_sources (user_id, kind) VALUES (?, 'url-list') RETURNING id")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .unwrap();
        row.0
    }

    async fn make_recording(repo: &SqliteRecordingRepository, user_id: i64, source_id: i64) -> Recording {
        repo.create_or_update(
            user_id,
            source_id,
            "key-1",
            "Lecture",
            Utc::now(),
            true,
            false,
            None,
            None,
        )
        .await
        .unwrap()
    }

    // Testable property #3 (§8): a row owned by user B is never returned
    // for user A's id, even when the numeric id matches exactly.
    #[tokio::test]
    async fn tenant_isolation_on_get_by_id() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_a = make_user(&pool, 1).await;
        let user_b = make_user(&pool, 2).await;
        let source_a = make_source(&pool, user_a).await;

        let rec = make_recording(&repo, user_a, source_a).await;

        assert!(repo.get_by_id(rec.id, user_a).await.is_ok());
        let err = repo.get_by_id(rec.id, user_b).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn tenant_isolation_on_list_by_user() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_a = make_user(&pool, 1).await;
        let user_b = make_user(&pool, 2).await;
        let source_a = make_source(&pool, user_a).await;
        make_recording(&repo, user_a, source_a).await;

        let b_list = repo
            .list_by_user(user_b, &RecordingFilters::default(), Pagination::default())
            .await
            .unwrap();
        assert!(b_list.is_empty());
    }

    // Testable property #2 (§8): delete_state only moves active -> soft ->
    // hard, and `restore` is only callable while soft.
    #[tokio::test]
    async fn delete_state_is_monotone() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        // restore before any delete is rejected.
        assert!(repo.restore(rec.id, 90).await.is_err());

        let soft = repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();
        assert_eq!(soft.delete_state, DeleteState::Soft);
        assert!(soft.soft_deleted_at.is_some());
        assert!(soft.hard_delete_at.is_some());

        let store = ArtifactStore::new(tempfile::tempdir().unwrap().keep());
        let freed = repo
            .cleanup_recording_files(rec.id, &store, 1)
            .await
            .unwrap();
        assert_eq!(freed, 0);

        // now hard: a second restore attempt must fail, state never reverts.
        let err = repo.restore(rec.id, 90).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn restore_clears_deletion_fields_from_soft() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();
        let before = Utc::now();
        let restored = repo.restore(rec.id, 90).await.unwrap();
        assert_eq!(restored.delete_state, DeleteState::Active);
        assert!(!restored.deleted);
        assert!(restored.soft_deleted_at.is_none());
        assert!(restored.hard_delete_at.is_none());

        // §4.2: restore sets a *fresh* expire_at rather than clearing it, so
        // the recording re-enters the auto-expire pass on its own clock.
        let expire_at = restored.expire_at.expect("restore must set a fresh expire_at");
        assert!(expire_at >= before + Duration::days(90) - Duration::seconds(2));
        assert!(expire_at <= Utc::now() + Duration::days(90) + Duration::seconds(2));
    }

    // S4: soft_delete lays down soft_deleted_at/hard_delete_at at the exact
    // configured offsets from the delete call, not from some other anchor
    // (e.g. the recording's creation time).
    #[tokio::test]
    async fn soft_delete_offsets_match_configured_days() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        let before = Utc::now();
        let soft = repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();
        let after = Utc::now();

        let soft_at = soft.soft_deleted_at.unwrap();
        let hard_at = soft.hard_delete_at.unwrap();

        assert!(soft_at >= before + Duration::days(3) - Duration::seconds(2));
        assert!(soft_at <= after + Duration::days(3) + Duration::seconds(2));
        assert!(hard_at >= before + Duration::days(33) - Duration::seconds(2));
        assert!(hard_at <= after + Duration::days(33) + Duration::seconds(2));
    }

    // Testable property #8 (§8): cleanup_recording_files re-checks
    // delete_state under its own transaction and aborts if a concurrent
    // restore already moved the row back to active.
    #[tokio::test]
    async fn cleanup_aborts_when_state_changed_under_it() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();
        // Simulate an operator restore racing with the scheduled cleanup.
        repo.restore(rec.id, 90).await.unwrap();

        let store = ArtifactStore::new(tempfile::tempdir().unwrap().keep());
        let err = repo
            .cleanup_recording_files(rec.id, &store, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Race(_)));

        let row = repo.load_row_any(rec.id).await.unwrap();
        assert_eq!(row.delete_state, "active");
    }

    #[tokio::test]
    async fn output_target_is_one_per_platform() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        let first = repo
            .get_or_create_output_target(rec.id, "youtube", Some(42))
            .await
            .unwrap();
        let second = repo
            .get_or_create_output_target(rec.id, "youtube", Some(99))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    // S4 final pass: hard delete removes the row entirely, going through
    // cleanup_recording_files first when the row never made it to
    // delete_state=hard on its own (the pass-3 "regardless of current
    // delete_state" sweep in list_hard_delete_candidates).
    #[tokio::test]
    async fn delete_removes_row_even_without_prior_cleanup() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();

        let store = ArtifactStore::new(tempfile::tempdir().unwrap().keep());
        repo.delete(rec.id, &store, 1).await.unwrap();

        let err = repo.load_row_any(rec.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent_once_already_hard() {
        let pool = test_pool().await;
        let repo = SqliteRecordingRepository::new(pool.clone());
        let user_id = make_user(&pool, 1).await;
        let source_id = make_source(&pool, user_id).await;
        let rec = make_recording(&repo, user_id, source_id).await;

        repo.soft_delete(rec.id, "manual", 3, 30).await.unwrap();
        let store = ArtifactStore::new(tempfile::tempdir().unwrap().keep());
        repo.cleanup_recording_files(rec.id, &store, 1).await.unwrap();

        repo.delete(rec.id, &store, 1).await.unwrap();
        let err = repo.load_row_any(rec.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
