//! Recording template repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::database::converters::datetime_to_string;
use crate::database::models::RecordingTemplateRow;
use crate::database::repositories::errors::RepositoryError;
use crate::domain::RecordingTemplate;
use crate::Result;

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<RecordingTemplate>;
    /// Active, non-draft templates for a user, ordered `created_at ASC`
    /// (the order the template matcher iterates in, §4.4).
    async fn list_matchable(&self, user_id: i64) -> Result<Vec<RecordingTemplate>>;
    async fn mark_used(&self, id: i64) -> Result<()>;
    /// `templates.from_recording` (§6 control plane). Created as a draft so
    /// an operator reviews its matching rules before it starts matching
    /// incoming recordings.
    async fn create(
        &self,
        user_id: i64,
        name: &str,
        matching_rules: crate::domain::MatchingRules,
        processing_config: serde_json::Value,
        metadata_config: serde_json::Value,
        output_config: serde_json::Value,
    ) -> Result<RecordingTemplate>;
}

pub struct SqliteTemplateRepository {
    pool: SqlitePool,
}

impl SqliteTemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for SqliteTemplateRepository {
    async fn get_by_id(&self, id: i64, user_id: i64) -> Result<RecordingTemplate> {
        let row = sqlx::query_as::<_, RecordingTemplateRow>(
            "SELECT * FROM recording_templates WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("RecordingTemplate", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn list_matchable(&self, user_id: i64) -> Result<Vec<RecordingTemplate>> {
        let rows = sqlx::query_as::<_, RecordingTemplateRow>(
            r#"
            SELECT * FROM recording_templates
            WHERE user_id = ? AND is_active = 1 AND is_draft = 0
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(Into::into))
            .collect()
    }

    async fn mark_used(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE recording_templates SET used_count = used_count + 1, last_used_at = ? WHERE id = ?",
        )
        .bind(datetime_to_string(&Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn create(
        &self,
        user_id: i64,
        name: &str,
        matching_rules: crate::domain::MatchingRules,
        processing_config: serde_json::Value,
        metadata_config: serde_json::Value,
        output_config: serde_json::Value,
    ) -> Result<RecordingTemplate> {
        let created_at = Utc::now();
        let matching_rules_json = crate::database::converters::json_to_string(&matching_rules)?;
        let id = sqlx::query(
            r#"
            INSERT INTO recording_templates
                (user_id, name, matching_rules, processing_config, metadata_config, output_config,
                 is_draft, is_active, used_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, 1, 0, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(matching_rules_json)
        .bind(crate::database::converters::value_to_string(&processing_config)?)
        .bind(crate::database::converters::value_to_string(&metadata_config)?)
        .bind(crate::database::converters::value_to_string(&output_config)?)
        .bind(datetime_to_string(&created_at))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .last_insert_rowid();

        self.get_by_id(id, user_id).await
    }
}
