use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{MatchingRules, RecordingTemplate};

#[derive(Debug, Clone, FromRow)]
pub struct RecordingTemplateRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub matching_rules: String,
    pub processing_config: String,
    pub metadata_config: String,
    pub output_config: String,
    pub is_draft: bool,
    pub is_active: bool,
    pub used_count: i64,
    pub last_used_at: Option<String>,
    pub created_at: String,
}

impl RecordingTemplateRow {
    pub fn into_domain(self) -> RepositoryResult<RecordingTemplate> {
        Ok(RecordingTemplate {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            matching_rules: string_to_json::<MatchingRules>(&self.matching_rules)?,
            processing_config: string_to_value(&self.processing_config)?,
            metadata_config: string_to_value(&self.metadata_config)?,
            output_config: string_to_value(&self.output_config)?,
            is_draft: self.is_draft,
            is_active: self.is_active,
            used_count: self.used_count,
            last_used_at: optional_string_to_datetime(&self.last_used_at)?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }

    pub fn from_domain(t: &RecordingTemplate) -> RepositoryResult<Self> {
        Ok(Self {
            id: t.id,
            user_id: t.user_id,
            name: t.name.clone(),
            matching_rules: json_to_string(&t.matching_rules)?,
            processing_config: value_to_string(&t.processing_config)?,
            metadata_config: value_to_string(&t.metadata_config)?,
            output_config: value_to_string(&t.output_config)?,
            is_draft: t.is_draft,
            is_active: t.is_active,
            used_count: t.used_count,
            last_used_at: optional_datetime_to_string(&t.last_used_at),
            created_at: datetime_to_string(&t.created_at),
        })
    }
}
