use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{AutomationFilters, AutomationJob, SyncConfig};

#[derive(Debug, Clone, FromRow)]
pub struct AutomationJobRow {
    pub id: i64,
    pub user_id: i64,
    pub template_ids: String,
    pub schedule: String,
    pub schedule_timezone: String,
    pub sync_config: String,
    pub filters: String,
    pub processing_config: Option<String>,
    pub is_active: bool,
    pub next_run_at: Option<String>,
    pub last_run_at: Option<String>,
    pub run_count: i64,
}

impl AutomationJobRow {
    pub fn into_domain(self) -> RepositoryResult<AutomationJob> {
        Ok(AutomationJob {
            id: self.id,
            user_id: self.user_id,
            template_ids: string_to_json::<Vec<i64>>(&self.template_ids)?,
            schedule: self.schedule,
            schedule_timezone: self.schedule_timezone,
            sync_config: string_to_json::<SyncConfig>(&self.sync_config)?,
            filters: string_to_json::<AutomationFilters>(&self.filters)?,
            processing_config: self
                .processing_config
                .as_deref()
                .map(string_to_value)
                .transpose()?,
            is_active: self.is_active,
            next_run_at: optional_string_to_datetime(&self.next_run_at)?,
            last_run_at: optional_string_to_datetime(&self.last_run_at)?,
            run_count: self.run_count,
        })
    }

    pub fn from_domain(j: &AutomationJob) -> RepositoryResult<Self> {
        Ok(Self {
            id: j.id,
            user_id: j.user_id,
            template_ids: json_to_string(&j.template_ids)?,
            schedule: j.schedule.clone(),
            schedule_timezone: j.schedule_timezone.clone(),
            sync_config: json_to_string(&j.sync_config)?,
            filters: json_to_string(&j.filters)?,
            processing_config: j
                .processing_config
                .as_ref()
                .map(value_to_string)
                .transpose()?,
            is_active: j.is_active,
            next_run_at: optional_datetime_to_string(&j.next_run_at),
            last_run_at: optional_datetime_to_string(&j.last_run_at),
            run_count: j.run_count,
        })
    }
}
