use sqlx::FromRow;

use crate::database::repositories::errors::RepositoryResult;
use crate::domain::QuotaUsage;

#[derive(Debug, Clone, FromRow)]
pub struct QuotaUsageRow {
    pub user_id: i64,
    pub period: i64,
    pub recordings_count: i64,
    pub storage_bytes: i64,
    pub concurrent_tasks_count: i64,
    pub recordings_overage: i64,
    pub storage_overage_bytes: i64,
}

impl QuotaUsageRow {
    pub fn into_domain(self) -> RepositoryResult<QuotaUsage> {
        Ok(QuotaUsage {
            user_id: self.user_id,
            period: self.period as u32,
            recordings_count: self.recordings_count,
            storage_bytes: self.storage_bytes,
            concurrent_tasks_count: self.concurrent_tasks_count,
            recordings_overage: self.recordings_overage,
            storage_overage_bytes: self.storage_overage_bytes,
        })
    }

    pub fn from_domain(q: &QuotaUsage) -> RepositoryResult<Self> {
        Ok(Self {
            user_id: q.user_id,
            period: q.period as i64,
            recordings_count: q.recordings_count,
            storage_bytes: q.storage_bytes,
            concurrent_tasks_count: q.concurrent_tasks_count,
            recordings_overage: q.recordings_overage,
            storage_overage_bytes: q.storage_overage_bytes,
        })
    }
}
