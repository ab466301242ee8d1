use sqlx::FromRow;

use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{SubscriptionPlan, UserSubscription};

#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionPlanRow {
    pub id: i64,
    pub name: String,
    pub recordings_per_month: i64,
    pub concurrent_tasks: i64,
    pub storage_bytes: i64,
}

impl SubscriptionPlanRow {
    pub fn into_domain(self) -> RepositoryResult<SubscriptionPlan> {
        Ok(SubscriptionPlan {
            id: self.id,
            name: self.name,
            recordings_per_month: self.recordings_per_month,
            concurrent_tasks: self.concurrent_tasks,
            storage_bytes: self.storage_bytes,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct UserSubscriptionRow {
    pub user_id: i64,
    pub plan_id: i64,
    pub recordings_per_month_override: Option<i64>,
    pub concurrent_tasks_override: Option<i64>,
    pub storage_bytes_override: Option<i64>,
}

impl UserSubscriptionRow {
    pub fn into_domain(self) -> RepositoryResult<UserSubscription> {
        Ok(UserSubscription {
            user_id: self.user_id,
            plan_id: self.plan_id,
            recordings_per_month_override: self.recordings_per_month_override,
            concurrent_tasks_override: self.concurrent_tasks_override,
            storage_bytes_override: self.storage_bytes_override,
        })
    }
}
