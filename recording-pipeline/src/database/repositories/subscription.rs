//! Subscription plan / user subscription repository (§3, feeds §4.14's
//! plan-limit lookups).

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{SubscriptionPlanRow, UserSubscriptionRow};
use crate::database::repositories::errors::RepositoryError;
use crate::domain::quota::PlanLimits;
use crate::domain::{SubscriptionPlan, UserSubscription};
use crate::Result;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn get_plan(&self, id: i64) -> Result<SubscriptionPlan>;
    async fn get_user_subscription(&self, user_id: i64) -> Result<Option<UserSubscription>>;
    /// Plan limits for a user, overrides applied, falling back to the
    /// `free` plan when the user has no subscription row.
    async fn effective_limits(&self, user_id: i64) -> Result<PlanLimits>;
}

pub struct SqliteSubscriptionRepository {
    pool: SqlitePool,
}

impl SqliteSubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn get_plan(&self, id: i64) -> Result<SubscriptionPlan> {
        let row = sqlx::query_as::<_, SubscriptionPlanRow>(
            "SELECT * FROM subscription_plans WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?
        .ok_or_else(|| RepositoryError::not_found("SubscriptionPlan", id.to_string()))?;
        Ok(row.into_domain()?)
    }

    async fn get_user_subscription(&self, user_id: i64) -> Result<Option<UserSubscription>> {
        let row = sqlx::query_as::<_, UserSubscriptionRow>(
            "SELECT * FROM user_subscriptions WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        row.map(|r| r.into_domain().map_err(Into::into)).transpose()
    }

    async fn effective_limits(&self, user_id: i64) -> Result<PlanLimits> {
        let Some(sub) = self.get_user_subscription(user_id).await? else {
            let free = sqlx::query_as::<_, SubscriptionPlanRow>(
                "SELECT * FROM subscription_plans WHERE name = 'free'",
            )
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
            return Ok(match free {
                Some(row) => {
                    let plan = row.into_domain()?;
                    PlanLimits {
                        recordings_per_month: plan.recordings_per_month,
                        concurrent_tasks: plan.concurrent_tasks,
                        storage_bytes: plan.storage_bytes,
                    }
                }
                None => PlanLimits::default(),
            });
        };

        let plan = self.get_plan(sub.plan_id).await?;
        Ok(PlanLimits {
            recordings_per_month: sub
                .recordings_per_month_override
                .unwrap_or(plan.recordings_per_month),
            concurrent_tasks: sub.concurrent_tasks_override.unwrap_or(plan.concurrent_tasks),
            storage_bytes: sub.storage_bytes_override.unwrap_or(plan.storage_bytes),
        })
    }
}
