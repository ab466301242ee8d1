//! `SubscriptionPlan` / `UserSubscription` — quota limits, with optional
//! per-user overrides (§3).

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    pub recordings_per_month: i64,
    pub concurrent_tasks: i64,
    pub storage_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct UserSubscription {
    pub user_id: i64,
    pub plan_id: i64,
    pub recordings_per_month_override: Option<i64>,
    pub concurrent_tasks_override: Option<i64>,
    pub storage_bytes_override: Option<i64>,
}
