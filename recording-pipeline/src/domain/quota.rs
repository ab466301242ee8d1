//! `QuotaUsage` / plan limits (§3, §4.14).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub user_id: i64,
    /// YYYYMM period this row accounts for.
    pub period: u32,
    pub recordings_count: i64,
    pub storage_bytes: i64,
    pub concurrent_tasks_count: i64,
    pub recordings_overage: i64,
    pub storage_overage_bytes: i64,
}

impl QuotaUsage {
    pub fn empty(user_id: i64, period: u32) -> Self {
        Self {
            user_id,
            period,
            recordings_count: 0,
            storage_bytes: 0,
            concurrent_tasks_count: 0,
            recordings_overage: 0,
            storage_overage_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanLimits {
    pub recordings_per_month: i64,
    pub concurrent_tasks: i64,
    pub storage_bytes: i64,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            recordings_per_month: 100,
            concurrent_tasks: 5,
            storage_bytes: 50 * 1024 * 1024 * 1024,
        }
    }
}
