//! Process-level settings (§A.4) — read from environment variables with
//! defaults, in the teacher's small-`*Config`-struct-with-`Default`
//! style (`pipeline/worker_pool.rs::WorkerPoolConfig`,
//! `pipeline/purge.rs::PurgeConfig`).
//!
//! `UserConfig`/template/automation-job/manual-override trees are just
//! `serde_json::Value` at rest and are not modeled here — see
//! `config_resolver`.

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://recording_pipeline.db?mode=rwc".to_string()),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStoreConfig {
    pub root: String,
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self {
            root: env::var("ARTIFACT_ROOT").unwrap_or_else(|_| "./data".to_string()),
        }
    }
}

/// Per-queue concurrency caps (§4.7). One worker pool per named queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub downloads_concurrency: usize,
    pub uploads_concurrency: usize,
    pub processing_cpu_concurrency: usize,
    pub async_operations_concurrency: usize,
    pub maintenance_concurrency: usize,
    pub downloads_max_retries: u32,
    pub uploads_max_retries: u32,
    pub processing_cpu_max_retries: u32,
    pub async_operations_max_retries: u32,
    pub maintenance_max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            downloads_concurrency: env_or("QUEUE_DOWNLOADS_CONCURRENCY", 8),
            uploads_concurrency: env_or("QUEUE_UPLOADS_CONCURRENCY", 8),
            processing_cpu_concurrency: env_or(
                "QUEUE_PROCESSING_CPU_CONCURRENCY",
                num_cpus_fallback(),
            ),
            async_operations_concurrency: env_or("QUEUE_ASYNC_OPERATIONS_CONCURRENCY", 16),
            maintenance_concurrency: env_or("QUEUE_MAINTENANCE_CONCURRENCY", 2),
            downloads_max_retries: env_or("QUEUE_DOWNLOADS_MAX_RETRIES", 3),
            uploads_max_retries: env_or("QUEUE_UPLOADS_MAX_RETRIES", 3),
            processing_cpu_max_retries: env_or("QUEUE_PROCESSING_CPU_MAX_RETRIES", 2),
            async_operations_max_retries: env_or("QUEUE_ASYNC_OPERATIONS_MAX_RETRIES", 2),
            maintenance_max_retries: env_or("QUEUE_MAINTENANCE_MAX_RETRIES", 5),
        }
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Retention controller cadence and retention windows (§4.13).
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub soft_delete_days: i64,
    pub hard_delete_days: i64,
    /// Window after which an active recording with no further operator
    /// action auto-expires (§3, §4.13 pass 1); also the window `restore`
    /// (§4.2) grants a recording pulled back from `soft` before it can
    /// auto-expire again.
    pub auto_expire_days: i64,
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            soft_delete_days: env_or("RETENTION_SOFT_DELETE_DAYS", 7),
            hard_delete_days: env_or("RETENTION_HARD_DELETE_DAYS", 23),
            auto_expire_days: env_or("RETENTION_AUTO_EXPIRE_DAYS", 90),
            sweep_interval: Duration::from_secs(env_or("RETENTION_SWEEP_INTERVAL_SECS", 300)),
        }
    }
}

/// Automation scheduler cadence (§4.12).
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub poll_interval: Duration,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(env_or("AUTOMATION_POLL_INTERVAL_SECS", 60)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub artifacts: ArtifactStoreConfig,
    pub queues: QueueConfig,
    pub retention: RetentionConfig,
    pub automation: AutomationConfig,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::default()
    }
}
