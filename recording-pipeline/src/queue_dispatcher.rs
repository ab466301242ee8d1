//! Queue dispatcher (§4.7) — routes work to named queues, each with its own
//! concurrency cap and retry policy. Grounded on the teacher's
//! `pipeline/worker_pool.rs` (semaphore-bounded worker pools) and
//! `pipeline/job_queue.rs` (task metadata, priorities, soft/hard limits),
//! simplified to an in-process `tokio::task::JoinSet` per queue rather than
//! the teacher's adaptive-scaling controller — this crate does not need
//! dynamic worker scaling.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    Downloads,
    Uploads,
    ProcessingCpu,
    AsyncOperations,
    Maintenance,
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueueName::Downloads => "downloads",
            QueueName::Uploads => "uploads",
            QueueName::ProcessingCpu => "processing_cpu",
            QueueName::AsyncOperations => "async_operations",
            QueueName::Maintenance => "maintenance",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-task bookkeeping used by `tasks.status` / `tasks.cancel` (§4.7).
/// `user_id` is checked against the caller on every access.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub task_id: Uuid,
    pub user_id: i64,
    pub queue: QueueName,
    pub priority: u8,
    pub status: TaskStatus,
    pub last_error: Option<String>,
}

struct QueueSlot {
    semaphore: Arc<Semaphore>,
    max_retries: u32,
}

/// Routes async work to named queues with bounded concurrency and a retry
/// policy per queue. Does not itself run step logic — callers pass a
/// closure that performs one attempt and returns `Result<T>`; the
/// dispatcher retries transient failures with exponential backoff up to
/// the queue's `max_retries`.
pub struct QueueDispatcher {
    queues: HashMap<QueueName, QueueSlot>,
    tasks: DashMap<Uuid, TaskHandle>,
    cancellation: CancellationToken,
}

impl QueueDispatcher {
    pub fn new(config: &QueueConfig, cancellation: CancellationToken) -> Self {
        let mut queues = HashMap::new();
        queues.insert(
            QueueName::Downloads,
            QueueSlot {
                semaphore: Arc::new(Semaphore::new(config.downloads_concurrency)),
                max_retries: config.downloads_max_retries,
            },
        );
        queues.insert(
            QueueName::Uploads,
            QueueSlot {
                semaphore: Arc::new(Semaphore::new(config.uploads_concurrency)),
                max_retries: config.uploads_max_retries,
            },
        );
        queues.insert(
            QueueName::ProcessingCpu,
            QueueSlot {
                semaphore: Arc::new(Semaphore::new(config.processing_cpu_concurrency)),
                max_retries: config.processing_cpu_max_retries,
            },
        );
        queues.insert(
            QueueName::AsyncOperations,
            QueueSlot {
                semaphore: Arc::new(Semaphore::new(config.async_operations_concurrency)),
                max_retries: config.async_operations_max_retries,
            },
        );
        queues.insert(
            QueueName::Maintenance,
            QueueSlot {
                semaphore: Arc::new(Semaphore::new(config.maintenance_concurrency)),
                max_retries: config.maintenance_max_retries,
            },
        );

        Self {
            queues,
            tasks: DashMap::new(),
            cancellation,
        }
    }

    /// Registers a task and runs `job` to completion, retrying transient
    /// failures per the queue's policy. Acquires the queue's concurrency
    /// permit for the duration of each attempt. `priority` (0-9, 9 highest)
    /// is carried on the task record for future scheduling use; this
    /// simplified dispatcher executes admitted work immediately rather than
    /// maintaining its own priority queue, since Tokio's scheduler already
    /// fairly interleaves the bounded set of in-flight attempts.
    pub async fn submit<F, Fut, T>(
        &self,
        queue: QueueName,
        user_id: i64,
        priority: u8,
        job: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let task_id = Uuid::new_v4();
        self.tasks.insert(
            task_id,
            TaskHandle {
                task_id,
                user_id,
                queue,
                priority,
                status: TaskStatus::Queued,
                last_error: None,
            },
        );

        let slot = self
            .queues
            .get(&queue)
            .expect("all QueueName variants are registered in QueueDispatcher::new");

        let result = self.run_with_retries(task_id, slot, job).await;

        if let Some(mut handle) = self.tasks.get_mut(&task_id) {
            handle.status = match &result {
                Ok(_) => TaskStatus::Completed,
                Err(_) if self.cancellation.is_cancelled() => TaskStatus::Cancelled,
                Err(_) => TaskStatus::Failed,
            };
            if let Err(e) = &result {
                handle.last_error = Some(e.to_string());
            }
        }

        result
    }

    async fn run_with_retries<F, Fut, T>(&self, task_id: Uuid, slot: &QueueSlot, job: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            if self.cancellation.is_cancelled() {
                return Err(Error::Pipeline(format!("task {task_id} cancelled before dispatch")));
            }
            let permit = slot
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Pipeline("queue semaphore closed".to_string()))?;

            if let Some(mut handle) = self.tasks.get_mut(&task_id) {
                handle.status = TaskStatus::Running;
            }

            let outcome = job().await;
            drop(permit);

            match outcome {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < slot.max_retries => {
                    attempt += 1;
                    let backoff = Duration::from_millis(200 * 2u64.pow(attempt.min(8)));
                    warn!(%task_id, attempt, error = %e, "task failed, retrying after backoff");
                    tokio::time::sleep(backoff).await;
                    continue;
                }
                Err(e) => {
                    info!(%task_id, attempt, error = %e, "task failed, no further retries");
                    return Err(e);
                }
            }
        }
    }

    pub fn status(&self, task_id: Uuid, caller_user_id: i64) -> Result<TaskStatus> {
        let handle = self
            .tasks
            .get(&task_id)
            .ok_or_else(|| Error::not_found("Task", task_id.to_string()))?;
        if handle.user_id != caller_user_id {
            return Err(Error::not_found("Task", task_id.to_string()));
        }
        Ok(handle.status)
    }

    /// Cancellation is cooperative: this only flags intent for tasks that
    /// have not yet been dispatched and relies on the shared
    /// `CancellationToken` for in-flight steps that check it explicitly.
    pub fn cancel(&self, task_id: Uuid, caller_user_id: i64) -> Result<()> {
        let mut handle = self
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| Error::not_found("Task", task_id.to_string()))?;
        if handle.user_id != caller_user_id {
            return Err(Error::not_found("Task", task_id.to_string()));
        }
        if handle.status == TaskStatus::Queued {
            handle.status = TaskStatus::Cancelled;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> QueueConfig {
        QueueConfig {
            downloads_concurrency: 2,
            uploads_concurrency: 2,
            processing_cpu_concurrency: 1,
            async_operations_concurrency: 2,
            maintenance_concurrency: 1,
            downloads_max_retries: 3,
            uploads_max_retries: 3,
            processing_cpu_max_retries: 1,
            async_operations_max_retries: 2,
            maintenance_max_retries: 5,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let dispatcher = QueueDispatcher::new(&test_config(), CancellationToken::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = dispatcher
            .submit(QueueName::AsyncOperations, 1, 5, move || {
                let attempts = attempts_clone.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(Error::Transient("provider 503".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_on_first_attempt() {
        let dispatcher = QueueDispatcher::new(&test_config(), CancellationToken::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let err = dispatcher
            .submit(QueueName::Downloads, 1, 5, move || {
                let attempts = attempts_clone.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(Error::Validation("bad input".into()))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_last_error() {
        let dispatcher = QueueDispatcher::new(&test_config(), CancellationToken::new());

        let err = dispatcher
            .submit(QueueName::ProcessingCpu, 1, 5, || async {
                Err::<(), _>(Error::Io(std::io::Error::other("ffmpeg crashed")))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn task_status_and_cancel_are_tenant_scoped() {
        let dispatcher = QueueDispatcher::new(&test_config(), CancellationToken::new());
        dispatcher
            .submit(QueueName::Maintenance, 7, 0, || async { Ok::<_, Error>(()) })
            .await
            .unwrap();

        // task_id not recorded anywhere the caller can guess; verify the
        // tenant check directly against a forged handle instead.
        let task_id = {
            let entry = dispatcher.tasks.iter().next().unwrap();
            *entry.key()
        };
        assert!(dispatcher.status(task_id, 7).is_ok());
        let err = dispatcher.status(task_id, 999).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let err = dispatcher.cancel(task_id, 999).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
