//! Bounded, supervised pool of executor tasks

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::executor::TaskExecutor;
use super::types::Job;
use crate::errors::{WorkerError, WorkerResult};

/// Capacity reserved for one job. Dropping it without dispatching returns
/// the slot to the pool.
#[derive(Debug)]
pub struct PoolSlot {
    permit: OwnedSemaphorePermit,
}

/// What shutdown left behind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Executors still running when the grace period ran out
    pub abandoned: usize,
}

/// Runs executors concurrently, at most `max_concurrent` at a time.
///
/// Tasks are tracked so shutdown can wait for them. Abandoned tasks are
/// not aborted; they end with the process.
pub struct WorkerPool {
    executor: Arc<TaskExecutor>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    max_concurrent: usize,
    job_deadline: Duration,
}

impl WorkerPool {
    pub fn new(executor: Arc<TaskExecutor>, max_concurrent: usize, job_deadline: Duration) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            executor,
            slots: Arc::new(Semaphore::new(max_concurrent)),
            tracker: TaskTracker::new(),
            max_concurrent,
            job_deadline,
        }
    }

    /// Wait for free capacity.
    pub async fn reserve(&self) -> WorkerResult<PoolSlot> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::PoolClosed)?;
        Ok(PoolSlot { permit })
    }

    /// Start executing `job` in the slot. The deadline starts now.
    pub fn dispatch(&self, slot: PoolSlot, job: Job) {
        let deadline = Instant::now() + self.job_deadline;
        let executor = self.executor.clone();
        debug!(job_id = %job.job_id, active = self.active() + 1, "Dispatching job");

        self.tracker.spawn(async move {
            let _permit = slot.permit;
            executor.execute(job, deadline).await
        });
    }

    /// Executors currently running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent
    }

    /// Stop accepting work and wait up to `grace` for running executors.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.slots.close();
        self.tracker.close();

        let running = self.tracker.len();
        if running > 0 {
            info!(running, "Waiting up to {:?} for in-flight jobs", grace);
        }

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("Worker pool drained");
            return ShutdownReport { abandoned: 0 };
        }

        let abandoned = self.tracker.len();
        warn!(
            abandoned,
            "Grace period elapsed, abandoning in-flight jobs"
        );
        ShutdownReport { abandoned }
    }
}
