//! Producer side: enqueue a job and announce it

use std::sync::Arc;
use tracing::{info, warn};

use super::notifier::NotificationPublisher;
use super::types::Job;
use super::work_queue::WorkQueue;
use crate::errors::{DecodeError, WorkerResult};

pub struct JobSubmitter {
    queue: Arc<dyn WorkQueue>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl JobSubmitter {
    pub fn new(queue: Arc<dyn WorkQueue>, publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self { queue, publisher }
    }

    /// Push `job` onto the queue, then publish its id.
    ///
    /// Only the push decides success. A failed publish just means the worker
    /// finds the job on its next idle drain.
    pub async fn submit(&self, job: &Job) -> WorkerResult<()> {
        if job.job_id.trim().is_empty() {
            return Err(DecodeError::BlankField { field: "job_id" }.into());
        }
        if job.prompt.trim().is_empty() {
            return Err(DecodeError::BlankField { field: "prompt" }.into());
        }

        let entry = job.to_queue_entry().map_err(DecodeError::from)?;
        self.queue.push(&entry).await?;
        info!(job_id = %job.job_id, "Job enqueued");

        if let Err(e) = self.publisher.publish(&job.job_id).await {
            warn!(job_id = %job.job_id, "Job enqueued but notification failed: {}", e);
        }
        Ok(())
    }
}
