//! Per-job execution: status transitions around one generation call

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use super::job_store::JobStore;
use super::types::{Job, JobOutcome, JobStatus};
use crate::errors::{StoreError, WorkerError, WorkerResult};
use crate::generation::{GenerationRequest, PresentationGenerator};
use crate::observability::WorkerMetrics;

/// Run `operation`, giving up once `deadline` passes.
async fn bounded<T, E>(
    deadline: Instant,
    stage: &'static str,
    operation: impl Future<Output = Result<T, E>>,
) -> WorkerResult<T>
where
    E: Into<WorkerError>,
{
    match timeout_at(deadline, operation).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(WorkerError::DeadlineExceeded { stage }),
    }
}

/// Drives one job from `processing` to a terminal status.
///
/// Store writes are attempted once and never retried. Every write and the
/// generation call share the job's deadline.
pub struct TaskExecutor {
    store: Arc<dyn JobStore>,
    generator: Arc<dyn PresentationGenerator>,
    retention: Duration,
    metrics: WorkerMetrics,
}

impl TaskExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn PresentationGenerator>,
        retention: Duration,
    ) -> Self {
        Self {
            store,
            generator,
            retention,
            metrics: WorkerMetrics::global(),
        }
    }

    pub fn with_metrics(mut self, metrics: WorkerMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Process `job`, stopping all work at `deadline`.
    pub async fn execute(&self, job: Job, deadline: Instant) -> JobOutcome {
        let started = Instant::now();
        let outcome = self.process(&job, deadline).await;
        let elapsed = started.elapsed();
        self.metrics.record_outcome(outcome, elapsed);

        match outcome {
            JobOutcome::Completed => {
                info!(job_id = %job.job_id, %outcome, "Job completed in {:?}", elapsed)
            }
            JobOutcome::Failed => {
                warn!(job_id = %job.job_id, %outcome, "Job failed after {:?}", elapsed)
            }
            JobOutcome::Stalled => error!(
                job_id = %job.job_id,
                %outcome,
                "Job stalled after {:?}, terminal status not recorded", elapsed
            ),
        }
        outcome
    }

    async fn process(&self, job: &Job, deadline: Instant) -> JobOutcome {
        let job_id = job.job_id.as_str();

        if let Err(e) = self.write_status(job_id, JobStatus::Processing, deadline).await {
            error!(job_id, "Could not mark job processing: {}", e);
            return self.fail(job_id, deadline).await;
        }

        let request = GenerationRequest::from(job);
        debug!(
            job_id,
            slides = request.slide_count,
            style = %request.style,
            "Generating presentation"
        );
        let presentation = match bounded(
            deadline,
            "generating the presentation",
            self.generator.generate(&request),
        )
        .await
        {
            Ok(presentation) => presentation,
            Err(e) => {
                warn!(job_id, "Generation failed: {}", e);
                return self.fail(job_id, deadline).await;
            }
        };

        match bounded(
            deadline,
            "writing the result",
            self.store.set_result(job_id, &presentation, self.retention),
        )
        .await
        {
            Ok(()) => {}
            Err(WorkerError::Store(StoreError::Conflict { key })) => {
                // A result already exists, so `failed` must not be written
                error!(job_id, %key, "Result already present, leaving status untouched");
                return JobOutcome::Stalled;
            }
            Err(e) => {
                error!(job_id, "Could not write result: {}", e);
                return self.fail(job_id, deadline).await;
            }
        }

        match self.write_status(job_id, JobStatus::Completed, deadline).await {
            Ok(()) => JobOutcome::Completed,
            Err(e) => {
                // The result is stored; `failed` would contradict it
                error!(job_id, "Could not mark job completed: {}", e);
                JobOutcome::Stalled
            }
        }
    }

    async fn fail(&self, job_id: &str, deadline: Instant) -> JobOutcome {
        match self.write_status(job_id, JobStatus::Failed, deadline).await {
            Ok(()) => JobOutcome::Failed,
            Err(e) => {
                error!(job_id, "Could not mark job failed: {}", e);
                JobOutcome::Stalled
            }
        }
    }

    async fn write_status(
        &self,
        job_id: &str,
        status: JobStatus,
        deadline: Instant,
    ) -> WorkerResult<()> {
        let stage = match status {
            JobStatus::Queued => "marking the job queued",
            JobStatus::Processing => "marking the job processing",
            JobStatus::Completed => "marking the job completed",
            JobStatus::Failed => "marking the job failed",
        };
        bounded(
            deadline,
            stage,
            self.store.set_status(job_id, status, self.retention),
        )
        .await
    }
}
