//! Job status and result storage

use async_trait::async_trait;
use std::time::Duration;

use super::types::JobStatus;
use crate::errors::StoreResult;

/// Durable key-value store for job status and results.
///
/// Every write carries an expiry. Implementations only promise
/// single-operation atomicity; callers never rely on multi-key transactions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record the job's current status.
    async fn set_status(&self, job_id: &str, status: JobStatus, ttl: Duration) -> StoreResult<()>;

    /// Record the generated output. Write-once: an existing result is never
    /// replaced and yields `StoreError::Conflict`.
    async fn set_result(&self, job_id: &str, result: &str, ttl: Duration) -> StoreResult<()>;

    async fn status(&self, job_id: &str) -> StoreResult<Option<JobStatus>>;

    async fn result(&self, job_id: &str) -> StoreResult<Option<String>>;
}
