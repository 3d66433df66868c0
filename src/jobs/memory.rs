//! In-memory work queue and job store
//!
//! Behave like the Redis backends (FIFO pops with timeout, expiring keys,
//! write-once results) without a server. Used for local runs and tests; they
//! also record what happened so tests can assert on it.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::{Instant, timeout_at};

use super::job_store::JobStore;
use super::types::JobStatus;
use super::work_queue::WorkQueue;
use crate::errors::{QueueError, QueueResult, StoreError, StoreResult};

/// FIFO queue with blocking pop
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    entries: Mutex<VecDeque<String>>,
    available: Notify,
    pop_attempts: AtomicUsize,
    failing_pops: AtomicUsize,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue pre-loaded with entries, oldest first.
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Mutex::new(entries.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Number of `pop` calls made so far, successful or not.
    pub fn pop_attempts(&self) -> usize {
        self.pop_attempts.load(Ordering::SeqCst)
    }

    /// Make the next `count` pops fail as if the backend were unreachable.
    pub fn fail_next_pops(&self, count: usize) {
        self.failing_pops.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing_pops
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn push(&self, entry: &str) -> QueueResult<()> {
        self.entries.lock().await.push_back(entry.to_string());
        self.available.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> QueueResult<Option<String>> {
        self.pop_attempts.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(QueueError::Unavailable {
                message: "simulated queue outage".to_string(),
            });
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.entries.lock().await.pop_front() {
                return Ok(Some(entry));
            }
            if timeout_at(deadline, self.available.notified()).await.is_err() {
                return Ok(None);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T: Clone> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn live(&self) -> Option<T> {
        (Instant::now() < self.expires_at).then(|| self.value.clone())
    }
}

/// Expiring status/result store.
///
/// Unlike Redis it also refuses status regressions, which turns a
/// backwards write into a visible error in tests.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    statuses: RwLock<HashMap<String, Expiring<JobStatus>>>,
    results: RwLock<HashMap<String, Expiring<String>>>,
    history: RwLock<HashMap<String, Vec<JobStatus>>>,
    unavailable: AtomicBool,
    write_latency: Duration,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write waits this long before landing.
    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = latency;
        self
    }

    /// Toggle a simulated outage for all operations.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every status successfully written for a job, in order.
    pub async fn history(&self, job_id: &str) -> Vec<JobStatus> {
        self.history
            .read()
            .await
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                message: "simulated store outage".to_string(),
            });
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        if !self.write_latency.is_zero() {
            tokio::time::sleep(self.write_latency).await;
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn set_status(&self, job_id: &str, status: JobStatus, ttl: Duration) -> StoreResult<()> {
        self.simulate_latency().await;
        self.check_available()?;

        let mut statuses = self.statuses.write().await;
        if let Some(current) = statuses.get(job_id).and_then(Expiring::live) {
            if !current.can_advance_to(status) {
                return Err(StoreError::Regression {
                    job_id: job_id.to_string(),
                    from: current,
                    to: status,
                });
            }
        }
        statuses.insert(job_id.to_string(), Expiring::new(status, ttl));
        drop(statuses);

        self.history
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .push(status);
        Ok(())
    }

    async fn set_result(&self, job_id: &str, result: &str, ttl: Duration) -> StoreResult<()> {
        self.simulate_latency().await;
        self.check_available()?;

        let mut results = self.results.write().await;
        if results.get(job_id).and_then(Expiring::live).is_some() {
            return Err(StoreError::Conflict {
                key: job_id.to_string(),
            });
        }
        results.insert(job_id.to_string(), Expiring::new(result.to_string(), ttl));
        Ok(())
    }

    async fn status(&self, job_id: &str) -> StoreResult<Option<JobStatus>> {
        self.check_available()?;
        Ok(self
            .statuses
            .read()
            .await
            .get(job_id)
            .and_then(Expiring::live))
    }

    async fn result(&self, job_id: &str) -> StoreResult<Option<String>> {
        self.check_available()?;
        Ok(self
            .results
            .read()
            .await
            .get(job_id)
            .and_then(Expiring::live))
    }
}
