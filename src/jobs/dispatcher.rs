//! Dispatcher loop: decides when to drain the work queue and hands popped
//! jobs to the worker pool.
//!
//! A drain pass runs once at startup, on every notification and whenever the
//! idle interval passes without one. Each pass pops until the queue reports
//! empty or the transport fails. Pops are sequential, so a single dispatcher
//! never races itself for an entry.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::notifier::NotificationListener;
use super::types::Job;
use super::work_queue::WorkQueue;
use super::worker_pool::WorkerPool;
use crate::config::WorkerConfig;
use crate::observability::WorkerMetrics;

/// Why a drain pass stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// A pop timed out on an empty queue
    Exhausted,
    /// The queue could not be reached; the next trigger retries
    TransportError,
    /// Shutdown was requested while waiting for pool capacity
    Cancelled,
}

/// Summary of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub dispatched: usize,
    pub malformed: usize,
    pub outcome: DrainOutcome,
}

impl DrainReport {
    fn new() -> Self {
        Self {
            dispatched: 0,
            malformed: 0,
            outcome: DrainOutcome::Exhausted,
        }
    }

    fn finish(mut self, outcome: DrainOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

pub struct Dispatcher {
    queue: Arc<dyn WorkQueue>,
    pool: Arc<WorkerPool>,
    notifications: NotificationListener,
    idle_interval: Duration,
    pop_timeout: Duration,
    metrics: WorkerMetrics,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        pool: Arc<WorkerPool>,
        notifications: NotificationListener,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            pool,
            notifications,
            idle_interval: config.idle_interval,
            pop_timeout: config.pop_timeout,
            metrics: WorkerMetrics::global(),
        }
    }

    pub fn with_metrics(mut self, metrics: WorkerMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Drain at startup, then on each notification or idle interval until
    /// `cancel` fires. Jobs already dispatched keep running in the pool.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            idle_interval = ?self.idle_interval,
            pop_timeout = ?self.pop_timeout,
            capacity = self.pool.capacity(),
            "Dispatcher started"
        );

        self.drain_pass("startup", &cancel).await;

        loop {
            let trigger = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.notifications.wait() => "notification",
                _ = tokio::time::sleep(self.idle_interval) => "idle",
            };
            self.drain_pass(trigger, &cancel).await;
        }

        info!("Dispatcher stopped");
    }

    async fn drain_pass(&mut self, trigger: &'static str, cancel: &CancellationToken) {
        // Wake-ups that arrived before this pass are covered by it
        self.notifications.clear();
        self.metrics.record_drain(trigger);

        let report = self.drain(cancel).await;
        if report.dispatched > 0 || report.malformed > 0 {
            info!(
                trigger,
                dispatched = report.dispatched,
                malformed = report.malformed,
                outcome = ?report.outcome,
                "Drain pass finished"
            );
        } else {
            debug!(trigger, outcome = ?report.outcome, "Drain pass found no work");
        }
    }

    /// Pop and dispatch until the queue is empty, the transport fails or
    /// `cancel` fires while waiting for capacity.
    pub async fn drain(&self, cancel: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::new();

        loop {
            let slot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return report.finish(DrainOutcome::Cancelled),
                slot = self.pool.reserve() => match slot {
                    Ok(slot) => slot,
                    Err(e) => {
                        warn!("Stopping drain pass: {}", e);
                        return report.finish(DrainOutcome::Cancelled);
                    }
                },
            };

            // Not raced against cancellation: an entry removed from the
            // queue must reach the pool
            let entry = match self.queue.pop(self.pop_timeout).await {
                Ok(Some(entry)) => entry,
                Ok(None) => return report.finish(DrainOutcome::Exhausted),
                Err(e) => {
                    error!("Work queue pop failed, ending drain pass: {}", e);
                    self.metrics.queue_errors.add(1, &[]);
                    return report.finish(DrainOutcome::TransportError);
                }
            };

            match Job::from_queue_entry(&entry) {
                Ok(job) => {
                    self.metrics.jobs_dispatched.add(1, &[]);
                    self.pool.dispatch(slot, job);
                    report.dispatched += 1;
                }
                Err(e) => {
                    warn!(entry = %entry, "Discarding malformed queue entry: {}", e);
                    self.metrics.malformed_entries.add(1, &[]);
                    report.malformed += 1;
                }
            }
        }
    }
}
