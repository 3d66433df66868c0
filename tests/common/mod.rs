//! Shared fixtures for job processing tests

#![allow(dead_code)]

pub mod fake_redis;

use async_trait::async_trait;
use presentation_worker::config::WorkerConfig;
use presentation_worker::errors::{GenerationError, GenerationResult};
use presentation_worker::generation::{GenerationRequest, PresentationGenerator};
use presentation_worker::jobs::{
    Dispatcher, InMemoryJobStore, InMemoryWorkQueue, JobStatus, JobStore, NotificationHub,
    TaskExecutor, WorkerPool,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Generator with scripted behaviour that records every request
#[derive(Default)]
pub struct ScriptedGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
    failing: HashSet<String>,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail generation for this job id.
    pub fn failing_for(mut self, job_id: &str) -> Self {
        self.failing.insert(job_id.to_string());
        self
    }

    /// Take this long to answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_for(&self, job_id: &str) -> Option<GenerationRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .find(|request| request.job_id == job_id)
            .cloned()
    }

    /// Highest number of generation calls seen in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresentationGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<String> {
        self.requests.lock().await.push(request.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(&request.job_id) {
            return Err(GenerationError::Upstream {
                status: 500,
                body: "scripted failure".to_string(),
            });
        }
        Ok(format!(
            r#"{{"title":"{}","slides":{}}}"#,
            request.topic, request.slide_count
        ))
    }
}

/// A dispatcher wired to in-memory backends
pub struct Harness {
    pub queue: Arc<InMemoryWorkQueue>,
    pub store: Arc<InMemoryJobStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub hub: NotificationHub,
    pub pool: Arc<WorkerPool>,
    pub config: WorkerConfig,
}

impl Harness {
    pub fn new(
        queue: InMemoryWorkQueue,
        store: InMemoryJobStore,
        generator: ScriptedGenerator,
        config: WorkerConfig,
    ) -> Self {
        let queue = Arc::new(queue);
        let store = Arc::new(store);
        let generator = Arc::new(generator);
        let executor = TaskExecutor::new(store.clone(), generator.clone(), config.retention);
        let pool = Arc::new(WorkerPool::new(
            Arc::new(executor),
            config.max_concurrent_jobs,
            config.job_deadline,
        ));
        Self {
            queue,
            store,
            generator,
            hub: NotificationHub::new(config.notification_capacity),
            pool,
            config,
        }
    }

    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            InMemoryWorkQueue::with_entries(entries),
            InMemoryJobStore::new(),
            ScriptedGenerator::new(),
            WorkerConfig::default(),
        )
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(
            self.queue.clone(),
            self.pool.clone(),
            self.hub.subscribe(),
            &self.config,
        )
    }

    /// Poll the store until `job_id` reaches `status` or `timeout` passes.
    pub async fn wait_for_status(&self, job_id: &str, status: JobStatus, timeout: Duration) -> bool {
        wait_for_status(self.store.as_ref(), job_id, status, timeout).await
    }
}

pub async fn wait_for_status(
    store: &dyn JobStore,
    job_id: &str,
    status: JobStatus,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(current)) = store.status(job_id).await {
            if current == status {
                return true;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub fn entry(job_id: &str, prompt: &str) -> String {
    format!(r#"{{"job_id":"{job_id}","prompt":"{prompt}"}}"#)
}

pub fn entry_with_slides(job_id: &str, prompt: &str, slides: i64) -> String {
    format!(r#"{{"job_id":"{job_id}","prompt":"{prompt}","numberOfSlides":{slides}}}"#)
}
