//! Startup and shutdown coordination

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::dispatcher::Dispatcher;
use super::worker_pool::{ShutdownReport, WorkerPool};

/// Owns the root cancellation token for the worker.
///
/// Cancelling stops the dispatcher between drain attempts; the pool then
/// gets `shutdown_grace` to finish in-flight jobs.
pub struct LifecycleController {
    token: CancellationToken,
    shutdown_grace: Duration,
}

impl LifecycleController {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            shutdown_grace,
        }
    }

    /// Token observed by the dispatcher and auxiliary tasks.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Cancel the token on SIGTERM or SIGINT (Ctrl+C elsewhere).
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        let token = self.token.clone();
        let signal = shutdown_signal()?;

        Ok(tokio::spawn(async move {
            tokio::select! {
                _ = signal => token.cancel(),
                _ = token.cancelled() => {}
            }
        }))
    }

    /// Run the dispatcher until cancellation, then shut the pool down.
    pub async fn run(&self, mut dispatcher: Dispatcher, pool: Arc<WorkerPool>) -> ShutdownReport {
        dispatcher.run(self.token.clone()).await;

        info!(
            in_flight = pool.active(),
            "Stopping worker, grace period {:?}", self.shutdown_grace
        );
        let report = pool.shutdown(self.shutdown_grace).await;
        info!(abandoned = report.abandoned, "Worker stopped");
        report
    }
}

#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), shutting down gracefully"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down gracefully"),
            Err(e) => {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::errors::GenerationResult;
    use crate::generation::{GenerationRequest, PresentationGenerator};
    use crate::jobs::executor::TaskExecutor;
    use crate::jobs::memory::{InMemoryJobStore, InMemoryWorkQueue};
    use crate::jobs::notifier::NotificationListener;
    use async_trait::async_trait;

    struct SleepingGenerator(Duration);

    #[async_trait]
    impl PresentationGenerator for SleepingGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> GenerationResult<String> {
            tokio::time::sleep(self.0).await;
            Ok("{}".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_after_cancellation() {
        let config = WorkerConfig::default();
        let queue = Arc::new(InMemoryWorkQueue::with_entries([
            r#"{"job_id":"slow","prompt":"topic"}"#,
        ]));
        let executor = TaskExecutor::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(SleepingGenerator(Duration::from_secs(60))),
            config.retention,
        );
        let pool = Arc::new(WorkerPool::new(Arc::new(executor), 4, config.job_deadline));
        let dispatcher = Dispatcher::new(
            queue,
            pool.clone(),
            NotificationListener::disconnected(),
            &config,
        );

        let lifecycle = LifecycleController::new(Duration::from_secs(1));
        let token = lifecycle.token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });

        let report = lifecycle.run(dispatcher, pool).await;
        assert_eq!(report.abandoned, 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_shared_token() {
        let lifecycle = LifecycleController::new(Duration::from_secs(1));
        let token = lifecycle.token();
        let signals = lifecycle.listen_for_signals().unwrap();

        lifecycle.shutdown();
        assert!(token.is_cancelled());
        // The signal listener exits once the token is cancelled
        signals.await.unwrap();
    }
}
