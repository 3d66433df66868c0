//! Best-effort wake-up signals for the dispatcher
//!
//! Notifications only shorten the time between an enqueue and the next drain
//! pass. Losing one is harmless: the dispatcher's idle timer and its startup
//! drain still pick the job up.

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::errors::QueueResult;

/// Producer side of the notification channel
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Announce new work. The payload is informational only.
    async fn publish(&self, payload: &str) -> QueueResult<()>;
}

/// In-process fan-out of wake-up signals.
///
/// The Redis relay forwards pub/sub messages into a hub; tests and
/// single-process setups publish into it directly.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<()>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> NotificationListener {
        NotificationListener::new(self.sender.subscribe())
    }

    /// Wake every listener. Returns how many listeners were reached.
    pub fn notify(&self) -> usize {
        self.sender.send(()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationPublisher for NotificationHub {
    async fn publish(&self, payload: &str) -> QueueResult<()> {
        let reached = self.notify();
        debug!(payload, reached, "Published in-process notification");
        Ok(())
    }
}

/// Dispatcher side of the notification channel
#[derive(Debug)]
pub struct NotificationListener {
    receiver: Option<broadcast::Receiver<()>>,
}

impl NotificationListener {
    pub fn new(receiver: broadcast::Receiver<()>) -> Self {
        Self {
            receiver: Some(receiver),
        }
    }

    /// A listener that never fires; the dispatcher then relies on its timer.
    pub fn disconnected() -> Self {
        Self { receiver: None }
    }

    #[cfg(test)]
    fn is_connected(&self) -> bool {
        self.receiver.is_some()
    }

    /// Resolve on the next notification. Several missed notifications count
    /// as one wake-up. Once the channel closes this never resolves.
    pub async fn wait(&mut self) {
        loop {
            let Some(receiver) = self.receiver.as_mut() else {
                return std::future::pending().await;
            };
            match receiver.recv().await {
                Ok(()) => return,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Coalesced missed notifications into one wake-up");
                    return;
                }
                Err(RecvError::Closed) => {
                    warn!("Notification channel closed, relying on the idle timer");
                    self.receiver = None;
                }
            }
        }
    }

    /// Drop wake-ups already buffered; a drain pass about to start covers them.
    pub fn clear(&mut self) {
        let Some(receiver) = self.receiver.as_mut() else {
            return;
        };
        loop {
            match receiver.try_recv() {
                Ok(()) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}
