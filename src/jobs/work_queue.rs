//! Work queue abstraction shared by producers and the dispatcher

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::QueueResult;

/// Durable FIFO hand-off between producers and the worker.
///
/// `pop` removes the entry immediately and irrevocably; there is no
/// acknowledgement or redelivery.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append a serialized job at the producer end.
    async fn push(&self, entry: &str) -> QueueResult<()>;

    /// Wait up to `timeout` for the oldest entry. `Ok(None)` means the wait
    /// timed out with nothing available.
    async fn pop(&self, timeout: Duration) -> QueueResult<Option<String>>;
}
