//! Job processing
//!
//! Producers push serialized jobs onto a [`WorkQueue`] and publish a
//! wake-up on the notification channel. The [`Dispatcher`] drains the queue
//! at startup, on notifications and on an idle timer, handing each decoded
//! job to the [`WorkerPool`]. A [`TaskExecutor`] then walks the job through
//! `processing` to `completed` or `failed` in the [`JobStore`].
//!
//! Delivery is at-most-once: a popped entry is gone from the queue, and a
//! job interrupted by a crash or an expired deadline stays `processing`.

pub mod dispatcher;
pub mod executor;
pub mod job_store;
pub mod lifecycle;
pub mod memory;
pub mod notifier;
pub mod producer;
pub mod redis_backend;
pub mod types;
pub mod work_queue;
pub mod worker_pool;

pub use dispatcher::{Dispatcher, DrainOutcome, DrainReport};
pub use executor::TaskExecutor;
pub use job_store::JobStore;
pub use lifecycle::LifecycleController;
pub use memory::{InMemoryJobStore, InMemoryWorkQueue};
pub use notifier::{NotificationHub, NotificationListener, NotificationPublisher};
pub use producer::JobSubmitter;
pub use redis_backend::RedisBackend;
pub use types::{Job, JobOutcome, JobStatus, PresentationStyle};
pub use work_queue::WorkQueue;
pub use worker_pool::{PoolSlot, ShutdownReport, WorkerPool};
