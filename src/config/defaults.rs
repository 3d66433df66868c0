//! Configuration default values
//!
//! This module contains all the default values for configuration options,
//! making them easily changeable in one central location.
use std::time::Duration;

// Redis defaults
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_QUEUE_KEY: &str = "presentation_Task_queue";
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "presentation_task_events";
pub const DEFAULT_STATUS_KEY_PREFIX: &str = "job_status";
pub const DEFAULT_RESULT_KEY_PREFIX: &str = "presentation";
pub const DEFAULT_RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

// Worker defaults
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_POP_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_JOB_DEADLINE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 16;
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

// Generation defaults
pub const DEFAULT_GENERATION_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Environment
pub const ENV_PREFIX: &str = "PRESENTATION_WORKER_";
pub const LEGACY_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const LEGACY_REDIS_URL_ENV: &str = "REDIS_URL";
