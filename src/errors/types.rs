//! Error type definitions for the presentation worker
//!
//! The hierarchy mirrors the failure classes the worker distinguishes:
//! transport failures end a drain pass, decode failures drop a single entry,
//! and generation failures mark a job as failed.

use thiserror::Error;

use crate::jobs::types::JobStatus;

/// Top-level worker error type
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Work queue or notification errors
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Job store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed queue entry
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// External generation call errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// The per-job deadline elapsed during the named stage
    #[error("Deadline exceeded while {stage}")]
    DeadlineExceeded { stage: &'static str },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The worker pool was closed while a slot was requested
    #[error("Worker pool is shut down")]
    PoolClosed,
}

impl WorkerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Work queue and notification transport errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// Redis transport failure
    #[error("Redis transport error: {0}")]
    Transport(#[from] redis::RedisError),

    /// Backend not reachable (used by non-Redis backends)
    #[error("Queue unavailable: {message}")]
    Unavailable { message: String },
}

/// Job store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Redis transport failure
    #[error("Redis transport error: {0}")]
    Transport(#[from] redis::RedisError),

    /// Backend not reachable (used by non-Redis backends)
    #[error("Store unavailable: {message}")]
    Unavailable { message: String },

    /// A write-once key already holds a value
    #[error("Key '{key}' already written")]
    Conflict { key: String },

    /// A status write would move the job backwards
    #[error("Status of job '{job_id}' cannot move from {from} to {to}")]
    Regression {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    /// Stored value could not be interpreted
    #[error("Invalid stored value for key '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors decoding a work queue entry into a job
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Entry is not a valid job JSON object
    #[error("Invalid job payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Required field present but blank
    #[error("Job field '{field}' must not be blank")]
    BlankField { field: &'static str },
}

/// Errors from the external generation call
#[derive(Error, Debug)]
pub enum GenerationError {
    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Upstream answered without any text content
    #[error("Upstream returned no text content")]
    EmptyResponse,

    /// Generated text could not be turned into a presentation document
    #[error("Generated content is not valid presentation JSON: {message}")]
    InvalidContent { message: String },

    /// No API key configured
    #[error("Generation API key is not configured")]
    MissingApiKey,
}
