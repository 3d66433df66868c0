//! Centralized error handling for the presentation worker
//!
//! Every fallible boundary in the worker has its own error type so that the
//! dispatcher and executor can decide what to do with a failure (drop the
//! entry, mark the job failed, end the drain pass) by matching on the type
//! rather than on strings.
//!
//! # Error Categories
//!
//! - **Queue Errors**: work queue and notification transport failures
//! - **Store Errors**: job status/result writes and reads
//! - **Decode Errors**: malformed queue entries
//! - **Generation Errors**: the external generation call and its output
//!
//! # Usage
//!
//! ```rust
//! use presentation_worker::errors::{WorkerError, WorkerResult};
//!
//! fn example_function() -> WorkerResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using WorkerError
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Convenience type alias for work queue and notification Results
pub type QueueResult<T> = Result<T, QueueError>;

/// Convenience type alias for job store Results
pub type StoreResult<T> = Result<T, StoreError>;

/// Convenience type alias for generation Results
pub type GenerationResult<T> = Result<T, GenerationError>;
