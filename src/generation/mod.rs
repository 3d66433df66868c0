//! External presentation generation
//!
//! The worker treats generation as an opaque, slow, fallible call behind
//! [`PresentationGenerator`]. [`GeminiClient`] is the production
//! implementation; tests substitute scripted generators.

use async_trait::async_trait;

pub mod gemini;
pub mod prompt;
pub mod response;

pub use gemini::GeminiClient;

use crate::errors::GenerationResult;
use crate::jobs::types::{Job, PresentationStyle};

/// Normalised inputs for one generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub job_id: String,
    pub topic: String,
    /// Already clamped to the supported range
    pub slide_count: u32,
    pub style: PresentationStyle,
}

impl From<&Job> for GenerationRequest {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.clone(),
            topic: job.prompt.clone(),
            slide_count: job.slide_count(),
            style: job.style(),
        }
    }
}

/// Produces a presentation document (JSON text) for a request.
///
/// Implementations are not expected to enforce deadlines; callers wrap the
/// future in a timeout and drop it when the budget runs out.
#[async_trait]
pub trait PresentationGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<String>;
}
