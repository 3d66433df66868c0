//! Gemini `generateContent` client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::prompt::build_prompt;
use super::response::normalize_presentation_json;
use super::{GenerationRequest, PresentationGenerator};
use crate::config::GenerationConfig;
use crate::errors::{GenerationError, GenerationResult};

/// Upstream error bodies are truncated to this many bytes in errors and logs
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP client for a Gemini model
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> GenerationResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingApiKey)?
            .to_string();

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint(&config.base_url, &config.model),
            api_key,
        })
    }

    #[cfg(test)]
    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn endpoint(base_url: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        base_url.trim_end_matches('/'),
        model
    )
}

/// Concatenate every text part of every candidate.
fn collect_text(response: GenerateContentResponse) -> GenerationResult<String> {
    let text: String = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(text)
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[async_trait]
impl PresentationGenerator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult<String> {
        let prompt = build_prompt(request);
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
        };

        debug!(
            job_id = %request.job_id,
            slides = request.slide_count,
            style = %request.style,
            "Requesting presentation from {}", self.endpoint
        );
        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = collect_text(parsed)?;
        let presentation = normalize_presentation_json(&text)?;
        info!(
            job_id = %request.job_id,
            bytes = presentation.len(),
            "Presentation generated"
        );
        Ok(presentation)
    }
}
