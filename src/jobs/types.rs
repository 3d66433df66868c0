//! Job type definitions and wire format

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use crate::errors::DecodeError;

/// Fewest slides a generated presentation may have
pub const MIN_SLIDES: u32 = 5;
/// Most slides a generated presentation may have
pub const MAX_SLIDES: u32 = 20;

/// Visual and tonal style requested for a presentation
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PresentationStyle {
    #[default]
    Balanced,
    Modern,
    Corporate,
    Creative,
    Academic,
}

impl PresentationStyle {
    /// Parse a producer-supplied style, falling back to `Balanced` for
    /// anything outside the known set.
    pub fn from_lenient(value: &str) -> Self {
        Self::from_str(value.trim()).unwrap_or_default()
    }
}

/// One presentation request as it travels through the work queue.
///
/// Field names follow the producer's JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub prompt: String,
    #[serde(
        rename = "numberOfSlides",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub number_of_slides: Option<i64>,
    #[serde(
        rename = "presentationStyle",
        default,
        deserialize_with = "deserialize_style",
        skip_serializing_if = "Option::is_none"
    )]
    pub presentation_style: Option<PresentationStyle>,
}

fn deserialize_style<'de, D>(deserializer: D) -> Result<Option<PresentationStyle>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|value| PresentationStyle::from_lenient(&value)))
}

impl Job {
    pub fn new(job_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            prompt: prompt.into(),
            number_of_slides: None,
            presentation_style: None,
        }
    }

    pub fn with_slides(mut self, number_of_slides: i64) -> Self {
        self.number_of_slides = Some(number_of_slides);
        self
    }

    pub fn with_style(mut self, style: PresentationStyle) -> Self {
        self.presentation_style = Some(style);
        self
    }

    /// Decode a raw work queue entry.
    pub fn from_queue_entry(entry: &str) -> Result<Self, DecodeError> {
        let job: Job = serde_json::from_str(entry)?;
        if job.job_id.trim().is_empty() {
            return Err(DecodeError::BlankField { field: "job_id" });
        }
        if job.prompt.trim().is_empty() {
            return Err(DecodeError::BlankField { field: "prompt" });
        }
        Ok(job)
    }

    pub fn to_queue_entry(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Requested slide count clamped to `[MIN_SLIDES, MAX_SLIDES]`.
    /// A missing count is treated as the minimum.
    pub fn slide_count(&self) -> u32 {
        let requested = self.number_of_slides.unwrap_or(i64::from(MIN_SLIDES));
        requested.clamp(i64::from(MIN_SLIDES), i64::from(MAX_SLIDES)) as u32
    }

    pub fn style(&self) -> PresentationStyle {
        self.presentation_style.unwrap_or_default()
    }
}

/// Lifecycle of a job as recorded in the job store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether a record currently at `self` may be overwritten with `next`.
    /// Status only moves forward and terminal states are final.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// How an executor run ended, for logs, metrics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum JobOutcome {
    /// Result and `completed` status written
    Completed,
    /// `failed` status written, no result
    Failed,
    /// The terminal status write did not land; the last durable status stays
    Stalled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_decodes_full_payload() {
        let entry = r#"{"job_id":"abc","prompt":"Rust ownership","numberOfSlides":8,"presentationStyle":"Corporate"}"#;
        let job = Job::from_queue_entry(entry).unwrap();

        assert_eq!(job.job_id, "abc");
        assert_eq!(job.prompt, "Rust ownership");
        assert_eq!(job.slide_count(), 8);
        assert_eq!(job.style(), PresentationStyle::Corporate);
    }

    #[test]
    fn test_optional_fields_default() {
        let job = Job::from_queue_entry(r#"{"job_id":"abc","prompt":"Tides"}"#).unwrap();
        assert_eq!(job.number_of_slides, None);
        assert_eq!(job.slide_count(), MIN_SLIDES);
        assert_eq!(job.style(), PresentationStyle::Balanced);
    }

    #[rstest]
    #[case(2, 5)]
    #[case(30, 20)]
    #[case(-4, 5)]
    #[case(5, 5)]
    #[case(12, 12)]
    #[case(20, 20)]
    fn test_slide_count_is_clamped(#[case] requested: i64, #[case] expected: u32) {
        let job = Job::new("id", "prompt").with_slides(requested);
        assert_eq!(job.slide_count(), expected);
    }

    #[rstest]
    #[case("modern", PresentationStyle::Modern)]
    #[case("ACADEMIC", PresentationStyle::Academic)]
    #[case(" creative ", PresentationStyle::Creative)]
    #[case("vaporwave", PresentationStyle::Balanced)]
    #[case("", PresentationStyle::Balanced)]
    fn test_style_parsing_is_lenient(#[case] raw: &str, #[case] expected: PresentationStyle) {
        assert_eq!(PresentationStyle::from_lenient(raw), expected);
    }

    #[rstest]
    #[case("not json at all")]
    #[case(r#"{"prompt":"missing id"}"#)]
    #[case(r#"{"job_id":"   ","prompt":"blank id"}"#)]
    #[case(r#"{"job_id":"abc","prompt":""}"#)]
    #[case(r#"{"job_id":"abc","prompt":"x","numberOfSlides":"seven"}"#)]
    fn test_malformed_entries_are_rejected(#[case] entry: &str) {
        assert!(Job::from_queue_entry(entry).is_err());
    }

    #[test]
    fn test_queue_entry_uses_producer_field_names() {
        let job = Job::new("abc", "Volcanoes")
            .with_slides(7)
            .with_style(PresentationStyle::Creative);
        let entry = job.to_queue_entry().unwrap();

        assert!(entry.contains(r#""numberOfSlides":7"#));
        assert!(entry.contains(r#""presentationStyle":"creative""#));
        assert_eq!(Job::from_queue_entry(&entry).unwrap(), job);
    }

    #[test]
    fn test_status_only_moves_forward() {
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_advance_to(JobStatus::Failed));
        assert!(JobStatus::Queued.can_advance_to(JobStatus::Failed));

        assert!(!JobStatus::Processing.can_advance_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.can_advance_to(JobStatus::Queued));
        assert!(!JobStatus::Completed.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_advance_to(JobStatus::Completed));
    }

    #[test]
    fn test_status_wire_names() {
        for status in [
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("done".parse::<JobStatus>().is_err());
    }
}
