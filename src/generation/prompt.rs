//! Prompt construction for presentation generation

use super::GenerationRequest;
use crate::jobs::types::PresentationStyle;

/// Tone guidance for each presentation style.
pub fn style_instruction(style: PresentationStyle) -> &'static str {
    match style {
        PresentationStyle::Modern => {
            "Keep it modern and minimal: short sentences, few words per slide, only the essentials."
        }
        PresentationStyle::Corporate => {
            "Keep it corporate: formal wording, data-driven points and clear business takeaways."
        }
        PresentationStyle::Creative => {
            "Keep it creative: vivid language, surprising analogies and a conversational tone."
        }
        PresentationStyle::Academic => {
            "Keep it academic: precise terminology, careful explanations and a logical progression."
        }
        PresentationStyle::Balanced => {
            "Keep it balanced: clear, informative content for a general audience."
        }
    }
}

/// Full prompt sent to the model for one request.
pub fn build_prompt(request: &GenerationRequest) -> String {
    format!(
        r#"Write a presentation as a single JSON object with this shape:
{{
  "title": string,
  "slides": [
    {{ "type": "title", "title": string, "subtitle": string }},
    {{ "type": "content", "title": string, "bullets": [string], "description": string, "imagePrompt": string }},
    {{ "type": "conclusion", "title": string, "bullets": [string], "description": string, "imagePrompt": string }}
  ]
}}
Use exactly {slides} slides in total: the first is the title slide and the last is the conclusion.
Content slides carry 3-5 bullets, a 3-5 line description expanding on them and an imagePrompt describing an illustration.
Style ({style}): {instruction}
If the topic is harmful, illegal or explicit, return a presentation titled "Request Rejected" with one slide explaining why.
Return only the JSON, without markdown fences or commentary.

Topic: {topic}"#,
        slides = request.slide_count,
        style = request.style.as_ref(),
        instruction = style_instruction(request.style),
        topic = request.topic.trim(),
    )
}
