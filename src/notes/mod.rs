//! Structured meeting notes via interchangeable language-model backends
//!
//! Each backend is instructed to return one fixed JSON shape. Backends
//! that wrap their output in markdown code fences are tolerated by
//! stripping the fence syntax before parsing; anything that still fails
//! to parse is a `GenerationError`, never silently-empty notes.

pub mod gemini;
pub mod openai;

pub use gemini::GeminiNotes;
pub use openai::OpenAiNotes;

use serde::{Deserialize, Serialize};

use crate::config::NotesConfig;
use crate::error::GenerationError;

/// The output-shape instructions every backend receives
pub(crate) const NOTES_INSTRUCTIONS: &str = r#"You are a meeting notes assistant. Analyze meeting transcripts and produce structured notes.

Return a JSON object with exactly this shape:
{
  "summary": "An executive summary of the meeting in 2-4 paragraphs",
  "decisions": ["Decision 1", "Decision 2"],
  "actionItems": [{"task": "Description", "assignee": "Person or null", "dueDate": "Date or null"}]
}

Rules:
- Summary should capture the key discussion points and outcomes
- Extract every decision that was made, even implicit ones
- Extract every action item, task, or follow-up mentioned
- If an assignee or due date is mentioned, include them
- Return ONLY valid JSON, no markdown fences"#;

/// Structured notes for one meeting. At most one record per meeting;
/// regeneration replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingNotes {
    pub summary: String,
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Which language-model backend generates notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotesProvider {
    OpenAi,
    Gemini,
}

/// Provider-agnostic notes generation
#[async_trait::async_trait]
pub trait NotesBackend: Send + Sync {
    /// Turn a flat transcript into structured notes
    async fn generate(&self, transcript: &str) -> Result<MeetingNotes, GenerationError>;
}

/// Construct the configured backend. Built per call so provider choice
/// can vary between meetings.
pub fn backend_for(config: &NotesConfig) -> Box<dyn NotesBackend> {
    match config.provider {
        NotesProvider::OpenAi => Box::new(OpenAiNotes::from_config(&config.openai)),
        NotesProvider::Gemini => Box::new(GeminiNotes::from_config(&config.gemini)),
    }
}

/// Strip a leading/trailing markdown code fence, tolerating an info
/// string (```json) on the opening fence.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a backend's response text into notes
pub(crate) fn parse_notes_response(text: &str) -> Result<MeetingNotes, GenerationError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned).map_err(|e| GenerationError::UnparseableResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_JSON: &str = r#"{
        "summary": "Short sync.",
        "decisions": ["Adopt the proposal"],
        "actionItems": [{"task": "Send recap", "assignee": "Ana", "dueDate": null}]
    }"#;

    #[test]
    fn fenced_json_parses_like_bare_json() {
        let bare = parse_notes_response(NOTES_JSON).unwrap();
        let fenced = parse_notes_response(&format!("```json\n{}\n```", NOTES_JSON)).unwrap();
        let plain_fence = parse_notes_response(&format!("```\n{}\n```", NOTES_JSON)).unwrap();

        assert_eq!(bare, fenced);
        assert_eq!(bare, plain_fence);
        assert_eq!(bare.summary, "Short sync.");
        assert_eq!(bare.action_items[0].assignee.as_deref(), Some("Ana"));
        assert_eq!(bare.action_items[0].due_date, None);
    }

    #[test]
    fn unparseable_response_is_an_error_not_empty_notes() {
        let err = parse_notes_response("I could not process the transcript.").unwrap_err();
        assert!(matches!(
            err,
            crate::error::GenerationError::UnparseableResponse(_)
        ));
    }

    #[test]
    fn missing_optional_sections_default_to_empty() {
        let notes = parse_notes_response(r#"{"summary": "Just talk."}"#).unwrap();
        assert!(notes.decisions.is_empty());
        assert!(notes.action_items.is_empty());
    }

    #[test]
    fn strip_fences_leaves_plain_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
    }
}
