// Integration tests for the notes generation adapters
//
// Both backends are pointed at a local mock server; the assertions
// cover the fixed JSON output shape, code-fence tolerance, and the
// error taxonomy mapping for provider failures.

use std::sync::Arc;

use mint_meetings::config::{
    Config, HttpConfig, NotesConfig, ProviderConfig, ServiceConfig, TranscriptionConfig,
};
use mint_meetings::error::GenerationError;
use mint_meetings::notes::{GeminiNotes, NotesBackend, NotesProvider, OpenAiNotes};
use mint_meetings::recorder::MeetingRecorder;
use mint_meetings::storage::{MeetingStatus, MeetingStore, TranscriptEntry};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOTES_JSON: &str = r#"{"summary":"We aligned on scope.","decisions":["Cut feature X"],"actionItems":[{"task":"Update the roadmap","assignee":"Pat","dueDate":null}]}"#;

fn openai_backend(server: &MockServer) -> OpenAiNotes {
    OpenAiNotes::from_config(&ProviderConfig {
        api_key: "test-key".to_string(),
        model: None,
        base_url: Some(server.uri()),
    })
}

fn gemini_backend(server: &MockServer) -> GeminiNotes {
    GeminiNotes::from_config(&ProviderConfig {
        api_key: "test-key".to_string(),
        model: None,
        base_url: Some(server.uri()),
    })
}

#[tokio::test]
async fn openai_backend_parses_the_fixed_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": NOTES_JSON}}]
        })))
        .mount(&server)
        .await;

    let notes = openai_backend(&server)
        .generate("Me: let's cut feature X")
        .await
        .unwrap();

    assert_eq!(notes.summary, "We aligned on scope.");
    assert_eq!(notes.decisions, vec!["Cut feature X"]);
    assert_eq!(notes.action_items.len(), 1);
    assert_eq!(notes.action_items[0].assignee.as_deref(), Some("Pat"));
    assert_eq!(notes.action_items[0].due_date, None);
}

#[tokio::test]
async fn fenced_response_parses_like_bare_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": format!("```json\n{}\n```", NOTES_JSON)}}]
        })))
        .mount(&server)
        .await;

    let notes = openai_backend(&server).generate("transcript").await.unwrap();
    assert_eq!(notes.summary, "We aligned on scope.");
}

#[tokio::test]
async fn non_json_response_is_a_generation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Sorry, I can't summarize that."}}]
        })))
        .mount(&server)
        .await;

    let err = openai_backend(&server).generate("transcript").await.unwrap_err();
    assert!(matches!(err, GenerationError::UnparseableResponse(_)));
}

#[tokio::test]
async fn provider_status_codes_map_to_the_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = openai_backend(&server).generate("transcript").await.unwrap_err();
    assert!(matches!(err, GenerationError::InvalidApiKey));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = openai_backend(&server).generate("transcript").await.unwrap_err();
    assert!(matches!(err, GenerationError::RateLimited));
}

#[tokio::test]
async fn gemini_backend_parses_joined_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [
                {"text": "```json\n"},
                {"text": NOTES_JSON},
                {"text": "\n```"}
            ]}}]
        })))
        .mount(&server)
        .await;

    let notes = gemini_backend(&server).generate("transcript").await.unwrap();
    assert_eq!(notes.decisions, vec!["Cut feature X"]);
}

#[tokio::test]
async fn gemini_empty_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/gemini-2.0-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let err = gemini_backend(&server).generate("transcript").await.unwrap_err();
    assert!(matches!(err, GenerationError::EmptyResponse));
}

// ----------------------------------------------------------------------------
// Recorder-level regeneration through a configured backend
// ----------------------------------------------------------------------------

fn test_config(storage_root: &std::path::Path, openai_base: String) -> Config {
    Config {
        service: ServiceConfig {
            name: "mint-meetings-test".to_string(),
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 0,
            },
        },
        storage: mint_meetings::config::StorageConfig {
            root: storage_root.to_path_buf(),
        },
        audio: Default::default(),
        transcription: TranscriptionConfig {
            api_key: "unused".to_string(),
            model: "nova-2".to_string(),
            language: "en".to_string(),
            mic_label: "Me".to_string(),
            system_label: "Others".to_string(),
        },
        notes: NotesConfig {
            provider: NotesProvider::OpenAi,
            openai: ProviderConfig {
                api_key: "test-key".to_string(),
                model: None,
                base_url: Some(openai_base),
            },
            gemini: Default::default(),
        },
    }
}

#[tokio::test]
async fn regeneration_runs_through_the_configured_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": NOTES_JSON}}]
        })))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let store = Arc::new(MeetingStore::new(temp.path()));
    let recorder = MeetingRecorder::new(test_config(temp.path(), server.uri()), Arc::clone(&store));

    // A finished meeting with a transcript but no notes yet
    let meta = store.create_meeting("Regen me").await.unwrap();
    store
        .append_entry(
            &meta.id,
            &TranscriptEntry {
                speaker: Some("Me".to_string()),
                content: "We cut feature X".to_string(),
                timestamp_start: 0.0,
                timestamp_end: 1.0,
            },
        )
        .await
        .unwrap();
    store
        .update_status(&meta.id, MeetingStatus::Failed, Some(chrono::Utc::now()))
        .await
        .unwrap();

    let status = recorder.regenerate_notes(&meta.id).await.unwrap();
    assert_eq!(status, MeetingStatus::Completed);
    assert!(store.get_notes(&meta.id).await.unwrap().is_some());
}

#[tokio::test]
async fn regeneration_is_rejected_while_recording() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MeetingStore::new(temp.path()));
    let recorder = MeetingRecorder::new(
        test_config(temp.path(), "http://127.0.0.1:1".to_string()),
        Arc::clone(&store),
    );

    // Freshly created meetings are in `recording`
    let meta = store.create_meeting("Still going").await.unwrap();

    let err = recorder.regenerate_notes(&meta.id).await.unwrap_err();
    assert!(matches!(
        err,
        mint_meetings::RecorderError::State(mint_meetings::StateError::NotRegenerable { .. })
    ));
}
