use super::state::AppState;
use crate::error::{PersistenceError, RecorderError, StateError};
use crate::storage::MeetingStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    /// Optional meeting title (defaults to a timestamped one)
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub meeting_id: String,
    pub status: MeetingStatus,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub meeting_id: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RegenerateResponse {
    pub meeting_id: String,
    pub status: MeetingStatus,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn recorder_error_response(e: RecorderError) -> axum::response::Response {
    let status = match &e {
        RecorderError::State(StateError::AlreadyRecording(_)) => StatusCode::CONFLICT,
        RecorderError::State(StateError::NotRegenerable { .. }) => StatusCode::CONFLICT,
        RecorderError::Persistence(PersistenceError::MeetingNotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

fn persistence_error_response(e: PersistenceError) -> axum::response::Response {
    let status = match &e {
        PersistenceError::MeetingNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /meetings/record/start
/// Start a new recording
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> impl IntoResponse {
    match state.recorder.start(req.title).await {
        Ok(meta) => (
            StatusCode::OK,
            Json(StartRecordingResponse {
                meeting_id: meta.id,
                status: meta.status,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start recording: {}", e);
            recorder_error_response(e)
        }
    }
}

/// POST /meetings/record/stop
/// Stop the active recording; a no-op when nothing is recording
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.recorder.stop().await {
        Some(outcome) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                meeting_id: Some(outcome.meeting_id),
                status: outcome.status.to_string(),
            }),
        )
            .into_response(),
        None => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                meeting_id: None,
                status: "idle".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /meetings
/// All meetings, newest first
pub async fn list_meetings(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.list_meetings().await {
        Ok(meetings) => (StatusCode::OK, Json(meetings)).into_response(),
        Err(e) => {
            error!("Failed to list meetings: {}", e);
            persistence_error_response(e)
        }
    }
}

/// GET /meetings/:meeting_id
pub async fn get_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_meeting(&meeting_id).await {
        Ok(meta) => (StatusCode::OK, Json(meta)).into_response(),
        Err(e) => persistence_error_response(e),
    }
}

/// PATCH /meetings/:meeting_id
/// Rename a meeting
pub async fn rename_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Json(req): Json<RenameRequest>,
) -> impl IntoResponse {
    match state.store.rename_meeting(&meeting_id, &req.title).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => persistence_error_response(e),
    }
}

/// PUT /meetings/:meeting_id/tags
/// Replace the tag set
pub async fn set_tags(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Json(req): Json<TagsRequest>,
) -> impl IntoResponse {
    match state.store.set_tags(&meeting_id, req.tags).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => persistence_error_response(e),
    }
}

/// DELETE /meetings/:meeting_id
/// Remove the meeting and all descendant records
pub async fn delete_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_meeting(&meeting_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete meeting {}: {}", meeting_id, e);
            persistence_error_response(e)
        }
    }
}

/// GET /meetings/:meeting_id/transcript
/// Finalized transcript entries, re-parsed from the durable log
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_entries(&meeting_id).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => persistence_error_response(e),
    }
}

/// GET /meetings/:meeting_id/notes
pub async fn get_notes(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_notes(&meeting_id).await {
        Ok(Some(notes)) => (StatusCode::OK, Json(notes)).into_response(),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            format!("No notes for meeting {}", meeting_id),
        ),
        Err(e) => persistence_error_response(e),
    }
}

/// POST /meetings/:meeting_id/notes/regenerate
/// User-triggered regeneration on a completed or failed meeting
pub async fn regenerate_notes(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.recorder.regenerate_notes(&meeting_id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(RegenerateResponse { meeting_id, status }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to regenerate notes for {}: {}", meeting_id, e);
            recorder_error_response(e)
        }
    }
}

/// GET /audio/devices
/// Names of the available input devices
pub async fn list_audio_devices() -> impl IntoResponse {
    match crate::audio::list_input_devices() {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(e) => {
            error!("Failed to enumerate input devices: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
