use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/meetings/record/start", post(handlers::start_recording))
        .route("/meetings/record/stop", post(handlers::stop_recording))
        // Device selection
        .route("/audio/devices", get(handlers::list_audio_devices))
        // Meeting queries
        .route("/meetings", get(handlers::list_meetings))
        .route("/meetings/:meeting_id", get(handlers::get_meeting))
        .route("/meetings/:meeting_id", patch(handlers::rename_meeting))
        .route("/meetings/:meeting_id", delete(handlers::delete_meeting))
        .route("/meetings/:meeting_id/tags", put(handlers::set_tags))
        .route(
            "/meetings/:meeting_id/transcript",
            get(handlers::get_transcript),
        )
        .route("/meetings/:meeting_id/notes", get(handlers::get_notes))
        .route(
            "/meetings/:meeting_id/notes/regenerate",
            post(handlers::regenerate_notes),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
