use std::sync::Arc;

use crate::recorder::MeetingRecorder;
use crate::storage::MeetingStore;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single lifecycle controller for this process
    pub recorder: Arc<MeetingRecorder>,
    /// Durable meeting storage
    pub store: Arc<MeetingStore>,
}

impl AppState {
    pub fn new(recorder: Arc<MeetingRecorder>, store: Arc<MeetingStore>) -> Self {
        Self { recorder, store }
    }
}
