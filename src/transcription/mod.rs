//! Live streaming transcription
//!
//! One session wraps one audio source and one speaker label. Sessions
//! for the microphone and system audio run concurrently and fail
//! independently; events from different sessions carry no relative
//! ordering guarantee.

pub mod deepgram;

pub use deepgram::{DeepgramSession, FeedHandle};

/// One transcript result from the provider, interim or final
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    /// Speaker label fixed at session open; None means unknown
    pub speaker: Option<String>,
    /// Transcribed text
    pub content: String,
    /// Start of the utterance span, seconds on the provider clock
    pub timestamp_start: f64,
    /// End of the utterance span, seconds on the provider clock
    pub timestamp_end: f64,
    /// Final results are terminal for their span; interim results are
    /// superseded by the next event from the same session
    pub is_final: bool,
}

/// Streaming connection parameters
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub language: String,
    pub sample_rate: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: "nova-2".to_string(),
            language: "en".to_string(),
            sample_rate: 16000,
        }
    }
}
