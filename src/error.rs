//! Error taxonomy for the capture pipeline
//!
//! Each seam of the pipeline gets its own error type so callers can apply
//! the right policy: device and connection failures on the microphone path
//! abort a recording start, the same failures on the system-audio path
//! downgrade to mic-only, persistence failures are logged and swallowed,
//! and generation failures surface as a `failed` meeting status.

use thiserror::Error;

/// Capture device errors. Fatal to starting that audio source; the
/// producer never retries on its own.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("No default input device available")]
    NoDefaultDevice,

    #[error("Input device not found: {0}")]
    DeviceNotFound(String),

    #[error("No loopback/monitor input device on this machine")]
    NoLoopbackDevice,

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to open audio stream: {0}")]
    StreamFailed(String),

    #[error("Capture already running")]
    AlreadyCapturing,
}

/// Streaming transcription provider errors. Fatal for that session only.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("Websocket connect failed: {0}")]
    ConnectFailed(String),

    #[error("Provider rejected the session: HTTP {0}")]
    Rejected(u16),

    #[error("Session already open")]
    AlreadyOpen,
}

/// Durable store errors. Never propagated to the live transcript feed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),
}

/// Notes provider errors. Surface as meeting status `failed`; recovery is
/// always user-triggered regeneration.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Notes request failed: {0}")]
    RequestFailed(String),

    #[error("Notes API error: {0}")]
    ApiError(String),

    #[error("Empty provider response")]
    EmptyResponse,

    #[error("Unparseable provider response: {0}")]
    UnparseableResponse(String),
}

/// Lifecycle misuse. Treated as a benign no-op where safe (stopping with
/// nothing active); rejected otherwise.
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("No active recording")]
    NoActiveRecording,

    #[error("A recording is already active: {0}")]
    AlreadyRecording(String),

    #[error("Meeting {id} is {status}; notes can only be regenerated once it is completed or failed")]
    NotRegenerable { id: String, status: String },
}

/// Umbrella error for the recording-start path, which can die on any of
/// the device, connection, persistence, or state seams.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    State(#[from] StateError),
}
