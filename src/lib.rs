pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod merge;
pub mod notes;
pub mod recorder;
pub mod storage;
pub mod transcription;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource,
};
pub use config::Config;
pub use error::{
    ConnectionError, DeviceError, GenerationError, PersistenceError, RecorderError, StateError,
};
pub use http::{create_router, AppState};
pub use merge::{InterimSlot, LiveUpdate, SlotKey, TranscriptMerger};
pub use notes::{ActionItem, MeetingNotes, NotesBackend, NotesProvider};
pub use recorder::{finalize_meeting, MeetingRecorder, StopOutcome};
pub use storage::{MeetingMeta, MeetingStatus, MeetingStore, TranscriptEntry};
pub use transcription::{DeepgramSession, LiveConfig, TranscriptEvent};
