//! Durable meeting storage
//!
//! Each meeting owns a folder under the storage root:
//! - `metadata.json`: id, title, status, startedAt, endedAt (+tags)
//! - `transcript.md`: append-only log, one line per finalized entry
//! - `notes.md`: optional structured notes document
//! - `audio/`: optional archived WAV chunks
//!
//! The markdown layouts are a frozen wire contract; re-parsing a
//! transcript log yields the same ordered entry sequence at second
//! precision.

pub mod markdown;
pub mod store;

pub use store::MeetingStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Meeting lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Recording,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MeetingStatus::Recording => "recording",
            MeetingStatus::Processing => "processing",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Persisted meeting record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMeta {
    /// Stable identity, derived once from start time and title slug
    pub id: String,
    pub title: String,
    pub status: MeetingStatus,
    pub started_at: DateTime<Utc>,
    /// Set once, on the first completion or failure
    pub ended_at: Option<DateTime<Utc>>,
    /// Mutable tag-id set; omitted from disk while empty so the
    /// metadata layout stays byte-compatible
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One finalized transcript segment. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// None means unknown; persisted as the literal `Unknown`
    pub speaker: Option<String>,
    pub content: String,
    /// Seconds on the provider clock
    pub timestamp_start: f64,
    pub timestamp_end: f64,
}
