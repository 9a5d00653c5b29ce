//! Transcript merge & buffer
//!
//! Consumes transcript events from one or more streaming sessions.
//! Interim results replace only their own (session, speaker) slot; final
//! results silently evict that slot and go to the durable store and the
//! live feed. Ordering across slots is arrival order only; cross-speaker
//! chronology is left to the provider timestamps carried on each entry,
//! so interleaved interim display can run ahead of the clock. Last event
//! wins per slot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::error;
use uuid::Uuid;

use crate::storage::{MeetingStore, TranscriptEntry};
use crate::transcription::TranscriptEvent;

/// One interim slot: one session, one speaker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub session_id: Uuid,
    pub speaker: Option<String>,
}

/// At most one outstanding not-yet-final entry per slot
#[derive(Debug, Clone, Default)]
pub enum InterimSlot {
    #[default]
    Empty,
    Interim(TranscriptEntry),
}

impl InterimSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, InterimSlot::Empty)
    }
}

/// What the live transcript feed carries to subscribers
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    pub session_id: Uuid,
    pub entry: TranscriptEntry,
    pub is_final: bool,
}

/// Per-meeting merge state. Slots are mutated only here; the merge task
/// owns one instance for the lifetime of a recording.
pub struct TranscriptMerger {
    meeting_id: String,
    store: Arc<MeetingStore>,
    slots: HashMap<SlotKey, InterimSlot>,
    live_tx: broadcast::Sender<LiveUpdate>,
}

impl TranscriptMerger {
    pub fn new(
        meeting_id: impl Into<String>,
        store: Arc<MeetingStore>,
        live_tx: broadcast::Sender<LiveUpdate>,
    ) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            store,
            slots: HashMap::new(),
            live_tx,
        }
    }

    pub async fn handle_event(&mut self, session_id: Uuid, event: TranscriptEvent) {
        let entry = TranscriptEntry {
            speaker: event.speaker.clone(),
            content: event.content,
            timestamp_start: event.timestamp_start,
            timestamp_end: event.timestamp_end,
        };
        let key = SlotKey {
            session_id,
            speaker: event.speaker,
        };

        if event.is_final {
            // The outstanding interim for this slot is superseded; it is
            // never persisted.
            self.slots.insert(key, InterimSlot::Empty);

            if let Err(e) = self.store.append_entry(&self.meeting_id, &entry).await {
                // Append failures never reach the live feed
                error!(
                    "Failed to persist transcript entry for {}: {}",
                    self.meeting_id, e
                );
            }

            let _ = self.live_tx.send(LiveUpdate {
                session_id,
                entry,
                is_final: true,
            });
        } else {
            self.slots
                .insert(key, InterimSlot::Interim(entry.clone()));

            let _ = self.live_tx.send(LiveUpdate {
                session_id,
                entry,
                is_final: false,
            });
        }
    }

    /// Slot state for one (session, speaker) pair
    pub fn slot(&self, session_id: Uuid, speaker: Option<&str>) -> &InterimSlot {
        let key = SlotKey {
            session_id,
            speaker: speaker.map(str::to_string),
        };
        self.slots.get(&key).unwrap_or(&InterimSlot::Empty)
    }

    /// All outstanding interim entries across slots, in no particular order
    pub fn interims(&self) -> Vec<&TranscriptEntry> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                InterimSlot::Interim(entry) => Some(entry),
                InterimSlot::Empty => None,
            })
            .collect()
    }
}
