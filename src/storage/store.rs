use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use super::markdown;
use super::{MeetingMeta, MeetingStatus, TranscriptEntry};
use crate::error::PersistenceError;
use crate::notes::MeetingNotes;

const METADATA_FILE: &str = "metadata.json";
const TRANSCRIPT_FILE: &str = "transcript.md";
const NOTES_FILE: &str = "notes.md";

/// Durable transcript store: one folder per meeting plus an in-memory
/// buffer of finalized entries for fast summarization. The buffer is an
/// optimization only; the disk log re-parses to an equivalent sequence.
pub struct MeetingStore {
    root: PathBuf,
    buffers: Mutex<HashMap<String, Vec<TranscriptEntry>>>,
}

impl MeetingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            buffers: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meeting_dir(&self, meeting_id: &str) -> PathBuf {
        self.root.join(meeting_id)
    }

    /// Reject ids that could walk out of the storage root
    fn check_id(meeting_id: &str) -> Result<(), PersistenceError> {
        if meeting_id.is_empty()
            || meeting_id.contains('/')
            || meeting_id.contains('\\')
            || meeting_id.contains("..")
        {
            return Err(PersistenceError::MeetingNotFound(meeting_id.to_string()));
        }
        Ok(())
    }

    /// Create the meeting record and an empty transcript log.
    /// The id is derived once: `<start-timestamp>_<title-slug>`.
    pub async fn create_meeting(&self, title: &str) -> Result<MeetingMeta, PersistenceError> {
        fs::create_dir_all(&self.root).await?;

        let now = Utc::now();
        let id = format!(
            "{}_{}",
            now.format("%Y-%m-%dT%H-%M-%S"),
            markdown::slugify(title)
        );
        let dir = self.meeting_dir(&id);
        fs::create_dir_all(&dir).await?;

        let meta = MeetingMeta {
            id: id.clone(),
            title: title.to_string(),
            status: MeetingStatus::Recording,
            started_at: now,
            ended_at: None,
            tags: Vec::new(),
        };

        self.write_meta(&meta).await?;
        fs::write(dir.join(TRANSCRIPT_FILE), markdown::transcript_header(title)).await?;

        self.buffers.lock().await.insert(id.clone(), Vec::new());

        info!("Created meeting {}", id);
        Ok(meta)
    }

    pub async fn get_meeting(&self, meeting_id: &str) -> Result<MeetingMeta, PersistenceError> {
        Self::check_id(meeting_id)?;
        self.read_meta(meeting_id).await
    }

    /// All meetings under the root, newest first
    pub async fn list_meetings(&self) -> Result<Vec<MeetingMeta>, PersistenceError> {
        fs::create_dir_all(&self.root).await?;

        let mut meetings = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            // Skip folders without valid metadata
            if let Ok(meta) = self.read_meta(&id).await {
                meetings.push(meta);
            }
        }

        meetings.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(meetings)
    }

    /// Transition the meeting status. `ended_at` is written only while
    /// still null, so the first completion/failure timestamp sticks.
    pub async fn update_status(
        &self,
        meeting_id: &str,
        status: MeetingStatus,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<(), PersistenceError> {
        let mut meta = self.get_meeting(meeting_id).await?;
        meta.status = status;
        if meta.ended_at.is_none() {
            meta.ended_at = ended_at;
        }
        self.write_meta(&meta).await
    }

    pub async fn rename_meeting(
        &self,
        meeting_id: &str,
        new_title: &str,
    ) -> Result<(), PersistenceError> {
        let mut meta = self.get_meeting(meeting_id).await?;
        meta.title = new_title.to_string();
        self.write_meta(&meta).await
    }

    pub async fn set_tags(
        &self,
        meeting_id: &str,
        tags: Vec<String>,
    ) -> Result<(), PersistenceError> {
        let mut meta = self.get_meeting(meeting_id).await?;
        meta.tags = tags;
        self.write_meta(&meta).await
    }

    /// Append one finalized entry to the durable log and the in-memory
    /// buffer. Entries are immutable once written.
    pub async fn append_entry(
        &self,
        meeting_id: &str,
        entry: &TranscriptEntry,
    ) -> Result<(), PersistenceError> {
        Self::check_id(meeting_id)?;

        let line = markdown::transcript_line(entry);
        let path = self.meeting_dir(meeting_id).join(TRANSCRIPT_FILE);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;

        self.buffers
            .lock()
            .await
            .entry(meeting_id.to_string())
            .or_default()
            .push(entry.clone());

        Ok(())
    }

    /// Ordered finalized entries, re-parsed from the durable log
    pub async fn get_entries(
        &self,
        meeting_id: &str,
    ) -> Result<Vec<TranscriptEntry>, PersistenceError> {
        Self::check_id(meeting_id)?;

        let path = self.meeting_dir(meeting_id).join(TRANSCRIPT_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(markdown::parse_transcript(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Flat `Speaker: content` transcript text for notes generation.
    /// Prefers the in-memory buffer; falls back to re-parsing the log.
    pub async fn full_transcript(&self, meeting_id: &str) -> Result<String, PersistenceError> {
        {
            let buffers = self.buffers.lock().await;
            if let Some(buffer) = buffers.get(meeting_id) {
                if !buffer.is_empty() {
                    return Ok(Self::flatten(buffer));
                }
            }
        }

        let entries = self.get_entries(meeting_id).await?;
        Ok(Self::flatten(&entries))
    }

    fn flatten(entries: &[TranscriptEntry]) -> String {
        entries
            .iter()
            .map(|entry| {
                format!(
                    "{}: {}",
                    entry.speaker.as_deref().unwrap_or("Unknown"),
                    entry.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop the in-memory buffer for a meeting once its transcript has
    /// been consumed, bounding memory across long-running sessions.
    pub async fn clear_buffer(&self, meeting_id: &str) {
        self.buffers.lock().await.remove(meeting_id);
    }

    /// Write (or replace) the notes document for a meeting
    pub async fn save_notes(
        &self,
        meeting_id: &str,
        notes: &MeetingNotes,
    ) -> Result<(), PersistenceError> {
        let meta = self.get_meeting(meeting_id).await?;
        let path = self.meeting_dir(meeting_id).join(NOTES_FILE);
        fs::write(&path, markdown::notes_document(&meta.title, notes)).await?;
        Ok(())
    }

    pub async fn get_notes(
        &self,
        meeting_id: &str,
    ) -> Result<Option<MeetingNotes>, PersistenceError> {
        Self::check_id(meeting_id)?;

        let path = self.meeting_dir(meeting_id).join(NOTES_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(markdown::parse_notes(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the meeting folder and every descendant record
    pub async fn delete_meeting(&self, meeting_id: &str) -> Result<(), PersistenceError> {
        Self::check_id(meeting_id)?;

        match fs::remove_dir_all(self.meeting_dir(meeting_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        self.buffers.lock().await.remove(meeting_id);
        info!("Deleted meeting {}", meeting_id);
        Ok(())
    }

    async fn read_meta(&self, meeting_id: &str) -> Result<MeetingMeta, PersistenceError> {
        let path = self.meeting_dir(meeting_id).join(METADATA_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistenceError::MeetingNotFound(meeting_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_meta(&self, meta: &MeetingMeta) -> Result<(), PersistenceError> {
        let path = self.meeting_dir(&meta.id).join(METADATA_FILE);
        fs::write(&path, serde_json::to_string_pretty(meta)?).await?;
        Ok(())
    }
}
