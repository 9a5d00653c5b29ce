//! Meeting lifecycle controller
//!
//! Drives a meeting through recording → processing → completed/failed.
//! One controller instance allows one active recording: the active slot
//! is set exactly once per start and cleared exactly once per stop, and
//! both operations serialize on the same mutex, so no two recordings can
//! overlap. There are no automatic retries anywhere in this machine;
//! recovery from a failed notes generation is always user-triggered.

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::{
    ArchiveConfig, ArchiveRecorder, AudioBackend, AudioBackendConfig, AudioBackendFactory,
    AudioFrame, AudioSource,
};
use crate::config::Config;
use crate::error::RecorderError;
use crate::merge::{LiveUpdate, TranscriptMerger};
use crate::notes::{self, NotesBackend};
use crate::storage::{MeetingMeta, MeetingStatus, MeetingStore};
use crate::transcription::{DeepgramSession, FeedHandle, LiveConfig, TranscriptEvent};

/// Live feed fan-out depth; slow subscribers lag, they do not block
const LIVE_FEED_CAPACITY: usize = 256;

/// Merged transcript event channel depth
const MERGE_CHANNEL_CAPACITY: usize = 256;

/// Outcome of a stop-recording operation
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub meeting_id: String,
    pub status: MeetingStatus,
}

struct ActiveRecording {
    meeting_id: String,
    mic_backend: Box<dyn AudioBackend>,
    system_backend: Option<Box<dyn AudioBackend>>,
    mic_session: DeepgramSession,
    system_session: Option<DeepgramSession>,
    merge_task: JoinHandle<()>,
    forward_tasks: Vec<JoinHandle<()>>,
    pump_tasks: Vec<JoinHandle<()>>,
}

pub struct MeetingRecorder {
    config: Config,
    store: Arc<MeetingStore>,
    live_tx: broadcast::Sender<LiveUpdate>,
    active: Mutex<Option<ActiveRecording>>,
}

impl MeetingRecorder {
    pub fn new(config: Config, store: Arc<MeetingStore>) -> Self {
        let (live_tx, _) = broadcast::channel(LIVE_FEED_CAPACITY);
        Self {
            config,
            store,
            live_tx,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to the live transcript feed (interim and final updates)
    pub fn subscribe_live(&self) -> broadcast::Receiver<LiveUpdate> {
        self.live_tx.subscribe()
    }

    pub async fn active_meeting_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|recording| recording.meeting_id.clone())
    }

    /// Start a recording.
    ///
    /// Microphone-path failures abort the whole start and reset to "no
    /// active meeting"; system-audio failures downgrade to mic-only.
    pub async fn start(&self, title: Option<String>) -> Result<MeetingMeta, RecorderError> {
        let mut active = self.active.lock().await;
        if let Some(recording) = active.as_ref() {
            return Err(crate::error::StateError::AlreadyRecording(
                recording.meeting_id.clone(),
            )
            .into());
        }

        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Meeting — {}", Local::now().format("%Y-%m-%d %H:%M")));

        let meta = self.store.create_meeting(&title).await?;
        let meeting_id = meta.id.clone();

        let live_config = LiveConfig {
            model: self.config.transcription.model.clone(),
            language: self.config.transcription.language.clone(),
            sample_rate: self.config.audio.sample_rate,
        };
        let api_key = &self.config.transcription.api_key;

        // Microphone session is mandatory
        let mut mic_session = DeepgramSession::new(&self.config.transcription.mic_label);
        let (mic_feed, mic_events) = match mic_session.open(api_key, &live_config).await {
            Ok(channel) => channel,
            Err(e) => {
                self.discard_failed_start(&meeting_id).await;
                return Err(e.into());
            }
        };

        // System audio is best-effort: the meeting proceeds mic-only
        let mut system_session = DeepgramSession::new(&self.config.transcription.system_label);
        let mut system_channel = match system_session.open(api_key, &live_config).await {
            Ok(channel) => Some(channel),
            Err(e) => {
                warn!(
                    "System-audio transcription unavailable, continuing mic-only: {}",
                    e
                );
                None
            }
        };
        let mut system_session = system_channel.is_some().then_some(system_session);

        let backend_config = AudioBackendConfig {
            target_sample_rate: self.config.audio.sample_rate,
            frame_duration_ms: self.config.audio.frame_duration_ms,
            device: self.config.audio.input_device.clone(),
        };

        let mut mic_backend =
            AudioBackendFactory::create(AudioSource::Microphone, backend_config.clone());
        let mic_frames = match mic_backend.start().await {
            Ok(frames) => frames,
            Err(e) => {
                mic_session.close().await;
                if let Some(session) = system_session.as_mut() {
                    session.close().await;
                }
                self.discard_failed_start(&meeting_id).await;
                return Err(e.into());
            }
        };

        let mut system_backend = None;
        let mut system_frames = None;
        if system_session.is_some() {
            let loopback_config = AudioBackendConfig {
                device: None,
                ..backend_config
            };
            let mut backend =
                AudioBackendFactory::create(AudioSource::SystemLoopback, loopback_config);
            match backend.start().await {
                Ok(frames) => {
                    system_frames = Some(frames);
                    system_backend = Some(backend);
                }
                Err(e) => {
                    warn!(
                        "System-audio capture unavailable, continuing mic-only: {}",
                        e
                    );
                    if let Some(session) = system_session.as_mut() {
                        session.close().await;
                    }
                    system_session = None;
                    system_channel = None;
                }
            }
        }

        // Merge task: single owner of the per-slot interim state
        let (merged_tx, mut merged_rx) = mpsc::channel(MERGE_CHANNEL_CAPACITY);
        let mut merger = TranscriptMerger::new(
            meeting_id.clone(),
            Arc::clone(&self.store),
            self.live_tx.clone(),
        );
        let merge_task = tokio::spawn(async move {
            while let Some((session_id, event)) = merged_rx.recv().await {
                merger.handle_event(session_id, event).await;
            }
        });

        // Event forwarders and frame pumps per source
        let mut forward_tasks = vec![spawn_forwarder(
            mic_session.session_id(),
            mic_events,
            merged_tx.clone(),
        )];
        let mut pump_tasks = Vec::new();
        let mic_archive = self.spawn_archive(&meeting_id, AudioSource::Microphone, &mut pump_tasks);
        pump_tasks.push(tokio::spawn(pump_frames(mic_frames, mic_feed, mic_archive)));

        if let (Some(session), Some((feed, events)), Some(frames)) =
            (system_session.as_ref(), system_channel, system_frames)
        {
            forward_tasks.push(spawn_forwarder(
                session.session_id(),
                events,
                merged_tx.clone(),
            ));
            let archive =
                self.spawn_archive(&meeting_id, AudioSource::SystemLoopback, &mut pump_tasks);
            pump_tasks.push(tokio::spawn(pump_frames(frames, feed, archive)));
        }
        drop(merged_tx);

        info!(
            "Recording started: {} ({})",
            meeting_id,
            if system_session.is_some() {
                "mic + system audio"
            } else {
                "mic only"
            }
        );

        *active = Some(ActiveRecording {
            meeting_id,
            mic_backend,
            system_backend,
            mic_session,
            system_session,
            merge_task,
            forward_tasks,
            pump_tasks,
        });

        Ok(meta)
    }

    /// Stop the active recording and run post-processing.
    ///
    /// Benign no-op when nothing is recording. Every teardown step runs
    /// in its own failure boundary; the meeting always leaves
    /// `processing` for a terminal state.
    pub async fn stop(&self) -> Option<StopOutcome> {
        let mut active = self.active.lock().await;
        let Some(mut recording) = active.take() else {
            debug!("Stop requested with no active recording");
            return None;
        };

        let meeting_id = recording.meeting_id.clone();
        info!("Stopping recording: {}", meeting_id);

        // 1. Release capture devices
        if let Err(e) = recording.mic_backend.stop().await {
            error!("Failed to stop microphone capture: {}", e);
        }
        if let Some(backend) = recording.system_backend.as_mut() {
            if let Err(e) = backend.stop().await {
                error!("Failed to stop system-audio capture: {}", e);
            }
        }

        // 2. Close streaming sessions (idempotent, even if never opened)
        recording.mic_session.close().await;
        if let Some(session) = recording.system_session.as_mut() {
            session.close().await;
        }

        // 3. Drain the pipeline: pumps end when the frame channels close;
        // forwarders are cut so post-close provider events are discarded,
        // which lets the merge task finish any in-flight append and exit.
        for pump in recording.pump_tasks {
            let _ = pump.await;
        }
        for forwarder in recording.forward_tasks {
            forwarder.abort();
        }
        if let Err(e) = recording.merge_task.await {
            if !e.is_cancelled() {
                error!("Merge task failed: {}", e);
            }
        }

        // 4. Post-processing: always leaves a terminal status
        let backend = notes::backend_for(&self.config.notes);
        let status = finalize_meeting(&self.store, backend.as_ref(), &meeting_id).await;

        info!("Recording stopped: {} -> {}", meeting_id, status);
        Some(StopOutcome { meeting_id, status })
    }

    /// User-triggered notes regeneration on an existing meeting
    pub async fn regenerate_notes(
        &self,
        meeting_id: &str,
    ) -> Result<MeetingStatus, RecorderError> {
        let meta = self.store.get_meeting(meeting_id).await?;

        match meta.status {
            MeetingStatus::Completed | MeetingStatus::Failed => {}
            status => {
                return Err(crate::error::StateError::NotRegenerable {
                    id: meeting_id.to_string(),
                    status: status.to_string(),
                }
                .into())
            }
        }

        let backend = notes::backend_for(&self.config.notes);
        Ok(finalize_meeting(&self.store, backend.as_ref(), meeting_id).await)
    }

    fn spawn_archive(
        &self,
        meeting_id: &str,
        source: AudioSource,
        pump_tasks: &mut Vec<JoinHandle<()>>,
    ) -> Option<mpsc::Sender<AudioFrame>> {
        if !self.config.audio.archive {
            return None;
        }

        let config = ArchiveConfig {
            chunk_duration_secs: self.config.audio.archive_chunk_secs,
            meeting_dir: self.store.meeting_dir(meeting_id),
            source_tag: source.tag().to_string(),
        };

        let recorder = match ArchiveRecorder::new(config) {
            Ok(recorder) => recorder,
            Err(e) => {
                error!("Audio archive disabled for {}: {}", source.tag(), e);
                return None;
            }
        };

        let (tx, rx) = mpsc::channel(MERGE_CHANNEL_CAPACITY);
        pump_tasks.push(tokio::spawn(async move {
            if let Err(e) = recorder.record(rx).await {
                error!("Audio archive failed: {}", e);
            }
        }));

        Some(tx)
    }

    /// Best-effort removal of a meeting whose start died before any
    /// entry could exist; resets to "no active meeting" without orphans.
    async fn discard_failed_start(&self, meeting_id: &str) {
        if let Err(e) = self.store.delete_meeting(meeting_id).await {
            warn!("Failed to remove aborted meeting {}: {}", meeting_id, e);
        }
    }
}

/// Post-processing: processing → completed | failed.
///
/// Empty transcripts complete without invoking the provider. A
/// generation failure leaves the meeting queryable with no notes; if
/// even the `failed` status write fails, that is logged and swallowed:
/// failure to record failure must not break the stop flow. The first
/// terminal timestamp sticks across regenerations.
pub async fn finalize_meeting(
    store: &MeetingStore,
    backend: &dyn NotesBackend,
    meeting_id: &str,
) -> MeetingStatus {
    if let Err(e) = store
        .update_status(meeting_id, MeetingStatus::Processing, None)
        .await
    {
        error!("Failed to mark {} as processing: {}", meeting_id, e);
    }

    let transcript = match store.full_transcript(meeting_id).await {
        Ok(transcript) => transcript,
        Err(e) => {
            error!("Failed to read transcript for {}: {}", meeting_id, e);
            String::new()
        }
    };

    let status = if transcript.trim().is_empty() {
        info!("Meeting {} has no transcript; skipping notes", meeting_id);
        MeetingStatus::Completed
    } else {
        match backend.generate(&transcript).await {
            Ok(notes) => match store.save_notes(meeting_id, &notes).await {
                Ok(()) => MeetingStatus::Completed,
                Err(e) => {
                    error!("Failed to persist notes for {}: {}", meeting_id, e);
                    MeetingStatus::Failed
                }
            },
            Err(e) => {
                error!("Notes generation failed for {}: {}", meeting_id, e);
                MeetingStatus::Failed
            }
        }
    };

    if let Err(e) = store
        .update_status(meeting_id, status, Some(Utc::now()))
        .await
    {
        error!(
            "Failed to persist {} status for {}: {}",
            status, meeting_id, e
        );
    }

    // The transcript has been consumed; bound memory across meetings
    store.clear_buffer(meeting_id).await;

    status
}

fn spawn_forwarder(
    session_id: Uuid,
    mut events: mpsc::Receiver<TranscriptEvent>,
    merged_tx: mpsc::Sender<(Uuid, TranscriptEvent)>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if merged_tx.send((session_id, event)).await.is_err() {
                break;
            }
        }
    })
}

async fn pump_frames(
    mut frames: mpsc::Receiver<AudioFrame>,
    feed: FeedHandle,
    archive_tx: Option<mpsc::Sender<AudioFrame>>,
) {
    while let Some(frame) = frames.recv().await {
        feed.feed(&frame);
        if let Some(tx) = &archive_tx {
            let _ = tx.send(frame).await;
        }
    }
}
