//! Deepgram live transcription session
//!
//! Wraps one websocket connection to the Deepgram streaming endpoint.
//! Audio frames go out as binary linear16 messages through a writer
//! task; transcript results come back as JSON text messages through a
//! reader task that forwards parsed events on a channel. `feed` never
//! blocks the audio path, and `close` gates the reader so in-flight
//! provider events are discarded rather than delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{LiveConfig, TranscriptEvent};
use crate::audio::AudioFrame;
use crate::error::ConnectionError;

const DEEPGRAM_LIVE_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Command channel depth between `feed` and the socket writer
const AUDIO_CHANNEL_CAPACITY: usize = 100;

enum Command {
    Audio(Vec<u8>),
    Finish,
}

pub struct DeepgramSession {
    session_id: Uuid,
    speaker_label: String,
    audio_tx: Option<mpsc::Sender<Command>>,
    closed: Arc<AtomicBool>,
}

impl DeepgramSession {
    pub fn new(speaker_label: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            speaker_label: speaker_label.into(),
            audio_tx: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn speaker_label(&self) -> &str {
        &self.speaker_label
    }

    /// Establish the streaming connection.
    ///
    /// Resolves only once the provider has acknowledged the session by
    /// completing the websocket upgrade; a non-101 answer is a
    /// rejection. Returns a feed handle plus the event stream for this
    /// session.
    pub async fn open(
        &mut self,
        api_key: &str,
        config: &LiveConfig,
    ) -> Result<(FeedHandle, mpsc::Receiver<TranscriptEvent>), ConnectionError> {
        if self.audio_tx.is_some() {
            return Err(ConnectionError::AlreadyOpen);
        }

        let url = format!(
            "{}?model={}&language={}&smart_format=true&punctuate=true&diarize=false\
             &interim_results=true&encoding=linear16&sample_rate={}",
            DEEPGRAM_LIVE_URL, config.model, config.language, config.sample_rate
        );

        let mut request = url
            .into_client_request()
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
        let auth = HeaderValue::from_str(&format!("Token {}", api_key))
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;
        request.headers_mut().insert("Authorization", auth);

        let (ws, response) = connect_async(request)
            .await
            .map_err(|e| ConnectionError::ConnectFailed(e.to_string()))?;

        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(ConnectionError::Rejected(response.status().as_u16()));
        }

        info!(
            "Transcription session {} open (speaker={})",
            self.session_id, self.speaker_label
        );

        let (mut sink, mut stream) = ws.split();
        let (audio_tx, mut audio_rx) = mpsc::channel::<Command>(AUDIO_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(AUDIO_CHANNEL_CAPACITY);

        // Writer: audio frames out, then the provider's end-of-stream marker
        tokio::spawn(async move {
            while let Some(command) = audio_rx.recv().await {
                match command {
                    Command::Audio(bytes) => {
                        if sink.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Command::Finish => {
                        let _ = sink
                            .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()))
                            .await;
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        });

        // Reader: provider JSON in, parsed events out until close
        let closed = Arc::clone(&self.closed);
        let speaker = self.speaker_label.clone();
        let session_id = self.session_id;
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                if closed.load(Ordering::SeqCst) {
                    break;
                }

                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_live_response(&text, &speaker) {
                            if event_tx.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        error!("Transcription session {} socket error: {}", session_id, e);
                        break;
                    }
                }
            }
        });

        let feed = FeedHandle {
            tx: audio_tx.clone(),
            closed: Arc::clone(&self.closed),
        };
        self.audio_tx = Some(audio_tx);
        Ok((feed, event_rx))
    }

    /// Forward one audio frame. No-op if the session is not connected;
    /// never blocks; on backpressure the frame is dropped, not queued.
    pub fn feed(&self, frame: &AudioFrame) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = &self.audio_tx {
            let _ = tx.try_send(Command::Audio(frame.to_pcm_bytes()));
        }
    }

    /// A cloneable handle for feeding frames from a pump task
    pub fn feed_handle(&self) -> Option<FeedHandle> {
        self.audio_tx.as_ref().map(|tx| FeedHandle {
            tx: tx.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Terminate the connection. Idempotent; after the first call no
    /// further events are delivered.
    pub async fn close(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(tx) = self.audio_tx.take() {
            let _ = tx.send(Command::Finish).await;
        }

        info!("Transcription session {} closed", self.session_id);
    }
}

/// Feeds frames into an open session without holding the session itself
#[derive(Clone)]
pub struct FeedHandle {
    tx: mpsc::Sender<Command>,
    closed: Arc<AtomicBool>,
}

impl FeedHandle {
    pub fn feed(&self, frame: &AudioFrame) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let _ = self.tx.try_send(Command::Audio(frame.to_pcm_bytes()));
    }
}

// Provider wire types: {channel: {alternatives: [{transcript, words}]}, is_final}

#[derive(Debug, Deserialize)]
struct LiveResponse {
    channel: Option<LiveChannel>,
    #[serde(default)]
    is_final: bool,
}

#[derive(Debug, Deserialize)]
struct LiveChannel {
    #[serde(default)]
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Deserialize)]
struct LiveAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<LiveWord>,
}

#[derive(Debug, Deserialize)]
struct LiveWord {
    start: f64,
    end: f64,
}

/// Parse one provider message into a transcript event. Non-transcript
/// messages (metadata, keepalives) and empty transcripts yield None.
fn parse_live_response(text: &str, speaker: &str) -> Option<TranscriptEvent> {
    let response: LiveResponse = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!("Unparseable transcription message: {}", e);
            return None;
        }
    };

    let alternative = response.channel?.alternatives.into_iter().next()?;
    if alternative.transcript.is_empty() {
        return None;
    }

    let timestamp_start = alternative.words.first().map(|w| w.start).unwrap_or(0.0);
    let timestamp_end = alternative.words.last().map(|w| w.end).unwrap_or(0.0);

    Some(TranscriptEvent {
        speaker: Some(speaker.to_string()),
        content: alternative.transcript,
        timestamp_start,
        timestamp_end,
        is_final: response.is_final,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFrame, AudioSource};

    fn frame() -> AudioFrame {
        AudioFrame {
            samples: vec![0i16; 160],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
            source: AudioSource::Microphone,
        }
    }

    #[test]
    fn parse_final_result_with_word_timestamps() {
        let text = r#"{
            "channel": {"alternatives": [{
                "transcript": "Hello there",
                "words": [
                    {"word": "hello", "start": 0.1, "end": 0.4},
                    {"word": "there", "start": 0.5, "end": 0.8}
                ]
            }]},
            "is_final": true
        }"#;

        let event = parse_live_response(text, "Me").expect("event");
        assert_eq!(event.speaker.as_deref(), Some("Me"));
        assert_eq!(event.content, "Hello there");
        assert_eq!(event.timestamp_start, 0.1);
        assert_eq!(event.timestamp_end, 0.8);
        assert!(event.is_final);
    }

    #[test]
    fn parse_interim_without_words_falls_back_to_zero() {
        let text = r#"{
            "channel": {"alternatives": [{"transcript": "Hel"}]}
        }"#;

        let event = parse_live_response(text, "Me").expect("event");
        assert_eq!(event.timestamp_start, 0.0);
        assert_eq!(event.timestamp_end, 0.0);
        assert!(!event.is_final);
    }

    #[test]
    fn empty_transcript_is_skipped() {
        let text = r#"{"channel": {"alternatives": [{"transcript": ""}]}, "is_final": true}"#;
        assert!(parse_live_response(text, "Me").is_none());
    }

    #[test]
    fn metadata_message_is_skipped() {
        let text = r#"{"type": "Metadata", "request_id": "abc"}"#;
        assert!(parse_live_response(text, "Me").is_none());
    }

    #[test]
    fn feed_before_open_is_a_no_op() {
        let session = DeepgramSession::new("Me");
        // Not connected: the frame is dropped, not queued
        session.feed(&frame());
        assert!(session.feed_handle().is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut session = DeepgramSession::new("Me");
        session.close().await;
        session.close().await;
        // Closed sessions silently drop any further frames
        session.feed(&frame());
    }
}
