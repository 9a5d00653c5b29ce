//! Raw-audio archival for a meeting
//!
//! Receives captured frames and writes them under `<meeting>/audio/` as
//! fixed-duration WAV chunks, one series per source. Archival is an
//! optional sidecar of a recording; the transcript pipeline does not
//! depend on it.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::AudioFrame;
use crate::error::PersistenceError;

/// Archive configuration for one audio source of one meeting
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Duration of each chunk in seconds
    pub chunk_duration_secs: u64,
    /// The meeting folder; chunks land in its `audio/` subfolder
    pub meeting_dir: PathBuf,
    /// Source tag used in chunk filenames ("mic", "system")
    pub source_tag: String,
}

/// Metadata for a single written chunk
#[derive(Debug, Clone)]
pub struct ArchiveChunk {
    /// Chunk number (0-indexed)
    pub chunk_index: usize,
    /// File path to the chunk
    pub file_path: PathBuf,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// End time in milliseconds since capture started
    pub end_ms: u64,
    /// Number of samples in this chunk
    pub sample_count: usize,
}

/// Writes a stream of audio frames to disk in fixed-duration WAV chunks
pub struct ArchiveRecorder {
    config: ArchiveConfig,
    output_dir: PathBuf,
    current_chunk: Option<ChunkWriter>,
    chunk_index: usize,
}

impl ArchiveRecorder {
    pub fn new(config: ArchiveConfig) -> Result<Self, PersistenceError> {
        let output_dir = config.meeting_dir.join("audio");
        fs::create_dir_all(&output_dir)?;

        info!(
            "Audio archive initialized: {} ({}s chunks)",
            config.source_tag, config.chunk_duration_secs
        );

        Ok(Self {
            config,
            output_dir,
            current_chunk: None,
            chunk_index: 0,
        })
    }

    /// Consume frames until the channel closes, rotating chunks on the
    /// configured duration.
    pub async fn record(
        mut self,
        mut audio_rx: mpsc::Receiver<AudioFrame>,
    ) -> Result<Vec<ArchiveChunk>, PersistenceError> {
        let mut chunks = Vec::new();

        while let Some(frame) = audio_rx.recv().await {
            if self.should_start_new_chunk(&frame) {
                if let Some(chunk) = self.current_chunk.take() {
                    chunks.push(chunk.finish()?);
                }
                self.current_chunk = Some(self.start_new_chunk(&frame)?);
            }

            if let Some(chunk) = &mut self.current_chunk {
                chunk.write_frame(&frame)?;
            }
        }

        if let Some(chunk) = self.current_chunk.take() {
            chunks.push(chunk.finish()?);
        }

        info!(
            "Audio archive complete: {} ({} chunks)",
            self.config.source_tag,
            chunks.len()
        );

        Ok(chunks)
    }

    fn should_start_new_chunk(&self, frame: &AudioFrame) -> bool {
        match &self.current_chunk {
            None => true,
            Some(chunk) => {
                let chunk_duration_ms = self.config.chunk_duration_secs * 1000;
                frame.timestamp_ms.saturating_sub(chunk.metadata.start_ms) >= chunk_duration_ms
            }
        }
    }

    fn start_new_chunk(&mut self, frame: &AudioFrame) -> Result<ChunkWriter, PersistenceError> {
        let chunk_path = self.output_dir.join(format!(
            "{}-chunk-{:03}.wav",
            self.config.source_tag, self.chunk_index
        ));

        let chunk = ChunkWriter::new(
            chunk_path,
            self.chunk_index,
            frame.timestamp_ms,
            frame.sample_rate,
            frame.channels,
        )?;

        self.chunk_index += 1;

        Ok(chunk)
    }
}

/// Writes a single chunk to disk as a WAV file
struct ChunkWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    metadata: ArchiveChunk,
}

impl ChunkWriter {
    fn new(
        file_path: PathBuf,
        chunk_index: usize,
        start_ms: u64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, PersistenceError> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .map_err(|e| PersistenceError::Io(std::io::Error::other(e.to_string())))?;

        Ok(Self {
            writer: Some(writer),
            metadata: ArchiveChunk {
                chunk_index,
                file_path,
                start_ms,
                end_ms: start_ms,
                sample_count: 0,
            },
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), PersistenceError> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| PersistenceError::Io(std::io::Error::other(e.to_string())))?;
            }

            self.metadata.end_ms = frame.timestamp_ms;
            self.metadata.sample_count += frame.samples.len();
        }

        Ok(())
    }

    fn finish(mut self) -> Result<ArchiveChunk, PersistenceError> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| PersistenceError::Io(std::io::Error::other(e.to_string())))?;
        }

        Ok(self.metadata.clone())
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
