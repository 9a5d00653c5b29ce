use tokio::sync::mpsc;

use crate::error::DeviceError;

/// Audio stream source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSource {
    /// Microphone input
    Microphone,
    /// System audio via a loopback/monitor input device
    SystemLoopback,
}

impl AudioSource {
    pub fn tag(&self) -> &'static str {
        match self {
            AudioSource::Microphone => "mic",
            AudioSource::SystemLoopback => "system",
        }
    }
}

/// Audio sample data (16-bit PCM, mono, at the target rate)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Audio stream source
    pub source: AudioSource,
}

impl AudioFrame {
    /// Samples as little-endian PCM bytes, the layout streaming providers take
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Configuration for audio backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (input is resampled when the device differs)
    pub target_sample_rate: u32,
    /// Duration of each emitted frame in milliseconds
    pub frame_duration_ms: u64,
    /// Device name to open, or None for the platform default
    pub device: Option<String>,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000,
            frame_duration_ms: 100,
            device: None,
        }
    }
}

/// Audio capture backend trait
///
/// One backend owns one capture device. `start` acquires the device
/// exclusively and emits fixed-duration mono frames at the target rate;
/// `stop` releases it deterministically: no frame is emitted after
/// `stop` returns.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create an audio backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Box<dyn AudioBackend> {
        Box::new(super::capture::CpalBackend::new(source, config))
    }
}
