use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
    pub notes: NotesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root folder holding one subfolder per meeting
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MINT")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Microphone device name, or None for the system default
    #[serde(default)]
    pub input_device: Option<String>,

    /// Sample rate the transcription provider expects
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Duration of each emitted PCM frame
    #[serde(default = "default_frame_ms")]
    pub frame_duration_ms: u64,

    /// Also archive captured audio as WAV chunks inside the meeting folder
    #[serde(default)]
    pub archive: bool,

    /// Duration of each archived WAV chunk in seconds
    #[serde(default = "default_archive_chunk_secs")]
    pub archive_chunk_secs: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            sample_rate: default_sample_rate(),
            frame_duration_ms: default_frame_ms(),
            archive: false,
            archive_chunk_secs: default_archive_chunk_secs(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_frame_ms() -> u64 {
    100
}

fn default_archive_chunk_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub api_key: String,

    #[serde(default = "default_stt_model")]
    pub model: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Speaker label attached to microphone transcript entries
    #[serde(default = "default_mic_label")]
    pub mic_label: String,

    /// Speaker label attached to system-audio transcript entries
    #[serde(default = "default_system_label")]
    pub system_label: String,
}

fn default_stt_model() -> String {
    "nova-2".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_mic_label() -> String {
    "Me".to_string()
}

fn default_system_label() -> String {
    "Others".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotesConfig {
    /// Which language-model backend generates notes
    pub provider: crate::notes::NotesProvider,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub gemini: ProviderConfig,
}

/// Per-backend credentials and endpoint overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,

    /// Model override; each backend has its own default
    #[serde(default)]
    pub model: Option<String>,

    /// Base URL override, mainly for tests and self-hosted gateways
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
