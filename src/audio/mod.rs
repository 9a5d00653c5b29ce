pub mod archive;
pub mod backend;
pub mod capture;
pub mod resample;

pub use archive::{ArchiveChunk, ArchiveConfig, ArchiveRecorder};
pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource,
};
pub use capture::{list_input_devices, CpalBackend};
pub use resample::resample_linear;
