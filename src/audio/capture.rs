//! cpal-based audio frame producer
//!
//! One backend instance owns one input device: either the microphone
//! (selected by name, or the platform default) or a system-audio
//! loopback/monitor device. The cpal stream lives on a dedicated thread
//! because `cpal::Stream` is not Send; the callback converts incoming
//! buffers to mono i16, resamples them to the target rate, and emits
//! fixed-duration frames over a bounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame, AudioSource};
use super::resample::resample_linear;
use crate::error::DeviceError;

/// Device-name fragments that identify a system-audio loopback input
const LOOPBACK_HINTS: [&str; 4] = ["monitor", "loopback", "stereo mix", "blackhole"];

/// Frame channel depth; the consumer feeds a non-blocking websocket, so a
/// lagging consumer drops frames rather than stalling the device callback.
const FRAME_CHANNEL_CAPACITY: usize = 100;

pub struct CpalBackend {
    source: AudioSource,
    config: AudioBackendConfig,
    capturing: Arc<AtomicBool>,
    stopped_rx: Option<oneshot::Receiver<()>>,
    name: String,
}

impl CpalBackend {
    pub fn new(source: AudioSource, config: AudioBackendConfig) -> Self {
        let name = format!("cpal ({})", source.tag());
        Self {
            source,
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            stopped_rx: None,
            name,
        }
    }

    fn resolve_device(
        source: AudioSource,
        requested: Option<&str>,
    ) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();

        match source {
            AudioSource::Microphone => match requested {
                Some(name) => host
                    .input_devices()
                    .map_err(|e| DeviceError::StreamFailed(e.to_string()))?
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| DeviceError::DeviceNotFound(name.to_string())),
                None => host.default_input_device().ok_or(DeviceError::NoDefaultDevice),
            },

            AudioSource::SystemLoopback => host
                .input_devices()
                .map_err(|e| DeviceError::StreamFailed(e.to_string()))?
                .find(|d| {
                    d.name()
                        .map(|n| {
                            let n = n.to_lowercase();
                            LOOPBACK_HINTS.iter().any(|hint| n.contains(hint))
                        })
                        .unwrap_or(false)
                })
                .ok_or(DeviceError::NoLoopbackDevice),
        }
    }

    /// Pick an input configuration: i16 or f32 only, preferring configs
    /// that can run at the target rate, then fewer channels.
    fn pick_input_config(
        device: &cpal::Device,
        target_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat), DeviceError> {
        let supported = device
            .supported_input_configs()
            .map_err(|e| DeviceError::StreamFailed(e.to_string()))?;

        let mut best: Option<cpal::SupportedStreamConfigRange> = None;

        for range in supported {
            if range.sample_format() != SampleFormat::I16
                && range.sample_format() != SampleFormat::F32
            {
                continue;
            }

            let includes_target =
                range.min_sample_rate().0 <= target_rate && range.max_sample_rate().0 >= target_rate;

            let is_better = match &best {
                None => true,
                Some(current) => {
                    let current_includes = current.min_sample_rate().0 <= target_rate
                        && current.max_sample_rate().0 >= target_rate;
                    (includes_target && !current_includes)
                        || (includes_target == current_includes
                            && range.channels() < current.channels())
                }
            };
            if is_better {
                best = Some(range);
            }
        }

        let range = best.ok_or_else(|| {
            DeviceError::UnsupportedFormat("no i16/f32 input config available".to_string())
        })?;

        let sample_rate = if range.min_sample_rate().0 <= target_rate
            && range.max_sample_rate().0 >= target_rate
        {
            SampleRate(target_rate)
        } else {
            range.max_sample_rate()
        };

        let sample_format = range.sample_format();
        let config = StreamConfig {
            channels: range.channels(),
            sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        Ok((config, sample_format))
    }

    fn open_stream(
        source: AudioSource,
        config: &AudioBackendConfig,
        capturing: Arc<AtomicBool>,
        frames_tx: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream, DeviceError> {
        let device = Self::resolve_device(source, config.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());

        let (stream_config, sample_format) =
            Self::pick_input_config(&device, config.target_sample_rate)?;
        let device_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels;

        info!(
            "Opening {} input '{}': {}Hz {}ch {:?} -> {}Hz mono frames of {}ms",
            source.tag(),
            device_name,
            device_rate,
            channels,
            sample_format,
            config.target_sample_rate,
            config.frame_duration_ms
        );

        let mut chunker = FrameChunker::new(
            device_rate,
            config.target_sample_rate,
            config.frame_duration_ms,
            source,
            frames_tx,
        );

        let stream = match sample_format {
            SampleFormat::I16 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if !capturing.load(Ordering::SeqCst) {
                            return;
                        }
                        chunker.push(&downmix_mono(data, channels));
                    },
                    stream_error,
                    None,
                )
                .map_err(|e| DeviceError::StreamFailed(e.to_string()))?,

            SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !capturing.load(Ordering::SeqCst) {
                            return;
                        }
                        let i16_data: Vec<i16> =
                            data.iter().map(|&s| (s * 32767.0) as i16).collect();
                        chunker.push(&downmix_mono(&i16_data, channels));
                    },
                    stream_error,
                    None,
                )
                .map_err(|e| DeviceError::StreamFailed(e.to_string()))?,

            other => return Err(DeviceError::UnsupportedFormat(format!("{other:?}"))),
        };

        stream
            .play()
            .map_err(|e| DeviceError::StreamFailed(e.to_string()))?;

        Ok(stream)
    }
}

fn stream_error(err: cpal::StreamError) {
    error!("Audio stream error: {}", err);
}

/// Names of the available input devices, for device-selection UIs
pub fn list_input_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| DeviceError::StreamFailed(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.capturing.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::AlreadyCapturing);
        }

        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stopped_tx, stopped_rx) = oneshot::channel();

        let source = self.source;
        let config = self.config.clone();
        let capturing = Arc::clone(&self.capturing);

        std::thread::spawn(move || {
            let stream =
                match CpalBackend::open_stream(source, &config, Arc::clone(&capturing), frames_tx)
                {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        capturing.store(false, Ordering::SeqCst);
                        let _ = ready_tx.send(Err(e));
                        let _ = stopped_tx.send(());
                        return;
                    }
                };

            while capturing.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }

            // Dropping the stream releases the device and ends callbacks;
            // only then is the stop side notified.
            drop(stream);
            let _ = stopped_tx.send(());
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stopped_rx = Some(stopped_rx);
                Ok(frames_rx)
            }
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(e)
            }
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(DeviceError::StreamFailed("capture thread died".to_string()))
            }
        }
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Wait for the capture thread to confirm the stream is torn down,
        // so no callback can fire after stop returns.
        if let Some(stopped_rx) = self.stopped_rx.take() {
            if stopped_rx.await.is_err() {
                warn!("Capture thread exited without confirming stop");
            }
        }

        info!("{} capture stopped", self.name);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Accumulates resampled mono samples and emits fixed-duration frames
struct FrameChunker {
    device_rate: u32,
    target_rate: u32,
    frame_len: usize,
    pending: Vec<i16>,
    emitted_samples: u64,
    source: AudioSource,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameChunker {
    fn new(
        device_rate: u32,
        target_rate: u32,
        frame_duration_ms: u64,
        source: AudioSource,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Self {
        let frame_len = (target_rate as u64 * frame_duration_ms / 1000) as usize;
        Self {
            device_rate,
            target_rate,
            frame_len: frame_len.max(1),
            pending: Vec::new(),
            emitted_samples: 0,
            source,
            tx,
        }
    }

    fn push(&mut self, mono: &[i16]) {
        let resampled = resample_linear(mono, self.device_rate, self.target_rate);
        self.pending.extend_from_slice(&resampled);

        while self.pending.len() >= self.frame_len {
            let samples: Vec<i16> = self.pending.drain(..self.frame_len).collect();
            let timestamp_ms = self.emitted_samples * 1000 / self.target_rate as u64;
            self.emitted_samples += self.frame_len as u64;

            let frame = AudioFrame {
                samples,
                sample_rate: self.target_rate,
                channels: 1,
                timestamp_ms,
                source: self.source,
            };

            // try_send: the device callback must never block
            let _ = self.tx.try_send(frame);
        }
    }
}

/// Average interleaved channels down to mono
fn downmix_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels as usize)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / chunk.len() as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_mono_passthrough() {
        let mono = vec![100i16, 200, 300];
        assert_eq!(downmix_mono(&mono, 1), mono);
    }

    #[test]
    fn downmix_mono_averages_stereo() {
        let stereo = vec![100i16, 200, 300, 400];
        assert_eq!(downmix_mono(&stereo, 2), vec![150, 350]);
    }

    #[test]
    fn chunker_emits_fixed_frames_with_timestamps() {
        let (tx, mut rx) = mpsc::channel(8);
        // 16kHz, 100ms frames -> 1600 samples each
        let mut chunker = FrameChunker::new(16000, 16000, 100, AudioSource::Microphone, tx);

        chunker.push(&vec![0i16; 1600]);
        chunker.push(&vec![0i16; 2000]);

        let first = rx.try_recv().expect("first frame");
        assert_eq!(first.samples.len(), 1600);
        assert_eq!(first.timestamp_ms, 0);

        let second = rx.try_recv().expect("second frame");
        assert_eq!(second.samples.len(), 1600);
        assert_eq!(second.timestamp_ms, 100);

        // 400 samples still pending, below one frame
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn chunker_resamples_device_rate_input() {
        let (tx, mut rx) = mpsc::channel(8);
        // 48kHz device, 16kHz target, 100ms frames
        let mut chunker = FrameChunker::new(48000, 16000, 100, AudioSource::SystemLoopback, tx);

        // 4800 device samples -> 1600 target samples -> exactly one frame
        chunker.push(&vec![0i16; 4800]);

        let frame = rx.try_recv().expect("one frame");
        assert_eq!(frame.samples.len(), 1600);
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.source, AudioSource::SystemLoopback);
    }
}
