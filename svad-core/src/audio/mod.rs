//! Audio I/O: cpal capture, block sources, resampling and WAV files.
//!
//! # Capture constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate after warm-up, block, or perform I/O. It mixes down
//! to mono and writes straight into the SPSC ring producer.
//!
//! `cpal::Stream` is `!Send` on most platforms, so `AudioCapture` (and the
//! `CaptureSource` that owns it) must be created and dropped on the same
//! thread. The CLI opens it inside `spawn_blocking`.

pub mod device;
pub mod resample;
pub mod source;
pub mod wav;

pub use source::{BlockSource, CaptureSource, ReplaySource};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
};

use crate::{
    buffering::AudioProducer,
    error::{Result, SvadError},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::info;
#[cfg(feature = "audio-cpal")]
use tracing::{error, warn};

/// Handle to an active audio capture stream.
///
/// **Not `Send`**. Create and drop on the same OS thread. Dropping the
/// handle stops the callback and closes the device.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Set to `false` to make the callback no-op.
    running: Arc<AtomicBool>,
    /// Set by the stream error callback.
    failed: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available device.
    ///
    /// # Errors
    /// `SvadError::AudioSourceUnavailable` when no device can be opened or
    /// the device's sample format is unsupported.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        producer: AudioProducer,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred_name) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == preferred_name)
                            .unwrap_or(false)
                    });
                    if selected_device.is_none() {
                        warn!(preferred_name, "preferred input device not found, falling back");
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = match selected_device.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => {
                let mut devices = host
                    .input_devices()
                    .map_err(|e| SvadError::AudioSourceUnavailable(e.to_string()))?;
                let fallback = devices.next().ok_or_else(|| {
                    SvadError::AudioSourceUnavailable("no input device found".into())
                })?;
                warn!("no default input device, falling back to first available input");
                fallback
            }
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| SvadError::AudioSourceUnavailable(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let running = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_mono_stream::<f32>(&device, &config, producer, &running, &failed)
            }
            SampleFormat::I16 => {
                build_mono_stream::<i16>(&device, &config, producer, &running, &failed)
            }
            SampleFormat::U16 => {
                build_mono_stream::<u16>(&device, &config, producer, &running, &failed)
            }
            SampleFormat::U8 => {
                build_mono_stream::<u8>(&device, &config, producer, &running, &failed)
            }
            fmt => {
                return Err(SvadError::AudioSourceUnavailable(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| SvadError::AudioSourceUnavailable(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            failed,
            sample_rate,
        })
    }

    /// Signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether the backend reported a stream error.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: AudioProducer,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(SvadError::AudioSourceUnavailable(
            "compiled without audio-cpal feature".into(),
        ))
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
        info!("audio input released");
    }
}

/// Build an input stream that mixes frames of `T` down to mono f32 and
/// pushes them into `producer`.
#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    running: &Arc<AtomicBool>,
    failed: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    use crate::buffering::Producer;

    let ch = usize::from(config.channels.max(1));
    let running = Arc::clone(running);
    let failed = Arc::clone(failed);
    let mut mix_buf: Vec<f32> = Vec::new();

    device
        .build_input_stream(
            config,
            move |data: &[T], _info| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let frames = data.len() / ch;
                mix_buf.resize(frames, 0.0);
                for (f, frame) in data.chunks_exact(ch).enumerate() {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample_(*s)).sum();
                    mix_buf[f] = sum / ch as f32;
                }
                let written = producer.push_slice(&mix_buf);
                if written < mix_buf.len() {
                    warn!("ring buffer full: dropped {} frames", mix_buf.len() - written);
                }
            },
            move |err| {
                error!("audio stream error: {err}");
                failed.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| SvadError::AudioSourceUnavailable(e.to_string()))
}
