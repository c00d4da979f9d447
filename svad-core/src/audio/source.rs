//! Block sources feeding the run loop.
//!
//! `BlockSource` is the only capability the run loop needs from live audio:
//! a blocking "read next block". `CaptureSource` drains the cpal ring
//! buffer, `ReplaySource` plays back samples held in memory (a WAV file or
//! synthesized test audio).

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::resample::{resample_all, RateConverter, RESAMPLE_CHUNK};
use super::wav::read_wav_mono;
use super::AudioCapture;
use crate::buffering::{chunk::AudioChunk, create_audio_ring, AudioConsumer, Consumer};
use crate::engine::CancellationToken;
use crate::error::{Result, SvadError};

/// Sleep between ring polls when no samples are available.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long the device may deliver nothing before the read fails.
const STALL_TIMEOUT: Duration = Duration::from_secs(3);

/// Produces successive fixed-size blocks of mono f32 samples.
pub trait BlockSource {
    /// Block until the next full block is available.
    ///
    /// Returns `Ok(None)` once the source is exhausted or cancelled.
    ///
    /// # Errors
    /// `SvadError::AudioReadFailure` when the underlying stream fails.
    fn next_block(&mut self) -> Result<Option<AudioChunk>>;

    /// Samples per block.
    fn block_size(&self) -> usize;

    /// Sample rate of the delivered blocks (Hz).
    fn sample_rate(&self) -> u32;
}

impl<S: BlockSource + ?Sized> BlockSource for Box<S> {
    fn next_block(&mut self) -> Result<Option<AudioChunk>> {
        (**self).next_block()
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}

// ---------------------------------------------------------------------------
// Live capture
// ---------------------------------------------------------------------------

/// Live microphone blocks at the configured rate.
///
/// Owns the capture stream; dropping the source closes the device, so the
/// device is released on every exit path of the loop that owns it.
pub struct CaptureSource {
    capture: AudioCapture,
    consumer: AudioConsumer,
    converter: RateConverter,
    /// Converted samples not yet handed out as a block.
    pending: Vec<f32>,
    scratch: Vec<f32>,
    block_size: usize,
    sample_rate: u32,
    cancel: CancellationToken,
}

impl CaptureSource {
    /// Open the preferred (or default) input device.
    ///
    /// Must be called on the thread that will drop the source.
    ///
    /// # Errors
    /// `SvadError::AudioSourceUnavailable` when no device can be opened.
    pub fn open(
        sample_rate: u32,
        block_size: usize,
        preferred_device: Option<&str>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let (producer, consumer) = create_audio_ring();
        let capture = AudioCapture::open_with_preference(producer, preferred_device)?;
        let converter = RateConverter::new(capture.sample_rate, sample_rate, RESAMPLE_CHUNK)?;
        if !converter.is_passthrough() {
            info!(
                device_rate = capture.sample_rate,
                target_rate = sample_rate,
                "capture will be resampled"
            );
        }

        Ok(Self {
            capture,
            consumer,
            converter,
            pending: Vec::with_capacity(block_size * 2),
            scratch: vec![0f32; block_size.max(RESAMPLE_CHUNK)],
            block_size,
            sample_rate,
            cancel,
        })
    }
}

impl BlockSource for CaptureSource {
    fn next_block(&mut self) -> Result<Option<AudioChunk>> {
        let mut last_data = Instant::now();
        loop {
            if self.pending.len() >= self.block_size {
                let block: Vec<f32> = self.pending.drain(..self.block_size).collect();
                return Ok(Some(AudioChunk::new(block, self.sample_rate)));
            }
            if self.cancel.is_cancelled() {
                debug!("capture read cancelled");
                return Ok(None);
            }
            if self.capture.has_failed() {
                return Err(SvadError::AudioReadFailure(
                    "input stream reported an error".into(),
                ));
            }

            let n = self.consumer.pop_slice(&mut self.scratch);
            if n == 0 {
                if last_data.elapsed() >= STALL_TIMEOUT {
                    return Err(SvadError::AudioReadFailure(format!(
                        "no audio received for {STALL_TIMEOUT:?}"
                    )));
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            last_data = Instant::now();
            let converted = self.converter.process(&self.scratch[..n])?;
            self.pending.extend_from_slice(&converted);
        }
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Plays back an in-memory sample buffer one block at a time.
///
/// A trailing partial block is never delivered.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Vec<f32>,
    position: usize,
    block_size: usize,
    sample_rate: u32,
}

impl ReplaySource {
    pub fn new(samples: Vec<f32>, block_size: usize, sample_rate: u32) -> Self {
        Self {
            samples,
            position: 0,
            block_size,
            sample_rate,
        }
    }

    /// Constant-amplitude blocks whose energies are exactly `energies`
    /// (up to f32 rounding of `energy / block_size`).
    pub fn from_block_energies(energies: &[f64], block_size: usize, sample_rate: u32) -> Self {
        let samples = energies
            .iter()
            .flat_map(|e| std::iter::repeat((*e / block_size as f64) as f32).take(block_size))
            .collect();
        Self::new(samples, block_size, sample_rate)
    }

    /// Decode a WAV file and resample it to `sample_rate`.
    pub fn from_wav(path: &Path, block_size: usize, sample_rate: u32) -> Result<Self> {
        let (samples, file_rate) = read_wav_mono(path)?;
        let samples = resample_all(&samples, file_rate, sample_rate)?;
        Ok(Self::new(samples, block_size, sample_rate))
    }

    /// Full blocks not yet delivered.
    pub fn remaining_blocks(&self) -> usize {
        (self.samples.len() - self.position) / self.block_size.max(1)
    }
}

impl BlockSource for ReplaySource {
    fn next_block(&mut self) -> Result<Option<AudioChunk>> {
        if self.block_size == 0 {
            return Ok(None);
        }
        let end = self.position + self.block_size;
        if end > self.samples.len() {
            return Ok(None);
        }
        let block = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(Some(AudioChunk::new(block, self.sample_rate)))
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
