//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Reference files and live capture devices rarely run at the configured
//! detection rate. `RateConverter` normalizes both: streaming for capture
//! (`process`), whole-buffer for references (`resample_all`).
//!
//! When the source rate equals the target rate no rubato session is created
//! and `process` is a plain copy.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::{Result, SvadError};

/// Input frames per rubato call.
pub const RESAMPLE_CHUNK: usize = 1024;

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when source rate == target rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input chunks between calls.
    input_buf: Vec<f32>,
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// # Errors
    /// `SvadError::InvalidConfig` if either rate is zero or rubato rejects
    /// the ratio.
    pub fn new(source_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if source_rate == 0 || target_rate == 0 {
            return Err(SvadError::InvalidConfig {
                key: "sample_rate",
                message: format!("cannot resample {source_rate} Hz to {target_rate} Hz"),
            });
        }
        if source_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| SvadError::InvalidConfig {
            key: "sample_rate",
            message: format!("resampler init: {e}"),
        })?;

        let max_out = resampler.output_frames_max();
        tracing::debug!(source_rate, target_rate, chunk_size, max_out, "resampler ready");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf: vec![vec![0f32; max_out]; 1],
        })
    }

    /// Process incoming samples, returning resampled output (may be empty).
    ///
    /// Samples accumulate until a full `chunk_size` block is available; any
    /// remainder is kept for the next call.
    ///
    /// # Errors
    /// `SvadError::AudioReadFailure` when rubato rejects a chunk. The chunk
    /// stays buffered.
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        if self.resampler.is_none() {
            return Ok(samples.to_vec());
        }
        self.input_buf.extend_from_slice(samples);
        self.drain_full_chunks()
    }

    /// Zero-pad and convert whatever input is still buffered.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            return Ok(Vec::new());
        }
        let padded = self.input_buf.len().div_ceil(self.chunk_size) * self.chunk_size;
        self.input_buf.resize(padded, 0.0);
        self.drain_full_chunks()
    }

    /// Returns `true` when source rate == target rate.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    fn drain_full_chunks(&mut self) -> Result<Vec<f32>> {
        let Some(ref mut resampler) = self.resampler else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[input_slice], &mut self.output_buf, None)
                .map_err(|e| SvadError::AudioReadFailure(format!("resampler: {e}")))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
            self.input_buf.drain(..self.chunk_size);
        }
        Ok(result)
    }
}

/// Convert a complete recording to `target_rate`.
///
/// The output holds exactly `round(len * target / source)` samples.
pub fn resample_all(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    let mut converter = RateConverter::new(source_rate, target_rate, RESAMPLE_CHUNK)?;
    if converter.is_passthrough() {
        return Ok(samples.to_vec());
    }
    let expected = (samples.len() as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let mut out = converter.process(samples)?;
    out.extend(converter.flush()?);
    out.resize(expected, 0.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(22_050, 22_050, 1024).unwrap();
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        assert_eq!(rc.process(&samples).unwrap(), samples);
        assert!(rc.flush().unwrap().is_empty());
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(RateConverter::new(0, 22_050, 1024).is_err());
    }

    #[test]
    fn partial_accumulation_returns_empty() {
        let mut rc = RateConverter::new(44_100, 22_050, 1024).unwrap();
        assert!(rc.process(&vec![0.0f32; 500]).unwrap().is_empty());
        assert!(!rc.flush().unwrap().is_empty(), "flush should convert the buffered tail");
    }

    #[test]
    fn resampler_failure_is_an_error_and_keeps_input() {
        let mut rc = RateConverter::new(44_100, 22_050, 1024).unwrap();
        // Too small for any rubato output chunk.
        rc.output_buf = vec![vec![0f32; 1]; 1];
        let err = rc.process(&vec![0.1f32; 1024]).unwrap_err();
        assert!(matches!(err, SvadError::AudioReadFailure(_)), "got {err:?}");
        assert_eq!(rc.input_buf.len(), 1024);
    }

    #[test]
    fn whole_buffer_has_exact_length() {
        let out = resample_all(&vec![0.1f32; 48_000], 48_000, 22_050).unwrap();
        assert_eq!(out.len(), 22_050);

        let out = resample_all(&vec![0.1f32; 1000], 16_000, 22_050).unwrap();
        assert_eq!(out.len(), 1378);
    }
}
