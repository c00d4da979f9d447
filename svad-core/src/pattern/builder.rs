//! Turns a reference recording into an ordered sequence of tolerance bands.

use serde::Serialize;
use tracing::debug;

use super::band::{ErrorMargin, ToleranceBand};
use super::chunker::split_energies;
use crate::audio::resample::resample_all;
use crate::corpus::ReferenceRecording;
use crate::error::{Result, SvadError};

/// A reference recording reduced to per-chunk tolerance bands.
///
/// Built once at load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePattern {
    name: String,
    bands: Vec<ToleranceBand>,
}

impl ReferencePattern {
    pub fn new(name: impl Into<String>, bands: Vec<ToleranceBand>) -> Self {
        Self {
            name: name.into(),
            bands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunk_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, index: usize) -> Option<&ToleranceBand> {
        self.bands.get(index)
    }

    pub fn bands(&self) -> &[ToleranceBand] {
        &self.bands
    }
}

/// Builds [`ReferencePattern`]s at a fixed rate, block size and margin.
#[derive(Debug, Clone, Copy)]
pub struct PatternBuilder {
    sample_rate: u32,
    block_size: usize,
    margin: ErrorMargin,
}

impl PatternBuilder {
    /// # Errors
    /// `SvadError::InvalidConfig` when `sample_rate` or `block_size` is zero.
    pub fn new(sample_rate: u32, block_size: usize, margin: ErrorMargin) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SvadError::InvalidConfig {
                key: "sample_rate",
                message: "must be positive".into(),
            });
        }
        if block_size == 0 {
            return Err(SvadError::InvalidConfig {
                key: "block_size",
                message: "must be positive".into(),
            });
        }
        Ok(Self {
            sample_rate,
            block_size,
            margin,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn margin(&self) -> ErrorMargin {
        self.margin
    }

    /// Build a pattern from a recording, resampling it to the configured
    /// rate first when the rates differ.
    ///
    /// # Errors
    /// `SvadError::ReferenceTooShort` when the recording holds fewer samples
    /// than one block.
    pub fn build(&self, recording: &ReferenceRecording) -> Result<ReferencePattern> {
        if recording.sample_rate == self.sample_rate {
            return self.build_from_samples(&recording.name, &recording.samples);
        }
        let samples = resample_all(&recording.samples, recording.sample_rate, self.sample_rate)?;
        debug!(
            name = recording.name.as_str(),
            from = recording.sample_rate,
            to = self.sample_rate,
            "reference resampled"
        );
        self.build_from_samples(&recording.name, &samples)
    }

    /// Build a pattern from samples already at the configured rate.
    pub fn build_from_samples(&self, name: &str, samples: &[f32]) -> Result<ReferencePattern> {
        let chunk_count = samples.len() / self.block_size;
        if chunk_count < 1 {
            return Err(SvadError::ReferenceTooShort {
                name: name.to_string(),
                samples: samples.len(),
                block_size: self.block_size,
            });
        }

        let bands = split_energies(samples, chunk_count)?
            .into_iter()
            .map(|energy| ToleranceBand::new(energy, self.margin))
            .collect::<Vec<_>>();

        debug!(name, chunk_count, "reference pattern built");
        Ok(ReferencePattern::new(name, bands))
    }
}
