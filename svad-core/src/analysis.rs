//! Per-chunk energy report for a single reference recording.
//!
//! Shows what the detector will compare against: each chunk's energy and
//! its tolerance band, plus summary statistics.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::audio::wav::read_wav_mono;
use crate::corpus::ReferenceRecording;
use crate::error::Result;
use crate::pattern::{PatternBuilder, ToleranceBand};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub name: String,
    /// Rate of the source file before resampling.
    pub source_sample_rate: u32,
    pub source_samples: usize,
    pub duration_secs: f64,
    pub chunk_count: usize,
    pub min_energy: f64,
    pub max_energy: f64,
    pub mean_energy: f64,
    pub bands: Vec<ToleranceBand>,
}

impl PatternReport {
    /// Build the pattern for `recording` and summarize it.
    pub fn from_recording(recording: &ReferenceRecording, builder: &PatternBuilder) -> Result<Self> {
        let pattern = builder.build(recording)?;
        let bands = pattern.bands().to_vec();
        let centers = bands.iter().map(|b| b.center);
        let min_energy = centers.clone().fold(f64::INFINITY, f64::min);
        let max_energy = centers.clone().fold(0.0, f64::max);
        let mean_energy = centers.sum::<f64>() / bands.len() as f64;

        Ok(Self {
            name: recording.name.clone(),
            source_sample_rate: recording.sample_rate,
            source_samples: recording.samples.len(),
            duration_secs: recording.samples.len() as f64 / recording.sample_rate.max(1) as f64,
            chunk_count: bands.len(),
            min_energy,
            max_energy,
            mean_energy,
            bands,
        })
    }

    /// Decode a WAV file and report on it.
    pub fn from_wav(path: &Path, builder: &PatternBuilder) -> Result<Self> {
        let (samples, sample_rate) = read_wav_mono(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_recording(&ReferenceRecording::new(name, samples, sample_rate), builder)
    }

    /// Plain-text table, at most `limit` chunk rows.
    pub fn render_table(&self, limit: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{}: {} samples @ {} Hz ({:.2} s), {} chunks",
            self.name, self.source_samples, self.source_sample_rate, self.duration_secs, self.chunk_count
        );
        let _ = writeln!(
            out,
            "energy min {:.4}  max {:.4}  mean {:.4}",
            self.min_energy, self.max_energy, self.mean_energy
        );
        let _ = writeln!(out, "{:>6}  {:>12}  {:>12}  {:>12}", "chunk", "lower", "energy", "upper");
        for (i, band) in self.bands.iter().take(limit).enumerate() {
            let _ = writeln!(
                out,
                "{:>6}  {:>12.4}  {:>12.4}  {:>12.4}",
                i, band.lower, band.center, band.upper
            );
        }
        if self.bands.len() > limit {
            let _ = writeln!(out, "... {} more", self.bands.len() - limit);
        }
        out
    }
}
