//! Reference recordings the registry is built from.
//!
//! The `ReferenceCorpus` trait is the seam between pattern loading and
//! storage: `WavDirectory` reads `<prefix>*.wav` files from disk,
//! `InMemoryCorpus` serves recordings already held in memory.

use std::path::PathBuf;

use tracing::debug;

use crate::audio::wav::read_wav_mono;
use crate::error::Result;

/// Default file-name prefix identifying reference recordings.
pub const DEFAULT_REFERENCE_PREFIX: &str = "sample-";

/// A finite mono recording with a stable identifying name.
#[derive(Debug, Clone)]
pub struct ReferenceRecording {
    pub name: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl ReferenceRecording {
    pub fn new(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            name: name.into(),
            samples,
            sample_rate,
        }
    }
}

/// Enumerates reference recordings.
pub trait ReferenceCorpus {
    /// Every reference in the corpus, in a stable order.
    fn references(&self) -> Result<Vec<ReferenceRecording>>;

    /// Human-readable location used in logs and errors.
    fn describe(&self) -> String;
}

/// WAV files in one directory whose names start with a prefix.
#[derive(Debug, Clone)]
pub struct WavDirectory {
    dir: PathBuf,
    prefix: String,
}

impl WavDirectory {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Matching file paths sorted by file name.
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if is_wav && file_name.starts_with(&self.prefix) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl ReferenceCorpus for WavDirectory {
    fn references(&self) -> Result<Vec<ReferenceRecording>> {
        self.paths()?
            .into_iter()
            .map(|path| {
                let (samples, sample_rate) = read_wav_mono(&path)?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                debug!(name = name.as_str(), samples = samples.len(), sample_rate, "reference decoded");
                Ok(ReferenceRecording::new(name, samples, sample_rate))
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("{}/{}*.wav", self.dir.display(), self.prefix)
    }
}

/// Recordings held in memory, served in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    recordings: Vec<ReferenceRecording>,
}

impl InMemoryCorpus {
    pub fn new(recordings: Vec<ReferenceRecording>) -> Self {
        Self { recordings }
    }
}

impl ReferenceCorpus for InMemoryCorpus {
    fn references(&self) -> Result<Vec<ReferenceRecording>> {
        Ok(self.recordings.clone())
    }

    fn describe(&self) -> String {
        format!("memory ({} recordings)", self.recordings.len())
    }
}
