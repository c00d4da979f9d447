//! Capturing new reference recordings.
//!
//! Reads whole blocks from a [`BlockSource`] and writes them to a mono
//! 32-bit float WAV at the source's rate, the format the reference corpus
//! loads.

use std::path::{Path, PathBuf};

use hound::WavWriter;
use serde::Serialize;
use tracing::{info, warn};

use crate::audio::{wav::mono_float_spec, BlockSource};
use crate::engine::CancellationToken;
use crate::error::{Result, SvadError};

/// What was written by [`record_reference`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub blocks: usize,
    pub samples: usize,
    pub sample_rate: u32,
    /// `false` when the source ended or the run was cancelled early.
    pub complete: bool,
}

/// Whole blocks covering `seconds` of audio, truncated.
pub fn blocks_for_duration(sample_rate: u32, block_size: usize, seconds: f64) -> usize {
    if block_size == 0 || !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (sample_rate as f64 / block_size as f64 * seconds) as usize
}

/// Record `seconds` of audio from `source` into a WAV file at `path`.
///
/// Whatever was captured before a cancellation or the end of the source is
/// still written and finalized.
///
/// # Errors
/// `SvadError::InvalidConfig` when `seconds` covers no whole block; source
/// and file errors are propagated.
pub fn record_reference<S: BlockSource + ?Sized>(
    source: &mut S,
    path: &Path,
    seconds: f64,
    cancel: &CancellationToken,
) -> Result<RecordingSummary> {
    let sample_rate = source.sample_rate();
    let target_blocks = blocks_for_duration(sample_rate, source.block_size(), seconds);
    if target_blocks == 0 {
        return Err(SvadError::InvalidConfig {
            key: "seconds",
            message: format!("{seconds} s is shorter than one block"),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WavWriter::create(path, mono_float_spec(sample_rate))?;

    info!(path = %path.display(), blocks = target_blocks, "recording");
    let mut blocks = 0;
    let mut samples = 0;
    while blocks < target_blocks && !cancel.is_cancelled() {
        let Some(block) = source.next_block()? else {
            break;
        };
        for &sample in &block.samples {
            writer.write_sample(sample)?;
        }
        samples += block.len();
        blocks += 1;
    }
    writer.finalize()?;

    let complete = blocks == target_blocks;
    if complete {
        info!(path = %path.display(), samples, "recording saved");
    } else {
        warn!(path = %path.display(), blocks, target_blocks, "recording ended early");
    }

    Ok(RecordingSummary {
        path: path.to_path_buf(),
        blocks,
        samples,
        sample_rate,
        complete,
    })
}
