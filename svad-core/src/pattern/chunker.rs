//! Reduces sample sequences to per-chunk energy scalars.
//!
//! ## Partition scheme
//!
//! `L` samples split into `n` parts: the first `L % n` parts hold
//! `L / n + 1` samples, the rest hold `L / n`. Parts are contiguous and
//! cover the input exactly once.

use crate::error::{Result, SvadError};

/// Sum of absolute sample amplitudes within one contiguous segment.
pub type ChunkEnergy = f64;

/// Energy of a single block: `Σ|s|`, accumulated in double precision.
pub fn block_energy(samples: &[f32]) -> ChunkEnergy {
    samples.iter().map(|s| f64::from(s.abs())).sum()
}

/// Lengths of the `n` near-equal parts of a sequence of `len` samples.
///
/// # Errors
/// `SvadError::InvalidChunkCount` when `n == 0` or `n > len`.
pub fn partition_lengths(len: usize, n: usize) -> Result<Vec<usize>> {
    if n == 0 || n > len {
        return Err(SvadError::InvalidChunkCount {
            count: n,
            samples: len,
        });
    }
    let base = len / n;
    let extra = len % n;
    Ok((0..n).map(|i| if i < extra { base + 1 } else { base }).collect())
}

/// Split `samples` into `n` contiguous near-equal parts and reduce each to
/// its energy.
///
/// # Errors
/// `SvadError::InvalidChunkCount` when `n == 0` or `n` exceeds the sample
/// count. A reference shorter than one chunk is rejected, never truncated.
pub fn split_energies(samples: &[f32], n: usize) -> Result<Vec<ChunkEnergy>> {
    let lengths = partition_lengths(samples.len(), n)?;
    let mut energies = Vec::with_capacity(n);
    let mut start = 0;
    for len in lengths {
        energies.push(block_energy(&samples[start..start + len]));
        start += len;
    }
    Ok(energies)
}
