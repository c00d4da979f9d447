//! Percentage tolerance bands around a chunk energy.

use serde::{Deserialize, Serialize};

use super::chunker::ChunkEnergy;
use crate::error::{Result, SvadError};

/// Error margin as a percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ErrorMargin(f64);

impl ErrorMargin {
    /// # Errors
    /// `SvadError::InvalidConfig` when `percent` is not finite or lies
    /// outside `[0, 100]`.
    pub fn new(percent: f64) -> Result<Self> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(SvadError::InvalidConfig {
                key: "error_margin",
                message: format!("{percent} is not a percentage in [0, 100]"),
            });
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// `value * margin / 100`.
    pub fn slack(self, value: f64) -> f64 {
        value * self.0 / 100.0
    }
}

impl Default for ErrorMargin {
    fn default() -> Self {
        Self(50.0)
    }
}

impl TryFrom<f64> for ErrorMargin {
    type Error = SvadError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ErrorMargin> for f64 {
    fn from(margin: ErrorMargin) -> Self {
        margin.0
    }
}

/// Inclusive `[lower, upper]` interval a live chunk energy must fall within
/// to count as a hit.
///
/// Invariant: `lower <= center <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBand {
    pub center: ChunkEnergy,
    pub lower: ChunkEnergy,
    pub upper: ChunkEnergy,
}

impl ToleranceBand {
    pub fn new(center: ChunkEnergy, margin: ErrorMargin) -> Self {
        let slack = margin.slack(center);
        Self {
            center,
            lower: center - slack,
            upper: center + slack,
        }
    }

    pub fn contains(&self, energy: ChunkEnergy) -> bool {
        self.lower <= energy && energy <= self.upper
    }
}
