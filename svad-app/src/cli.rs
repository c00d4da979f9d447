//! Command-line interface for svad.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use svad_core::{ErrorMargin, MatchPolicy};

use crate::settings::{match_policy_name, Settings};

/// Detect recorded sound patterns in a live microphone stream.
#[derive(Parser, Debug)]
#[command(name = "svad", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the JSON settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level: trace, debug, info, warning, error
    #[arg(short = 'l', long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Flags that override values from the settings file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Directory holding the reference recordings
    #[arg(short = 's', long, global = true, value_name = "DIR")]
    pub sample_path: Option<PathBuf>,

    /// File-name prefix of reference recordings
    #[arg(long, global = true, value_name = "PREFIX")]
    pub sample_prefix: Option<String>,

    /// Detection sample rate in Hz
    #[arg(short = 'r', long, global = true, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Samples per chunk
    #[arg(short = 'b', long, global = true, value_name = "SAMPLES")]
    pub buffer_size: Option<usize>,

    /// Error margin in percent (0-100)
    #[arg(short = 'e', long, global = true, value_name = "PERCENT", value_parser = parse_error_margin)]
    pub error_margin: Option<f64>,

    /// Which references decide a match: any, first
    #[arg(long, global = true, value_name = "POLICY")]
    pub policy: Option<MatchPolicy>,

    /// Input device name (see `svad devices`)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,
}

impl Overrides {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.sample_path {
            settings.sample_path = path.clone();
        }
        if let Some(prefix) = &self.sample_prefix {
            settings.sample_prefix = prefix.clone();
        }
        if let Some(rate) = self.sample_rate {
            settings.sample_rate = rate;
        }
        if let Some(size) = self.buffer_size {
            settings.buffer_size = size;
        }
        if let Some(margin) = self.error_margin {
            settings.error_margin = margin;
        }
        if let Some(policy) = self.policy {
            settings.match_policy = match_policy_name(policy).into();
        }
        if let Some(device) = &self.device {
            settings.preferred_input_device = Some(device.clone());
        }
    }
}

fn parse_error_margin(raw: &str) -> Result<f64, String> {
    let percent: f64 = raw.parse().map_err(|e| format!("{raw}: {e}"))?;
    ErrorMargin::new(percent)
        .map(ErrorMargin::percent)
        .map_err(|e| e.to_string())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen until a reference pattern is heard (default)
    Detect {
        /// Replay a WAV file instead of listening to the microphone
        #[arg(long, value_name = "WAV")]
        input: Option<PathBuf>,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECONDS")]
        max_seconds: Option<u64>,

        /// Print the match event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Record a new reference from the microphone
    Record {
        /// Output WAV path
        #[arg(short, long, value_name = "WAV")]
        output: PathBuf,

        /// Recording length in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f64,
    },

    /// Show per-chunk energies and tolerance bands of reference files
    Analyze {
        /// WAV files to analyze; defaults to every reference in the sample path
        files: Vec<PathBuf>,

        /// Chunk rows to print per file
        #[arg(long, default_value_t = 10)]
        rows: usize,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// List audio input devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective settings
    Settings {
        /// Write them to the settings file
        #[arg(long)]
        save: bool,
    },
}
