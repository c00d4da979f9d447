//! Persistent detector settings (JSON file in the user data directory).
//!
//! Every field has a default, so a partial or missing file is fine. CLI
//! flags are applied on top of the loaded values. Sizes and rates are
//! clamped; the error margin and match policy are passed through unchanged
//! and rejected by `detector_config` when invalid.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use svad_core::{DetectorConfig, MatchPolicy, SvadError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct Settings {
    pub sample_path: PathBuf,
    pub sample_prefix: String,
    pub sample_rate: u32,
    pub buffer_size: usize,
    pub error_margin: f64,
    pub match_policy: String,
    pub preferred_input_device: Option<String>,
    pub max_run_secs: Option<u64>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_path: PathBuf::from("samples"),
            sample_prefix: "sample-".into(),
            sample_rate: 22_050,
            buffer_size: 1024,
            error_margin: 50.0,
            match_policy: "any".into(),
            preferred_input_device: None,
            max_run_secs: None,
            log_level: "info".into(),
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.sample_rate = self.sample_rate.clamp(4_000, 192_000);
        self.buffer_size = self.buffer_size.clamp(16, 1 << 16);
        self.match_policy = normalize_match_policy(&self.match_policy);
        self.log_level = normalize_log_level(&self.log_level);
        if self.sample_prefix.trim().is_empty() {
            self.sample_prefix = "sample-".into();
        }
        self.preferred_input_device = self
            .preferred_input_device
            .as_ref()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self.max_run_secs = self.max_run_secs.filter(|s| *s > 0);
    }

    /// # Errors
    /// `SvadError::InvalidConfig` for an unknown match policy or an error
    /// margin outside `[0, 100]`.
    pub fn detector_config(&self) -> svad_core::Result<DetectorConfig> {
        let match_policy = self
            .match_policy
            .parse()
            .map_err(|message| SvadError::InvalidConfig {
                key: "match_policy",
                message,
            })?;
        let config = DetectorConfig {
            sample_rate: self.sample_rate,
            block_size: self.buffer_size,
            error_margin: self.error_margin,
            reference_dir: self.sample_path.clone(),
            reference_prefix: self.sample_prefix.clone(),
            match_policy,
            max_run: self.max_run_secs.map(Duration::from_secs),
            preferred_input_device: self.preferred_input_device.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Short name for a policy, as written in the settings file.
pub fn match_policy_name(policy: MatchPolicy) -> &'static str {
    match policy {
        MatchPolicy::FirstReference => "first",
        MatchPolicy::AnyReference => "any",
    }
}

/// Canonical short name, or the raw value when it names no policy.
pub fn normalize_match_policy(raw: &str) -> String {
    match raw.parse::<MatchPolicy>() {
        Ok(policy) => match_policy_name(policy).into(),
        Err(_) => raw.trim().to_string(),
    }
}

/// Map the level names users know from other tools onto tracing levels.
pub fn normalize_log_level(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "notset" | "trace" => "trace".into(),
        "debug" => "debug".into(),
        "warn" | "warning" => "warn".into(),
        "error" | "critical" => "error".into(),
        _ => "info".into(),
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("svad")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".config")
            })
            .join("svad")
            .join("settings.json")
    }
}

/// A missing file yields the defaults.
///
/// # Errors
/// The file exists but cannot be read or parsed.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<Settings>(&raw)
            .with_context(|| format!("parsing {}", path.display()))?,
        Err(e) if e.kind() == ErrorKind::NotFound => Settings::default(),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    settings.normalize();
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
