//! svad command-line entry point.
//!
//! ## Runtime note
//!
//! Detection and recording are blocking loops around a `!Send` capture
//! stream, so each runs inside `spawn_blocking`, opening and dropping its
//! capture on that thread. Ctrl-C is watched on the async side and turned
//! into a cancellation of the loop; the capture is closed before the
//! process exits.

mod cli;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use svad_core::{
    analysis::PatternReport,
    audio::device::list_input_devices,
    recording::record_reference,
    BlockSource, CancellationToken, CaptureSource, DetectionOutcome, Detector, ReferenceCorpus,
    ReplaySource,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use settings::{default_settings_path, load_settings, normalize_log_level, save_settings, Settings};

/// Exit status used when the run is interrupted.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(default_settings_path);
    let (mut settings, settings_error) = match load_settings(&settings_path) {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };
    cli.overrides.apply(&mut settings);
    settings.normalize();

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level
            .as_deref()
            .map(normalize_log_level)
            .unwrap_or_else(|| settings.log_level.clone())
    };
    init_tracing(&level, cli.verbose || cli.log_level.is_some());
    if let Some(e) = settings_error {
        warn!("ignoring settings file: {e:#}");
    }

    match dispatch(cli.command, settings, settings_path).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("svad: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Explicit flags win over `RUST_LOG`; otherwise `RUST_LOG` wins over the
/// settings file.
fn init_tracing(level: &str, forced: bool) {
    let directives = format!("svad={level},svad_core={level}");
    let filter = if forced {
        EnvFilter::new(directives)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(
    command: Option<Commands>,
    settings: Settings,
    settings_path: PathBuf,
) -> Result<ExitCode> {
    let command = command.unwrap_or(Commands::Detect {
        input: None,
        max_seconds: None,
        json: false,
    });

    match command {
        Commands::Detect {
            input,
            max_seconds,
            json,
        } => detect(settings, input, max_seconds, json).await,
        Commands::Record { output, seconds } => record(settings, output, seconds).await,
        Commands::Analyze { files, rows, json } => analyze(&settings, files, rows, json),
        Commands::Devices { json } => devices(json),
        Commands::Settings { save } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                settings.detector_config().context("refusing to save invalid settings")?;
                save_settings(&settings_path, &settings)
                    .with_context(|| format!("writing {}", settings_path.display()))?;
                eprintln!("saved to {}", settings_path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            token.cancel();
        }
    });
}

async fn detect(
    settings: Settings,
    input: Option<PathBuf>,
    max_seconds: Option<u64>,
    json: bool,
) -> Result<ExitCode> {
    let mut config = settings.detector_config().context("invalid settings")?;
    if let Some(secs) = max_seconds {
        config.max_run = Some(Duration::from_secs(secs));
    }
    info!(
        sample_path = %config.reference_dir.display(),
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        error_margin = config.error_margin,
        "starting svad"
    );

    let detector = Detector::load(config).context("loading reference patterns")?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(&token);

    let outcome = tokio::task::spawn_blocking(move || -> Result<DetectionOutcome> {
        let config = detector.config();
        let mut source: Box<dyn BlockSource> = match &input {
            Some(path) => Box::new(
                ReplaySource::from_wav(path, config.block_size, config.sample_rate)
                    .with_context(|| format!("reading {}", path.display()))?,
            ),
            None => Box::new(
                CaptureSource::open(
                    config.sample_rate,
                    config.block_size,
                    config.preferred_input_device.as_deref(),
                    token.clone(),
                )
                .context("opening microphone")?,
            ),
        };
        // The source (and with it the capture stream) drops when this
        // closure returns, on every path.
        Ok(detector.run(&mut source, &token)?)
    })
    .await
    .context("detection thread panicked")??;

    Ok(match outcome {
        DetectionOutcome::Matched(event) => {
            if json {
                println!("{}", serde_json::to_string(&event)?);
            } else {
                println!(
                    "Match found: {} ({} matching chunks)",
                    event.pattern.as_deref().unwrap_or("reference"),
                    event.hits
                );
            }
            ExitCode::SUCCESS
        }
        DetectionOutcome::Cancelled => ExitCode::from(EXIT_INTERRUPTED),
        other => {
            eprintln!("no match: {other}");
            ExitCode::FAILURE
        }
    })
}

async fn record(settings: Settings, output: PathBuf, seconds: f64) -> Result<ExitCode> {
    let config = settings.detector_config().context("invalid settings")?;
    let token = CancellationToken::new();
    cancel_on_ctrl_c(&token);

    let summary = tokio::task::spawn_blocking(move || {
        let mut source = CaptureSource::open(
            config.sample_rate,
            config.block_size,
            config.preferred_input_device.as_deref(),
            token.clone(),
        )
        .context("opening microphone")?;
        eprintln!("Recording");
        let summary = record_reference(&mut source, &output, seconds, &token)
            .with_context(|| format!("recording to {}", output.display()))?;
        eprintln!("Finished recording");
        anyhow::Ok(summary)
    })
    .await
    .context("recording thread panicked")??;

    println!(
        "saved {} samples ({} blocks @ {} Hz) to {}",
        summary.samples,
        summary.blocks,
        summary.sample_rate,
        summary.path.display()
    );
    Ok(if summary.complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INTERRUPTED)
    })
}

fn analyze(settings: &Settings, files: Vec<PathBuf>, rows: usize, json: bool) -> Result<ExitCode> {
    let config = settings.detector_config().context("invalid settings")?;
    let builder = config.pattern_builder()?;
    let files = if files.is_empty() {
        let corpus = config.corpus();
        let paths = corpus.paths().with_context(|| format!("listing {}", corpus.describe()))?;
        if paths.is_empty() {
            anyhow::bail!("no reference recordings found in {}", corpus.describe());
        }
        paths
    } else {
        files
    };

    for path in files {
        let report = PatternReport::from_wav(&path, &builder)
            .with_context(|| format!("analyzing {}", path.display()))?;
        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            println!("{}", report.render_table(rows));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn devices(json: bool) -> Result<ExitCode> {
    let devices = list_input_devices();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(ExitCode::SUCCESS);
    }
    if devices.is_empty() {
        println!("no input devices found");
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        let rate = device
            .default_sample_rate
            .map(|r| format!("{r} Hz"))
            .unwrap_or_else(|| "unknown rate".into());
        println!("{marker} {} ({rate})", device.name);
    }
    Ok(ExitCode::SUCCESS)
}
