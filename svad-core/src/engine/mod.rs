//! `Detector`: owns the loaded patterns and drives detection runs.
//!
//! ## Lifecycle
//!
//! ```text
//! Detector::load(config)          → references decoded, registry built, status = Idle
//!     └─► run(source, &cancel)    → status = Listening
//!             ├─► Matched         → status = Matched
//!             ├─► Cancelled / Exhausted / TimedOut → status = Stopped
//!             └─► Err(..)         → status = Error
//! ```
//!
//! The registry is immutable once the detector exists; every run gets a
//! fresh streaming window, so a restarted run never sees stale energies.
//!
//! ## Threading
//!
//! `run` is synchronous and blocking. Capture sources are `!Send`, so callers
//! open the source on the thread that calls `run` (`spawn_blocking` in the
//! CLI) and cancel from elsewhere through a [`CancellationToken`].

pub mod pipeline;

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    audio::BlockSource,
    corpus::{ReferenceCorpus, WavDirectory, DEFAULT_REFERENCE_PREFIX},
    error::{Result, SvadError},
    events::{DetectorStatus, MatchEvent, StatusEvent},
    matcher::{MatchPolicy, Matcher},
    pattern::{ErrorMargin, PatternBuilder, PatternRegistry},
};

pub use pipeline::{DetectionOutcome, DiagnosticsSnapshot};

/// Broadcast channel capacity for status and match events.
const BROADCAST_CAP: usize = 64;

/// Configuration for `Detector`.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Detection sample rate (Hz). References and capture are resampled to
    /// it. Default: 22050.
    pub sample_rate: u32,
    /// Samples per live block and per reference chunk. Default: 1024.
    pub block_size: usize,
    /// Percentage tolerance for per-chunk bands and the hit-count
    /// threshold. Default: 50.
    pub error_margin: f64,
    /// Directory holding the reference recordings. Default: `samples`.
    pub reference_dir: PathBuf,
    /// File-name prefix of reference recordings. Default: `sample-`.
    pub reference_prefix: String,
    /// Which patterns decide the verdict. Default: any reference.
    pub match_policy: MatchPolicy,
    /// Stop a run without a match after this long. Default: unbounded.
    pub max_run: Option<Duration>,
    /// Input device name; `None` uses the system default.
    pub preferred_input_device: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            block_size: 1024,
            error_margin: 50.0,
            reference_dir: PathBuf::from("samples"),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.into(),
            match_policy: MatchPolicy::default(),
            max_run: None,
            preferred_input_device: None,
        }
    }
}

impl DetectorConfig {
    /// # Errors
    /// `SvadError::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.pattern_builder().map(|_| ())
    }

    pub fn margin(&self) -> Result<ErrorMargin> {
        ErrorMargin::new(self.error_margin)
    }

    pub fn pattern_builder(&self) -> Result<PatternBuilder> {
        PatternBuilder::new(self.sample_rate, self.block_size, self.margin()?)
    }

    /// The on-disk reference corpus this config points at.
    pub fn corpus(&self) -> WavDirectory {
        WavDirectory::new(&self.reference_dir, &self.reference_prefix)
    }
}

/// Cooperative stop signal shared between the run loop and its controller.
///
/// Cloning yields a handle to the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Loaded reference patterns plus the machinery to run detection.
pub struct Detector {
    config: DetectorConfig,
    registry: PatternRegistry,
    matcher: Matcher,
    status: Arc<Mutex<DetectorStatus>>,
    status_tx: broadcast::Sender<StatusEvent>,
    match_tx: broadcast::Sender<MatchEvent>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl Detector {
    /// Wrap an already-built registry.
    ///
    /// # Errors
    /// `SvadError::EmptyRegistry` when the registry holds no chunks, or
    /// `SvadError::InvalidConfig` for an invalid config.
    pub fn new(config: DetectorConfig, registry: PatternRegistry) -> Result<Self> {
        config.validate()?;
        if registry.capacity() == 0 {
            return Err(SvadError::EmptyRegistry);
        }

        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (match_tx, _) = broadcast::channel(BROADCAST_CAP);
        let matcher = Matcher::new(config.match_policy);

        info!(
            patterns = registry.len(),
            window = registry.capacity(),
            policy = ?config.match_policy,
            "detector ready"
        );

        Ok(Self {
            config,
            registry,
            matcher,
            status: Arc::new(Mutex::new(DetectorStatus::Idle)),
            status_tx,
            match_tx,
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        })
    }

    /// Load every reference from the config's WAV directory.
    pub fn load(config: DetectorConfig) -> Result<Self> {
        let corpus = config.corpus();
        Self::from_corpus(config, &corpus)
    }

    /// Load every reference from `corpus`.
    pub fn from_corpus(config: DetectorConfig, corpus: &dyn ReferenceCorpus) -> Result<Self> {
        let builder = config.pattern_builder()?;
        let registry = PatternRegistry::from_corpus(corpus, &builder)?;
        Self::new(config, registry)
    }

    /// Ingest blocks from `source` until a match, cancellation, exhaustion
    /// of the source, or the configured maximum run time.
    ///
    /// Errors from the source are returned as-is; the detector never
    /// retries a read.
    pub fn run<S: BlockSource + ?Sized>(
        &self,
        source: &mut S,
        cancel: &CancellationToken,
    ) -> Result<DetectionOutcome> {
        if source.block_size() != self.config.block_size {
            return Err(SvadError::InvalidConfig {
                key: "block_size",
                message: format!(
                    "source delivers {} samples per block, detector expects {}",
                    source.block_size(),
                    self.config.block_size
                ),
            });
        }
        if source.sample_rate() != self.config.sample_rate {
            return Err(SvadError::InvalidConfig {
                key: "sample_rate",
                message: format!(
                    "source runs at {} Hz, detector expects {} Hz",
                    source.sample_rate(),
                    self.config.sample_rate
                ),
            });
        }

        self.diagnostics.reset();
        self.set_status(DetectorStatus::Listening, None);

        let result = pipeline::run(pipeline::PipelineContext {
            registry: &self.registry,
            matcher: self.matcher,
            source,
            cancel,
            max_run: self.config.max_run,
            match_tx: &self.match_tx,
            diagnostics: self.diagnostics.as_ref(),
        });

        match &result {
            Ok(DetectionOutcome::Matched(event)) => {
                self.set_status(DetectorStatus::Matched, event.pattern.clone())
            }
            Ok(outcome) => self.set_status(DetectorStatus::Stopped, Some(outcome.to_string())),
            Err(e) => self.set_status(DetectorStatus::Error, Some(e.to_string())),
        }
        result
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Current detector status (snapshot).
    pub fn status(&self) -> DetectorStatus {
        *self.status.lock()
    }

    /// Subscribe to match events.
    pub fn subscribe_matches(&self) -> broadcast::Receiver<MatchEvent> {
        self.match_tx.subscribe()
    }

    /// Subscribe to status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Counters of the current (or last) run.
    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, new_status: DetectorStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(StatusEvent {
            status: new_status,
            detail,
        });
    }
}
