//! Blocking ingestion loop.
//!
//! ## Per iteration
//!
//! ```text
//! 1. Check the cancellation token and the run deadline
//! 2. Read one block from the source (blocking)
//! 3. Reduce the block to its energy and push it into the window
//! 4. Once the window is saturated: evaluate every registered pattern
//! 5. On the first positive verdict: broadcast a MatchEvent and stop
//! ```
//!
//! Nothing here retries. A source error ends the run and is returned to
//! the caller.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span};

use crate::{
    audio::BlockSource,
    buffering::StreamingWindow,
    engine::CancellationToken,
    error::Result,
    events::MatchEvent,
    matcher::Matcher,
    pattern::PatternRegistry,
};

/// Counters for the current run, readable from any thread.
#[derive(Default)]
pub struct PipelineDiagnostics {
    pub blocks_in: AtomicU64,
    pub evaluations: AtomicU64,
    pub best_hits: AtomicUsize,
    pub matches: AtomicU64,
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.blocks_in.store(0, Ordering::Relaxed);
        self.evaluations.store(0, Ordering::Relaxed);
        self.best_hits.store(0, Ordering::Relaxed);
        self.matches.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            blocks_in: self.blocks_in.load(Ordering::Relaxed),
            evaluations: self.evaluations.load(Ordering::Relaxed),
            best_hits: self.best_hits.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub blocks_in: u64,
    pub evaluations: u64,
    /// Highest hit count seen by any evaluation of the run.
    pub best_hits: usize,
    pub matches: u64,
}

/// How a detection run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// The live window matched a reference pattern.
    Matched(MatchEvent),
    /// The cancellation token was triggered.
    Cancelled,
    /// The source ran out of blocks.
    Exhausted,
    /// The configured maximum run time elapsed.
    TimedOut,
}

impl DetectionOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }
}

impl fmt::Display for DetectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched(event) => write!(
                f,
                "matched {} ({} hits)",
                event.pattern.as_deref().unwrap_or("<unnamed>"),
                event.hits
            ),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Exhausted => f.write_str("source exhausted"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Everything one run needs, borrowed from the owning `Detector`.
pub struct PipelineContext<'a, S: BlockSource + ?Sized> {
    pub registry: &'a PatternRegistry,
    pub matcher: Matcher,
    pub source: &'a mut S,
    pub cancel: &'a CancellationToken,
    pub max_run: Option<Duration>,
    pub match_tx: &'a broadcast::Sender<MatchEvent>,
    pub diagnostics: &'a PipelineDiagnostics,
}

/// Run the loop until a match, cancellation, exhaustion or timeout.
pub fn run<S: BlockSource + ?Sized>(ctx: PipelineContext<'_, S>) -> Result<DetectionOutcome> {
    let mut window = StreamingWindow::for_registry(ctx.registry)?;
    let span = info_span!("detection_run", window = window.capacity());
    let _enter = span.enter();
    info!("listening");

    let started = Instant::now();
    let mut block_index = 0u64;

    loop {
        // ── 1. Cooperative stop points ───────────────────────────────────
        if ctx.cancel.is_cancelled() {
            info!(blocks = block_index, "run cancelled");
            return Ok(DetectionOutcome::Cancelled);
        }
        if ctx.max_run.is_some_and(|limit| started.elapsed() >= limit) {
            info!(blocks = block_index, "maximum run time reached");
            return Ok(DetectionOutcome::TimedOut);
        }

        // ── 2. Read one block ────────────────────────────────────────────
        let block = match ctx.source.next_block() {
            Ok(Some(block)) => block,
            Ok(None) if ctx.cancel.is_cancelled() => {
                info!(blocks = block_index, "run cancelled");
                return Ok(DetectionOutcome::Cancelled);
            }
            Ok(None) => {
                info!(blocks = block_index, "source exhausted");
                return Ok(DetectionOutcome::Exhausted);
            }
            Err(e) => {
                error!(blocks = block_index, "audio read failed: {e}");
                return Err(e);
            }
        };
        ctx.diagnostics.blocks_in.fetch_add(1, Ordering::Relaxed);

        // ── 3. Energy into the window ────────────────────────────────────
        window.push(block.energy());

        // ── 4. Evaluate once saturated ───────────────────────────────────
        if window.is_full() {
            ctx.diagnostics.evaluations.fetch_add(1, Ordering::Relaxed);
            let verdict = ctx.matcher.evaluate(&window, ctx.registry);
            ctx.diagnostics
                .best_hits
                .fetch_max(verdict.hits, Ordering::Relaxed);
            debug!(block = block_index, hits = verdict.hits, "window evaluated");

            // ── 5. Stop on match ─────────────────────────────────────────
            if verdict.matched {
                ctx.diagnostics.matches.fetch_add(1, Ordering::Relaxed);
                let event = MatchEvent {
                    pattern: verdict.pattern,
                    hits: verdict.hits,
                    block_index,
                };
                info!(
                    pattern = event.pattern.as_deref().unwrap_or_default(),
                    hits = event.hits,
                    block = block_index,
                    "match found"
                );
                let _ = ctx.match_tx.send(event.clone());
                return Ok(DetectionOutcome::Matched(event));
            }
        }

        block_index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ReplaySource;
    use crate::buffering::chunk::AudioChunk;
    use crate::error::SvadError;
    use crate::pattern::{ErrorMargin, ReferencePattern, ToleranceBand};

    fn registry(centers: &[f64], pct: f64) -> PatternRegistry {
        let margin = ErrorMargin::new(pct).unwrap();
        let mut registry = PatternRegistry::new(margin);
        registry.add(ReferencePattern::new(
            "ref",
            centers.iter().map(|c| ToleranceBand::new(*c, margin)).collect(),
        ));
        registry
    }

    fn run_with<S: BlockSource>(
        registry: &PatternRegistry,
        source: &mut S,
        cancel: &CancellationToken,
        max_run: Option<Duration>,
    ) -> (Result<DetectionOutcome>, DiagnosticsSnapshot) {
        let (match_tx, _) = broadcast::channel(4);
        let diagnostics = PipelineDiagnostics::default();
        let result = run(PipelineContext {
            registry,
            matcher: Matcher::default(),
            source,
            cancel,
            max_run,
            match_tx: &match_tx,
            diagnostics: &diagnostics,
        });
        (result, diagnostics.snapshot())
    }

    /// Yields silence forever and trips the token after `after` blocks.
    struct CancellingSource {
        remaining: usize,
        token: CancellationToken,
    }

    impl BlockSource for CancellingSource {
        fn next_block(&mut self) -> Result<Option<AudioChunk>> {
            if self.remaining == 0 {
                self.token.cancel();
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(AudioChunk::new(vec![0.0; 4], 8_000)))
        }

        fn block_size(&self) -> usize {
            4
        }

        fn sample_rate(&self) -> u32 {
            8_000
        }
    }

    struct FailingSource;

    impl BlockSource for FailingSource {
        fn next_block(&mut self) -> Result<Option<AudioChunk>> {
            Err(SvadError::AudioReadFailure("device unplugged".into()))
        }

        fn block_size(&self) -> usize {
            4
        }

        fn sample_rate(&self) -> u32 {
            8_000
        }
    }

    #[test]
    fn match_stops_on_block_that_completes_it() {
        let registry = registry(&[1.0, 2.0, 3.0], 10.0);
        // Two leading silent blocks, then the pattern.
        let mut source = ReplaySource::from_block_energies(&[0.0, 0.0, 1.0, 2.0, 3.0, 9.0], 4, 8_000);
        let (result, snapshot) = run_with(&registry, &mut source, &CancellationToken::new(), None);

        let DetectionOutcome::Matched(event) = result.unwrap() else {
            panic!("expected a match");
        };
        assert_eq!(event.block_index, 4);
        assert_eq!(event.hits, 3);
        assert_eq!(snapshot.blocks_in, 5);
        assert_eq!(snapshot.evaluations, 3);
        assert_eq!(snapshot.matches, 1);
        assert_eq!(source.remaining_blocks(), 1, "loop must halt after the match");
    }

    #[test]
    fn cancellation_inside_read_reports_cancelled() {
        let registry = registry(&[5.0, 5.0], 10.0);
        let token = CancellationToken::new();
        let mut source = CancellingSource {
            remaining: 3,
            token: token.clone(),
        };
        let (result, snapshot) = run_with(&registry, &mut source, &token, None);
        assert_eq!(result.unwrap(), DetectionOutcome::Cancelled);
        assert_eq!(snapshot.blocks_in, 3);
    }

    #[test]
    fn pre_cancelled_run_reads_nothing() {
        let registry = registry(&[5.0], 10.0);
        let token = CancellationToken::new();
        token.cancel();
        let mut source = ReplaySource::from_block_energies(&[5.0], 4, 8_000);
        let (result, snapshot) = run_with(&registry, &mut source, &token, None);
        assert_eq!(result.unwrap(), DetectionOutcome::Cancelled);
        assert_eq!(snapshot.blocks_in, 0);
    }

    #[test]
    fn zero_max_run_times_out_immediately() {
        let registry = registry(&[5.0], 10.0);
        let mut source = ReplaySource::from_block_energies(&[5.0], 4, 8_000);
        let (result, _) = run_with(
            &registry,
            &mut source,
            &CancellationToken::new(),
            Some(Duration::ZERO),
        );
        assert_eq!(result.unwrap(), DetectionOutcome::TimedOut);
    }

    #[test]
    fn read_failure_propagates() {
        let registry = registry(&[5.0], 10.0);
        let (result, _) = run_with(&registry, &mut FailingSource, &CancellationToken::new(), None);
        assert!(matches!(result, Err(SvadError::AudioReadFailure(_))));
    }

    #[test]
    fn empty_registry_cannot_run() {
        let registry = PatternRegistry::new(ErrorMargin::default());
        let mut source = ReplaySource::from_block_energies(&[5.0], 4, 8_000);
        let (result, _) = run_with(&registry, &mut source, &CancellationToken::new(), None);
        assert!(matches!(result, Err(SvadError::EmptyRegistry)));
    }
}
