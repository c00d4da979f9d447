//! # svad-core
//!
//! Streaming chunk-energy pattern detector.
//!
//! ## Architecture
//!
//! ```text
//! ReferenceCorpus ─► PatternBuilder ─► PatternRegistry ──────────────┐
//!                                           │ capacity               │
//!                                           ▼                        ▼
//! Microphone → AudioCapture → SPSC RingBuffer → BlockSource → StreamingWindow → Matcher
//!                                                                             │
//!                                                         broadcast::Sender<MatchEvent>
//! ```
//!
//! The capture callback is zero-alloc. Chunking, windowing and matching
//! happen on the thread that calls [`Detector::run`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod analysis;
pub mod audio;
pub mod buffering;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod events;
pub mod matcher;
pub mod pattern;
pub mod recording;

// Convenience re-exports for downstream crates
pub use audio::{BlockSource, CaptureSource, ReplaySource};
pub use buffering::StreamingWindow;
pub use corpus::{InMemoryCorpus, ReferenceCorpus, ReferenceRecording, WavDirectory};
pub use engine::{CancellationToken, DetectionOutcome, Detector, DetectorConfig};
pub use error::{Result, SvadError};
pub use events::{DetectorStatus, MatchEvent, StatusEvent};
pub use matcher::{MatchPolicy, MatchVerdict, Matcher};
pub use pattern::{ErrorMargin, PatternBuilder, PatternRegistry, ReferencePattern, ToleranceBand};
