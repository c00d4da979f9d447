//! Reference pattern construction.
//!
//! ```text
//! samples ─► chunker::split_energies ─► ToleranceBand per chunk ─► ReferencePattern
//!                                                                      │
//!                                                               PatternRegistry
//! ```

pub mod band;
pub mod builder;
pub mod chunker;
pub mod registry;

pub use band::{ErrorMargin, ToleranceBand};
pub use builder::{PatternBuilder, ReferencePattern};
pub use chunker::{block_energy, split_energies, ChunkEnergy};
pub use registry::PatternRegistry;
