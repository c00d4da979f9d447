//! Owns every loaded reference pattern and the global hit-count threshold.

use tracing::info;

use super::band::ErrorMargin;
use super::builder::{PatternBuilder, ReferencePattern};
use crate::corpus::ReferenceCorpus;
use crate::error::{Result, SvadError};

/// Insertion-ordered collection of reference patterns.
///
/// `max_chunks`, `match_floor` and `match_ceiling` always describe the
/// pattern with the largest chunk count added so far. They are recomputed
/// only when a strictly larger count is observed.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    margin: ErrorMargin,
    patterns: Vec<ReferencePattern>,
    max_chunks: usize,
    match_floor: f64,
    match_ceiling: f64,
}

impl PatternRegistry {
    pub fn new(margin: ErrorMargin) -> Self {
        Self {
            margin,
            patterns: Vec::new(),
            max_chunks: 0,
            match_floor: 0.0,
            match_ceiling: 0.0,
        }
    }

    /// Build a registry from every reference in `corpus`.
    pub fn from_corpus(corpus: &dyn ReferenceCorpus, builder: &PatternBuilder) -> Result<Self> {
        let mut registry = Self::new(builder.margin());
        registry.load_all(corpus, builder)?;
        Ok(registry)
    }

    /// Insert `pattern`. A pattern with the same name is replaced in place,
    /// keeping its registration position.
    pub fn add(&mut self, pattern: ReferencePattern) {
        let chunk_count = pattern.chunk_count();
        match self.patterns.iter_mut().find(|p| p.name() == pattern.name()) {
            Some(existing) => *existing = pattern,
            None => self.patterns.push(pattern),
        }

        if chunk_count > self.max_chunks {
            let slack = self.margin.slack(chunk_count as f64);
            self.max_chunks = chunk_count;
            self.match_floor = chunk_count as f64 - slack;
            self.match_ceiling = chunk_count as f64 + slack;
        }
    }

    /// Build and add a pattern for every reference the corpus enumerates.
    ///
    /// Loading is all-or-nothing: the first failing reference aborts the
    /// load and its error is returned.
    ///
    /// # Errors
    /// `SvadError::NoReferencesFound` when the corpus is empty.
    pub fn load_all(&mut self, corpus: &dyn ReferenceCorpus, builder: &PatternBuilder) -> Result<usize> {
        info!(corpus = corpus.describe().as_str(), "loading reference patterns");
        let recordings = corpus.references()?;
        if recordings.is_empty() {
            return Err(SvadError::NoReferencesFound {
                location: corpus.describe(),
            });
        }

        let mut built = Vec::with_capacity(recordings.len());
        for recording in &recordings {
            info!(name = recording.name.as_str(), "loading reference");
            built.push(builder.build(recording)?);
        }

        let count = built.len();
        for pattern in built {
            self.add(pattern);
        }
        info!(
            patterns = count,
            max_chunks = self.max_chunks,
            match_floor = self.match_floor,
            match_ceiling = self.match_ceiling,
            "reference patterns loaded"
        );
        Ok(count)
    }

    /// Capacity the streaming window must have: the largest chunk count.
    pub fn capacity(&self) -> usize {
        self.max_chunks
    }

    pub fn match_floor(&self) -> f64 {
        self.match_floor
    }

    pub fn match_ceiling(&self) -> f64 {
        self.match_ceiling
    }

    pub fn margin(&self) -> ErrorMargin {
        self.margin
    }

    /// Whether a hit count lies within `[match_floor, match_ceiling]`.
    pub fn accepts(&self, hits: usize) -> bool {
        let hits = hits as f64;
        self.match_floor <= hits && hits <= self.match_ceiling
    }

    pub fn get(&self, name: &str) -> Option<&ReferencePattern> {
        self.patterns.iter().find(|p| p.name() == name)
    }

    /// Patterns in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ReferencePattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
