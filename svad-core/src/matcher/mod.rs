//! Window-versus-pattern comparison.
//!
//! ## Algorithm
//!
//! For a pattern `P` and a saturated window `W`:
//!
//! 1. `hits` = number of indices `i < min(P.chunk_count, W.len())` where
//!    `W[i]` lies inside `P.band(i)` (inclusive).
//! 2. The pattern matches when `match_floor <= hits <= match_ceiling`, the
//!    registry-wide threshold derived from the largest pattern.
//!
//! Index 0 is the oldest live chunk, aligned with the first reference chunk.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffering::StreamingWindow;
use crate::pattern::{PatternRegistry, ReferencePattern};

/// Which patterns get a say in the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Only the first registered pattern is evaluated; its verdict is final.
    FirstReference,
    /// Patterns are evaluated in registration order; the first one that
    /// clears the threshold wins.
    #[default]
    AnyReference,
}

impl std::str::FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "first-reference" => Ok(Self::FirstReference),
            "any" | "any-reference" => Ok(Self::AnyReference),
            other => Err(format!("unknown match policy: {other}")),
        }
    }
}

/// Outcome of one evaluation of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchVerdict {
    pub matched: bool,
    /// Pattern the verdict was decided on (the matching one when `matched`).
    pub pattern: Option<String>,
    /// Hits counted for `pattern`.
    pub hits: usize,
}

impl MatchVerdict {
    fn no_match() -> Self {
        Self {
            matched: false,
            pattern: None,
            hits: 0,
        }
    }
}

/// Number of window positions that fall inside the pattern's bands.
pub fn count_hits(window: &StreamingWindow, pattern: &ReferencePattern) -> usize {
    let span = pattern.chunk_count().min(window.len());
    (0..span)
        .filter(|&i| match (window.at(i), pattern.band(i)) {
            (Some(energy), Some(band)) => band.contains(energy),
            _ => false,
        })
        .count()
}

/// Decides match / no match for a saturated window.
#[derive(Debug, Clone, Copy, Default)]
pub struct Matcher {
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// Evaluate `window` against `registry`.
    ///
    /// A window that is not yet full never matches.
    pub fn evaluate(&self, window: &StreamingWindow, registry: &PatternRegistry) -> MatchVerdict {
        if !window.is_full() {
            return MatchVerdict::no_match();
        }

        let mut last = MatchVerdict::no_match();
        for pattern in registry.iter() {
            let hits = count_hits(window, pattern);
            let matched = registry.accepts(hits);
            debug!(pattern = pattern.name(), hits, matched, "pattern evaluated");

            last = MatchVerdict {
                matched,
                pattern: Some(pattern.name().to_string()),
                hits,
            };
            if matched || self.policy == MatchPolicy::FirstReference {
                return last;
            }
        }
        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{ErrorMargin, ToleranceBand};

    fn margin(pct: f64) -> ErrorMargin {
        ErrorMargin::new(pct).unwrap()
    }

    fn pattern(name: &str, centers: &[f64], pct: f64) -> ReferencePattern {
        ReferencePattern::new(
            name,
            centers
                .iter()
                .map(|c| ToleranceBand::new(*c, margin(pct)))
                .collect(),
        )
    }

    fn window_of(values: &[f64], capacity: usize) -> StreamingWindow {
        let mut window = StreamingWindow::new(capacity).unwrap();
        for v in values {
            window.push(*v);
        }
        window
    }

    #[test]
    fn exact_replay_hits_every_chunk() {
        let centers = [3.0, 8.0, 1.5, 9.0, 4.0, 4.0];
        for pct in [0.0, 5.0, 50.0] {
            let mut registry = PatternRegistry::new(margin(pct));
            registry.add(pattern("ref", &centers, pct));
            let window = window_of(&centers, registry.capacity());

            let verdict = Matcher::default().evaluate(&window, &registry);
            assert_eq!(verdict.hits, centers.len(), "pct={pct}");
            assert!(verdict.matched, "pct={pct}");
            assert_eq!(verdict.pattern.as_deref(), Some("ref"));
        }
    }

    #[test]
    fn silence_never_matches_non_silent_reference() {
        let centers = [2.0, 5.0, 7.0, 1.0];
        for pct in [0.0, 25.0, 99.0] {
            let mut registry = PatternRegistry::new(margin(pct));
            registry.add(pattern("ref", &centers, pct));
            let window = window_of(&[0.0; 4], 4);

            let verdict = Matcher::default().evaluate(&window, &registry);
            assert_eq!(verdict.hits, 0);
            assert!(!verdict.matched);
        }
    }

    #[test]
    fn unsaturated_window_is_not_evaluated() {
        let mut registry = PatternRegistry::new(margin(50.0));
        registry.add(pattern("ref", &[1.0, 1.0, 1.0], 50.0));
        let window = window_of(&[1.0, 1.0], 3);
        assert_eq!(Matcher::default().evaluate(&window, &registry), MatchVerdict::no_match());
    }

    #[test]
    fn hit_count_must_reach_floor() {
        let mut registry = PatternRegistry::new(margin(20.0));
        registry.add(pattern("ref", &[10.0; 10], 20.0));
        // floor = 8: seven in-band chunks are not enough, eight are.
        let mut values = vec![10.0; 7];
        values.extend([100.0; 3]);
        let window = window_of(&values, 10);
        let verdict = Matcher::default().evaluate(&window, &registry);
        assert_eq!(verdict.hits, 7);
        assert!(!verdict.matched);

        let mut values = vec![10.0; 8];
        values.extend([100.0; 2]);
        let window = window_of(&values, 10);
        assert!(Matcher::default().evaluate(&window, &registry).matched);
    }

    #[test]
    fn shorter_pattern_compares_against_oldest_chunks() {
        let mut registry = PatternRegistry::new(margin(50.0));
        registry.add(pattern("long", &[100.0; 4], 50.0));
        registry.add(pattern("short", &[1.0, 2.0], 50.0));
        let window = window_of(&[1.0, 2.0, 0.0, 0.0], 4);

        let short = registry.get("short").unwrap();
        assert_eq!(count_hits(&window, short), 2);
    }

    #[test]
    fn first_reference_policy_ignores_later_patterns() {
        let mut registry = PatternRegistry::new(margin(10.0));
        registry.add(pattern("first", &[50.0; 4], 10.0));
        registry.add(pattern("second", &[5.0; 4], 10.0));
        let window = window_of(&[5.0; 4], 4);

        let literal = Matcher::new(MatchPolicy::FirstReference).evaluate(&window, &registry);
        assert!(!literal.matched);
        assert_eq!(literal.pattern.as_deref(), Some("first"));

        let any = Matcher::new(MatchPolicy::AnyReference).evaluate(&window, &registry);
        assert!(any.matched);
        assert_eq!(any.pattern.as_deref(), Some("second"));
        assert_eq!(any.hits, 4);
    }

    #[test]
    fn policy_parses_from_cli_spelling() {
        assert_eq!("first".parse::<MatchPolicy>().unwrap(), MatchPolicy::FirstReference);
        assert_eq!("Any-Reference".parse::<MatchPolicy>().unwrap(), MatchPolicy::AnyReference);
        assert!("all".parse::<MatchPolicy>().is_err());
    }
}
