//! Bounded FIFO of the most recent live chunk energies.

use std::collections::VecDeque;

use crate::error::{Result, SvadError};
use crate::pattern::{ChunkEnergy, PatternRegistry};

/// Fixed-capacity FIFO of live chunk energies.
///
/// Storage is allocated once at construction; `push` evicts the oldest
/// entry when full, so once saturated the window always holds exactly the
/// most recent `capacity` energies, oldest at index 0.
#[derive(Debug, Clone)]
pub struct StreamingWindow {
    energies: VecDeque<ChunkEnergy>,
    capacity: usize,
}

impl StreamingWindow {
    /// # Errors
    /// `SvadError::EmptyRegistry` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SvadError::EmptyRegistry);
        }
        Ok(Self {
            energies: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Window sized to the registry's largest pattern.
    pub fn for_registry(registry: &PatternRegistry) -> Result<Self> {
        Self::new(registry.capacity())
    }

    pub fn push(&mut self, energy: ChunkEnergy) {
        if self.energies.len() == self.capacity {
            self.energies.pop_front();
        }
        self.energies.push_back(energy);
    }

    pub fn is_full(&self) -> bool {
        self.energies.len() == self.capacity
    }

    pub fn at(&self, index: usize) -> Option<ChunkEnergy> {
        self.energies.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry; used when a detection run restarts.
    pub fn clear(&mut self) {
        self.energies.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = ChunkEnergy> + '_ {
        self.energies.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_empty_registry() {
        assert!(matches!(
            StreamingWindow::new(0).unwrap_err(),
            SvadError::EmptyRegistry
        ));
    }

    #[test]
    fn registry_without_patterns_cannot_size_window() {
        let registry = PatternRegistry::new(Default::default());
        assert!(matches!(
            StreamingWindow::for_registry(&registry).unwrap_err(),
            SvadError::EmptyRegistry
        ));
    }

    #[test]
    fn fills_then_saturates() {
        let mut window = StreamingWindow::new(3).unwrap();
        window.push(1.0);
        window.push(2.0);
        assert!(!window.is_full());
        assert_eq!(window.len(), 2);
        window.push(3.0);
        assert!(window.is_full());
        assert_eq!(window.at(3), None);
    }

    #[test]
    fn fifo_keeps_most_recent_values() {
        let capacity = 4;
        let mut window = StreamingWindow::new(capacity).unwrap();
        let values: Vec<f64> = (1..=11).map(f64::from).collect();
        for v in &values {
            window.push(*v);
        }
        let k = values.len();
        assert_eq!(window.len(), capacity);
        assert_eq!(window.at(0), Some(values[k - capacity]));
        assert_eq!(window.at(capacity - 1), Some(values[k - 1]));
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn clear_resets_for_a_new_run() {
        let mut window = StreamingWindow::new(2).unwrap();
        window.push(1.0);
        window.push(2.0);
        window.clear();
        assert!(window.is_empty());
        assert!(!window.is_full());
        assert_eq!(window.capacity(), 2);
    }
}
