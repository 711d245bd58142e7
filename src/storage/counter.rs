//! Process-wide monotonic counter
//!
//! Shared by the hash generator and the embedded backend's auto-key suffix.
//! Lives inside [`StoreContext`](super::StoreContext) for the whole process.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MonotonicCounter {
    value: AtomicU64,
}

impl MonotonicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically increment and return the new value.
    #[inline]
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_next_strictly_increases() {
        let counter = MonotonicCounter::new();
        let a = counter.next();
        let b = counter.next();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn test_concurrent_increments_are_unique() {
        let counter = Arc::new(MonotonicCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || (0..1000).map(|_| counter.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "duplicate counter value {}", value);
            }
        }
        assert_eq!(seen.len(), 8000);
        assert_eq!(counter.current(), 8000);
    }
}
