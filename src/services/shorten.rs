//! Short hash generation
//!
//! `base62(xxh32("{nanos:x}:{url}:{counter:x}", seed))`
//!
//! Uniqueness comes from the input changing on every call (time + counter);
//! the hash only has to be cheap and spread well. The generator never looks
//! at the store, collisions are handled by the insert workflow.

use std::sync::Arc;

use chrono::Utc;
use xxhash_rust::xxh32::xxh32;

use crate::storage::MonotonicCounter;
use crate::utils::encode_base62;

#[derive(Debug, Clone)]
pub struct HashGenerator {
    seed: u32,
    counter: Arc<MonotonicCounter>,
}

impl HashGenerator {
    pub fn new(seed: u32, counter: Arc<MonotonicCounter>) -> Self {
        Self { seed, counter }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Generate a short hash for `url` at the current time.
    pub fn generate(&self, url: &str) -> String {
        let nanos = Utc::now()
            .timestamp_nanos_opt()
            .map(|n| n as u64)
            .unwrap_or_default();
        self.generate_at(url, nanos)
    }

    /// Generate with a caller-supplied clock reading.
    pub fn generate_at(&self, url: &str, nanos: u64) -> String {
        let count = self.counter.next();
        encode_base62(hash_input(url, nanos, count, self.seed))
    }
}

fn hash_input(url: &str, nanos: u64, count: u64, seed: u32) -> u32 {
    let input = format!("{:x}:{}:{:x}", nanos, url, count);
    xxh32(input.as_bytes(), seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn generator() -> HashGenerator {
        HashGenerator::new(0x5eed, Arc::new(MonotonicCounter::new()))
    }

    #[test]
    fn test_frozen_clock_still_differs() {
        let generator = generator();
        let a = generator.generate_at("https://example.com", 42);
        let b = generator.generate_at("https://example.com", 42);
        assert_ne!(a, b);
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let a = HashGenerator::new(7, Arc::new(MonotonicCounter::new()));
        let b = HashGenerator::new(7, Arc::new(MonotonicCounter::new()));
        assert_eq!(
            a.generate_at("https://example.com", 1),
            b.generate_at("https://example.com", 1)
        );

        let other_seed = HashGenerator::new(8, Arc::new(MonotonicCounter::new()));
        assert_ne!(
            a.generate_at("https://example.com/x", 1),
            other_seed.generate_at("https://example.com/x", 1)
        );
    }

    #[test]
    fn test_collision_rate_for_distinct_urls() {
        let generator = generator();
        let mut seen = HashSet::new();
        let mut collisions = 0;
        for i in 0..10_000 {
            let hash = generator.generate(&format!("https://example.com/page/{}", i));
            if !seen.insert(hash) {
                collisions += 1;
            }
        }
        // ≤ 0.2%
        assert!(collisions <= 20, "{} collisions", collisions);
    }

    #[test]
    fn test_output_is_base62_without_padding() {
        let generator = generator();
        for i in 0..1000 {
            let hash = generator.generate_at("u", i);
            assert!(!hash.is_empty() && hash.len() <= 6);
            assert!(hash.chars().all(|c| c.is_ascii_alphanumeric()));
            assert!(hash == "0" || !hash.starts_with('0'));
        }
    }

    #[test]
    fn test_shares_counter() {
        let counter = Arc::new(MonotonicCounter::new());
        let generator = HashGenerator::new(1, counter.clone());
        generator.generate("a");
        generator.generate("b");
        assert_eq!(counter.current(), 2);
    }
}
