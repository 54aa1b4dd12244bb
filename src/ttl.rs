//! Randomized cache expiry, so entries written together do not all expire
//! together.

use std::time::Duration;

use rand::Rng;

use crate::config::TtlRange;

/// Source of the random fraction used to place a TTL inside its range.
pub trait TtlJitter: Send + Sync {
    /// Returns a value in `[0, 1]`.
    fn fraction(&self) -> f64;
}

/// Uniformly random jitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl TtlJitter for RandomJitter {
    fn fraction(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..=1.0)
    }
}

/// Always returns the same fraction.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl TtlJitter for FixedJitter {
    fn fraction(&self) -> f64 {
        self.0
    }
}

/// Picks `min + fraction * (max - min)` seconds.
pub fn ttl_within(range: TtlRange, jitter: &dyn TtlJitter) -> Duration {
    let fraction = jitter.fraction().clamp(0.0, 1.0);
    let spread = range.max_secs.saturating_sub(range.min_secs) as f64;
    Duration::from_secs(range.min_secs + (fraction * spread).round() as u64)
}
