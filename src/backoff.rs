//! Poll rescheduling delays with exponential growth, a ceiling, and jitter
//!
//! Capping delay growth avoids retry storms against the export service;
//! jitter avoids synchronized bursts when several tasks poll concurrently.
//!
//! # Example
//!
//! ```
//! use export_tracker::backoff::Backoff;
//! use export_tracker::config::BackoffConfig;
//!
//! let mut backoff = Backoff::new(BackoffConfig::default());
//! let delay = backoff.next_delay();
//! assert!(delay.as_millis() >= 1000);
//! backoff.reset();
//! ```

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Generates successive poll delays
///
/// Each call to [`next_delay`](Backoff::next_delay) grows the delay
/// exponentially from the floor toward the ceiling and adds a symmetric
/// random jitter term. The only state is the internal attempt counter.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Create a generator starting at the floor delay.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// The delay to wait before the next attempt.
    ///
    /// Computed as `min(ceiling, floor * growth^attempt)`, after which the
    /// attempt counter is incremented and a jitter term of up to
    /// `jitter_ratio` of the computed delay is added in either direction.
    /// The result never drops below the floor delay.
    pub fn next_delay(&mut self) -> Duration {
        let floor = self.config.min_delay.as_millis() as f64;
        let ceiling = self.config.max_delay.as_millis() as f64;

        let raw = (floor * self.config.growth_factor.powi(self.attempt as i32)).min(ceiling);
        self.attempt += 1;

        let mut rng = rand::thread_rng();
        let unit: f64 = rng.gen_range(-1.0..=1.0);
        let jitter = (raw * self.config.jitter_ratio * unit).round();

        let delay_ms = (raw + jitter).max(floor);
        Duration::from_millis(delay_ms as u64)
    }

    /// Restart the growth sequence from the floor delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
