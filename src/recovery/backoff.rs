// src/recovery/backoff.rs

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Maximum relative jitter applied to a wait time.
pub const JITTER_FRACTION: f64 = 0.2;

/// Exponential backoff with an optional ±20% jitter.
///
/// Also the `[settings.backoff]` section of a plan file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryBackoff {
    pub initial_delay_secs: f64,
    pub max_delay_secs: f64,
    pub base: f64,
    pub jitter: bool,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial_delay_secs: 0.1,
            max_delay_secs: 30.0,
            base: 2.0,
            jitter: true,
        }
    }
}

impl RetryBackoff {
    pub fn new(initial_delay_secs: f64, base: f64, max_delay_secs: f64) -> Self {
        Self {
            initial_delay_secs,
            max_delay_secs,
            base,
            jitter: true,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait in seconds before retry number `retry_count` (0-based):
    /// `min(initial * base^retry_count, max)`, jittered when enabled and
    /// never negative.
    pub fn wait_time(&self, retry_count: u32) -> f64 {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let raw = if self.initial_delay_secs <= 0.0 {
            0.0
        } else {
            self.initial_delay_secs * self.base.powi(exponent)
        };

        let mut wait = raw.min(self.max_delay_secs).max(0.0);
        if self.jitter && wait > 0.0 {
            let spread = wait * JITTER_FRACTION;
            wait += rand::thread_rng().gen_range(-spread..=spread);
        }
        wait.max(0.0)
    }

    pub fn delay(&self, retry_count: u32) -> Duration {
        Duration::try_from_secs_f64(self.wait_time(retry_count)).unwrap_or(Duration::MAX)
    }
}
