// src/recovery/metrics.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use super::classify::ErrorKind;
use super::strategy::RecoveryStrategy;

/// Running counters kept by a recovery handler across its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecoveryMetrics {
    pub total_errors: u64,
    pub errors_by_kind: BTreeMap<String, u64>,
    pub recovery_attempts: u64,
    pub recovery_successes: u64,
    pub failed_recoveries: u64,
    pub total_recovery_time_ms: f64,
    /// `recovery_successes / recovery_attempts`, 1.0 before any attempt.
    pub success_rate: f64,
    /// Mean latency of successful recoveries, 0.0 before any success.
    pub avg_recovery_time_ms: f64,
}

impl RecoveryMetrics {
    pub fn new() -> Self {
        Self {
            success_rate: 1.0,
            ..Self::default()
        }
    }

    /// Count an error. Aborts are not recovery attempts.
    pub fn record_error(&mut self, kind: ErrorKind, strategy: RecoveryStrategy) {
        self.total_errors += 1;
        *self
            .errors_by_kind
            .entry(kind.as_str().to_string())
            .or_insert(0) += 1;
        if strategy != RecoveryStrategy::AbortTask {
            self.recovery_attempts += 1;
        }
        self.refresh();
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.recovery_successes += 1;
        self.total_recovery_time_ms += elapsed.as_secs_f64() * 1000.0;
        self.refresh();
    }

    pub fn record_failure(&mut self) {
        self.failed_recoveries += 1;
        self.refresh();
    }

    fn refresh(&mut self) {
        self.success_rate = if self.recovery_attempts == 0 {
            1.0
        } else {
            self.recovery_successes as f64 / self.recovery_attempts as f64
        };
        self.avg_recovery_time_ms = if self.recovery_successes == 0 {
            0.0
        } else {
            self.total_recovery_time_ms / self.recovery_successes as f64
        };
    }
}
