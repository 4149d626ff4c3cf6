// src/recovery/mod.rs

//! Failure classification and recovery.
//!
//! A failed driver call is classified into an [`ErrorKind`], a
//! [`RecoveryStrategy`] is picked from the retry count, and the
//! [`RecoveryHandler`] carries out the strategy's side effects.

pub mod backoff;
pub mod classify;
pub mod handler;
pub mod metrics;
pub mod strategy;

pub use backoff::RetryBackoff;
pub use classify::{ErrorKind, classify, classify_message};
pub use handler::{ErrorContext, RecoveryAction, RecoveryConfig, RecoveryHandler};
pub use metrics::RecoveryMetrics;
pub use strategy::{RecoveryStrategy, select_strategy};
