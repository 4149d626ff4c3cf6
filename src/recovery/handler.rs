// src/recovery/handler.rs

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::dag::task::TaskId;
use crate::exec::driver::{ActionDriver, ActionError, ActionFuture};

use super::backoff::RetryBackoff;
use super::classify::{ErrorKind, classify};
use super::metrics::RecoveryMetrics;
use super::strategy::{RecoveryStrategy, select_strategy};

/// Tuning knobs for a [`RecoveryHandler`].
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Retry count at which every failure aborts.
    pub max_retries: u32,
    /// Bound on each driver call made while recovering.
    pub timeout: Duration,
    pub backoff: RetryBackoff,
    pub retry_pause: Duration,
    pub scroll_pause: Duration,
    pub navigate_back_pause: Duration,
    /// Vertical scroll offset used by `scroll_and_retry`.
    pub scroll_distance: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(30),
            backoff: RetryBackoff::default(),
            retry_pause: Duration::from_millis(100),
            scroll_pause: Duration::from_millis(500),
            navigate_back_pause: Duration::from_secs(1),
            scroll_distance: 300,
        }
    }
}

impl RecoveryConfig {
    /// Same decisions as the default, but nothing sleeps.
    pub fn without_pauses() -> Self {
        Self {
            backoff: RetryBackoff::new(0.0, 2.0, 0.0).with_jitter(false),
            retry_pause: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            navigate_back_pause: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What the caller knows about a failure before it is classified.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorContext {
    pub kind: ErrorKind,
    pub message: String,
    pub trace: Option<String>,
    pub task_id: Option<TaskId>,
    pub action: Option<String>,
    pub retry_count: u32,
    pub strategy: Option<RecoveryStrategy>,
    pub timestamp: DateTime<Utc>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: String::new(),
            trace: None,
            task_id: None,
            action: None,
            retry_count: 0,
            strategy: None,
            timestamp: Utc::now(),
        }
    }
}

impl ErrorContext {
    pub fn for_task(task_id: impl Into<TaskId>, retry_count: u32) -> Self {
        Self {
            task_id: Some(task_id.into()),
            retry_count,
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}

/// Decision returned by [`RecoveryHandler::handle_error`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveryAction {
    pub strategy: RecoveryStrategy,
    pub can_recover: bool,
    pub retry_count: u32,
    pub reason: String,
}

/// Classifies failures, picks a strategy and performs its side effects
/// through the driver.
///
/// One handler can be shared by concurrently running tasks; metrics are
/// kept behind a mutex that is only locked between awaits.
pub struct RecoveryHandler<D: ActionDriver> {
    driver: Arc<D>,
    config: RecoveryConfig,
    metrics: Mutex<RecoveryMetrics>,
}

impl<D: ActionDriver> std::fmt::Debug for RecoveryHandler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: ActionDriver> RecoveryHandler<D> {
    pub fn new(driver: Arc<D>, config: RecoveryConfig) -> Self {
        Self {
            driver,
            config,
            metrics: Mutex::new(RecoveryMetrics::new()),
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Snapshot of the counters so far.
    pub fn get_metrics(&self) -> RecoveryMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_metrics(&self, update: impl FnOnce(&mut RecoveryMetrics)) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut metrics);
    }

    /// Classify `error`, choose a strategy and run it.
    ///
    /// Never fails: a strategy that cannot be carried out comes back as a
    /// non-recoverable `abort_task` with the reason attached.
    pub async fn handle_error(
        &self,
        error: &ActionError,
        context: Option<ErrorContext>,
    ) -> RecoveryAction {
        let started = Instant::now();

        let mut ctx = context.unwrap_or_default();
        ctx.kind = classify(error);
        ctx.message = error.to_string();
        ctx.trace = Some(format!("{error:?}"));
        ctx.timestamp = Utc::now();

        let strategy = select_strategy(ctx.kind, ctx.retry_count, self.config.max_retries);
        ctx.strategy = Some(strategy);

        debug!(
            task = ?ctx.task_id,
            action = ?ctx.action,
            kind = %ctx.kind,
            retry = ctx.retry_count,
            %strategy,
            "handling action failure"
        );

        self.update_metrics(|m| m.record_error(ctx.kind, strategy));

        if strategy == RecoveryStrategy::AbortTask {
            warn!(
                task = ?ctx.task_id,
                kind = %ctx.kind,
                max_retries = self.config.max_retries,
                "retry limit reached; aborting"
            );
            self.update_metrics(RecoveryMetrics::record_failure);
            return RecoveryAction {
                strategy,
                can_recover: false,
                retry_count: ctx.retry_count,
                reason: format!("max retries ({}) exceeded", self.config.max_retries),
            };
        }

        match self.execute_strategy(strategy, &ctx).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                self.update_metrics(|m| m.record_success(elapsed));
                info!(
                    task = ?ctx.task_id,
                    %strategy,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "recovery applied"
                );
                RecoveryAction {
                    strategy,
                    can_recover: true,
                    retry_count: ctx.retry_count.saturating_add(1),
                    reason: format!("{strategy} applied"),
                }
            }
            Err(reason) => {
                self.update_metrics(RecoveryMetrics::record_failure);
                error!(task = ?ctx.task_id, %strategy, %reason, "recovery failed");
                RecoveryAction {
                    strategy: RecoveryStrategy::AbortTask,
                    can_recover: false,
                    retry_count: ctx.retry_count,
                    reason,
                }
            }
        }
    }

    async fn execute_strategy(
        &self,
        strategy: RecoveryStrategy,
        ctx: &ErrorContext,
    ) -> Result<(), String> {
        match strategy {
            RecoveryStrategy::RetrySame => {
                tokio::time::sleep(self.config.retry_pause).await;
            }
            RecoveryStrategy::ScrollAndRetry => {
                self.bounded("scroll", self.driver.scroll(0, self.config.scroll_distance))
                    .await?;
                tokio::time::sleep(self.config.scroll_pause).await;
            }
            RecoveryStrategy::WaitAndRetry => {
                let delay = self.config.backoff.delay(ctx.retry_count);
                debug!(delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }
            RecoveryStrategy::NavigateBack => {
                self.bounded("go_back", self.driver.go_back()).await?;
                tokio::time::sleep(self.config.navigate_back_pause).await;
            }
            RecoveryStrategy::SkipAction => {}
            RecoveryStrategy::AbortTask => {
                return Err("abort_task has no recovery procedure".to_string());
            }
        }
        Ok(())
    }

    async fn bounded<T>(&self, op: &str, call: ActionFuture<'_, T>) -> Result<T, String> {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(format!("recovery step '{op}' failed: {err}")),
            Err(_) => Err(format!(
                "recovery step '{op}' timed out after {:.1}s",
                self.config.timeout.as_secs_f64()
            )),
        }
    }
}
