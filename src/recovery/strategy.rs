// src/recovery/strategy.rs

use serde::Serialize;

use super::classify::ErrorKind;

/// Remediation applied after a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    RetrySame,
    ScrollAndRetry,
    WaitAndRetry,
    NavigateBack,
    SkipAction,
    AbortTask,
}

impl RecoveryStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStrategy::RetrySame => "retry_same",
            RecoveryStrategy::ScrollAndRetry => "scroll_and_retry",
            RecoveryStrategy::WaitAndRetry => "wait_and_retry",
            RecoveryStrategy::NavigateBack => "navigate_back",
            RecoveryStrategy::SkipAction => "skip_action",
            RecoveryStrategy::AbortTask => "abort_task",
        }
    }

    /// Whether the failed action should be attempted again after this
    /// strategy ran.
    pub fn retries_action(&self) -> bool {
        matches!(
            self,
            RecoveryStrategy::RetrySame
                | RecoveryStrategy::ScrollAndRetry
                | RecoveryStrategy::WaitAndRetry
                | RecoveryStrategy::NavigateBack
        )
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a strategy for `kind` given how many retries were already spent.
///
/// Once `retry_count >= max_retries` the answer is always
/// [`RecoveryStrategy::AbortTask`].
pub fn select_strategy(kind: ErrorKind, retry_count: u32, max_retries: u32) -> RecoveryStrategy {
    if retry_count >= max_retries {
        return RecoveryStrategy::AbortTask;
    }

    match kind {
        ErrorKind::ElementNotFound if retry_count == 0 => RecoveryStrategy::ScrollAndRetry,
        ErrorKind::ElementNotFound if retry_count == 1 => RecoveryStrategy::WaitAndRetry,
        ErrorKind::ElementNotFound => RecoveryStrategy::SkipAction,
        ErrorKind::Timeout if retry_count < 2 => RecoveryStrategy::WaitAndRetry,
        ErrorKind::Timeout => RecoveryStrategy::SkipAction,
        ErrorKind::ApiError => RecoveryStrategy::WaitAndRetry,
        ErrorKind::NavigationFailed => RecoveryStrategy::NavigateBack,
        ErrorKind::InvalidAction => RecoveryStrategy::SkipAction,
        ErrorKind::BrowserError | ErrorKind::Unknown => RecoveryStrategy::RetrySame,
    }
}
