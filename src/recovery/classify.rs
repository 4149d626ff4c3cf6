// src/recovery/classify.rs

use serde::Serialize;

use crate::exec::driver::ActionError;

/// Fixed taxonomy of action failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ElementNotFound,
    Timeout,
    NavigationFailed,
    ApiError,
    BrowserError,
    InvalidAction,
    #[default]
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ElementNotFound => "element_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NavigationFailed => "navigation_failed",
            ErrorKind::ApiError => "api_error",
            ErrorKind::BrowserError => "browser_error",
            ErrorKind::InvalidAction => "invalid_action",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const BROWSER_KEYWORDS: &[&str] = &["browser", "chromium", "firefox", "webkit"];

/// Map a failure to its kind. Typed variants map directly; untyped failures
/// go through [`classify_message`].
pub fn classify(error: &ActionError) -> ErrorKind {
    match error {
        ActionError::ElementNotFound(_) => ErrorKind::ElementNotFound,
        ActionError::Timeout(_) => ErrorKind::Timeout,
        ActionError::Navigation(_) => ErrorKind::NavigationFailed,
        ActionError::Api(_) => ErrorKind::ApiError,
        ActionError::Browser(_) => ErrorKind::BrowserError,
        ActionError::InvalidAction(_) => ErrorKind::InvalidAction,
        ActionError::Other(message) => classify_message(message),
    }
}

/// Case-insensitive keyword match on a failure message, first match wins:
/// timeout, navigation, api/network, then browser or an engine name.
pub fn classify_message(message: &str) -> ErrorKind {
    let text = message.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

    if mentions(&["timeout"]) {
        ErrorKind::Timeout
    } else if mentions(&["navigation", "navigate"]) {
        ErrorKind::NavigationFailed
    } else if mentions(&["api", "network"]) {
        ErrorKind::ApiError
    } else if mentions(BROWSER_KEYWORDS) {
        ErrorKind::BrowserError
    } else {
        ErrorKind::Unknown
    }
}
