// src/exec/driver.rs

//! Pluggable action driver abstraction.
//!
//! The executor and the recovery handler talk to an `ActionDriver` instead of
//! a concrete browser. This keeps the orchestration core independent of the
//! automation engine and makes it easy to swap in a scripted driver in tests.
//!
//! - [`SimulatedDriver`](super::simulated::SimulatedDriver) is the in-crate
//!   implementation used by the `flowdag` binary.
//! - Tests provide their own `ActionDriver` that records calls and injects
//!   failures.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Failure raised by an [`ActionDriver`].
///
/// The variant is the failure's concrete type: error classification matches
/// on it first and only falls back to the message text for [`Other`].
///
/// [`Other`]: ActionError::Other
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("{0}")]
    Other(String),
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Boxed future returned by every driver operation.
pub type ActionFuture<'a, T> = Pin<Box<dyn Future<Output = ActionResult<T>> + Send + 'a>>;

/// Opaque reference to an element located by [`ActionDriver::find`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    pub selector: String,
}

impl ElementHandle {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

/// Narrow action interface consumed by the executor and the recovery
/// handler. Every operation may suspend on I/O.
pub trait ActionDriver: Send + Sync {
    /// Load `url` in the current page.
    fn navigate<'a>(&'a self, url: &'a str) -> ActionFuture<'a, ()>;

    /// Locate an element; `Ok(None)` when nothing matches.
    fn find<'a>(&'a self, selector: &'a str) -> ActionFuture<'a, Option<ElementHandle>>;

    fn click<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()>;

    fn fill<'a>(&'a self, element: &'a ElementHandle, text: &'a str) -> ActionFuture<'a, ()>;

    fn clear<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()>;

    fn scroll_into_view<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, ()>;

    /// Visible text content of an element.
    fn text<'a>(&'a self, element: &'a ElementHandle) -> ActionFuture<'a, String>;

    /// Scroll the page by the given offsets.
    fn scroll(&self, dx: i64, dy: i64) -> ActionFuture<'_, ()>;

    /// Go back one entry in the page history.
    fn go_back(&self) -> ActionFuture<'_, ()>;

    fn current_url(&self) -> ActionFuture<'_, String>;

    fn wait(&self, duration: Duration) -> ActionFuture<'_, ()>;
}
