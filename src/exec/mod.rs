// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`driver`] defines the `ActionDriver` trait every action goes through,
//!   and the `ActionError` it reports failures with.
//! - [`executor`] turns one task into driver calls and always produces a
//!   `TaskResult`, optionally retrying through a recovery handler.
//! - [`simulated`] is the in-memory driver used by the `flowdag` binary.

pub mod driver;
pub mod executor;
pub mod simulated;

pub use driver::{ActionDriver, ActionError, ActionFuture, ActionResult, ElementHandle};
pub use executor::TaskExecutor;
pub use simulated::{SimulatedDriver, SimulationConfig};
