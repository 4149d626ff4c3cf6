// src/engine/mod.rs

//! Orchestration engine.
//!
//! [`orchestrator`] runs a task set over its dependency graph, one ready
//! frontier at a time; [`metrics`] holds the aggregate reported at the end of
//! a run.

pub mod metrics;
pub mod orchestrator;

pub use metrics::TaskMetrics;
pub use orchestrator::{Orchestrator, OrchestratorConfig};
