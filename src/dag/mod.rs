// src/dag/mod.rs

//! Task model and dependency graph.
//!
//! - [`task`] holds task definitions, dependencies and per-task results.
//! - [`graph`] holds the id-keyed dependency graph: validation, ready sets,
//!   cycle detection and topological order.

pub mod graph;
pub mod task;

pub use graph::DependencyGraph;
pub use task::{Dependency, Task, TaskId, TaskResult};
