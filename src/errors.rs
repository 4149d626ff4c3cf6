// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Dependency task '{dependency}' not found (required by '{task}')")]
    MissingDependency { task: String, dependency: String },

    #[error("Cyclic dependencies detected: {}", format_cycles(.cycles))]
    CyclicDependency { cycles: Vec<Vec<String>> },

    #[error("Task deadlock: no task is ready but {} remain pending: {pending:?}", .pending.len())]
    Deadlock { pending: Vec<String> },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowdagError>;
