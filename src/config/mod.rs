// src/config/mod.rs

//! Plan file loading and validation.
//!
//! - `model.rs`: TOML-backed data model and conversion into tasks.
//! - `loader.rs`: reading a plan file from disk.
//! - `validate.rs`: settings sanity and graph correctness.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_plan_path, load_and_validate, load_from_path};
pub use model::{DependencyConfig, PlanFile, RawPlanFile, SettingsSection, TaskConfig};
