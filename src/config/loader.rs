// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::Result;

/// Read a plan file and deserialize it without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlanFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let plan: RawPlanFile = toml::from_str(&contents)?;
    debug!(path = %path.display(), tasks = plan.task.len(), "parsed plan file");

    Ok(plan)
}

/// Load a plan file and validate it.
///
/// Checks that there is at least one task, that ids are unique, that every
/// dependency is declared before its dependent, and that settings are sane.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PlanFile> {
    let raw = load_from_path(&path)?;
    let plan = PlanFile::try_from(raw)?;
    Ok(plan)
}

/// `Flowdag.toml` in the current working directory.
pub fn default_plan_path() -> PathBuf {
    PathBuf::from("Flowdag.toml")
}
