// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{PlanFile, RawPlanFile, TaskConfig};
use crate::dag::graph::DependencyGraph;
use crate::dag::task::Task;
use crate::errors::{FlowdagError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = crate::errors::FlowdagError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.settings, raw.simulation, raw.task))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_tasks(plan)?;
    validate_settings(plan)?;
    validate_task_fields(plan)?;
    validate_task_dependencies(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn config_error(message: impl Into<String>) -> FlowdagError {
    FlowdagError::ConfigError(message.into())
}

fn ensure_has_tasks(plan: &RawPlanFile) -> Result<()> {
    if plan.task.is_empty() {
        return Err(config_error("plan must contain at least one [[task]] entry"));
    }
    Ok(())
}

fn validate_settings(plan: &RawPlanFile) -> Result<()> {
    let settings = &plan.settings;
    let backoff = &settings.backoff;

    if !(settings.recovery_timeout_secs.is_finite() && settings.recovery_timeout_secs > 0.0) {
        return Err(config_error(format!(
            "[settings].recovery_timeout_secs must be > 0 (got {})",
            settings.recovery_timeout_secs
        )));
    }
    if settings.poll_interval_ms == 0 {
        return Err(config_error("[settings].poll_interval_ms must be >= 1 (got 0)"));
    }
    if !(backoff.base.is_finite() && backoff.base >= 1.0) {
        return Err(config_error(format!(
            "[settings.backoff].base must be >= 1.0 (got {})",
            backoff.base
        )));
    }
    if !(backoff.initial_delay_secs.is_finite() && backoff.initial_delay_secs >= 0.0) {
        return Err(config_error(format!(
            "[settings.backoff].initial_delay_secs must be >= 0 (got {})",
            backoff.initial_delay_secs
        )));
    }
    if !(backoff.max_delay_secs.is_finite() && backoff.max_delay_secs >= backoff.initial_delay_secs)
    {
        return Err(config_error(format!(
            "[settings.backoff].max_delay_secs must be >= initial_delay_secs (got {} < {})",
            backoff.max_delay_secs, backoff.initial_delay_secs
        )));
    }
    Ok(())
}

fn validate_task_fields(plan: &RawPlanFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &plan.task {
        if task.id.trim().is_empty() {
            return Err(config_error("task id must not be empty"));
        }
        if !seen.insert(task.id.as_str()) {
            return Err(config_error(format!("duplicate task id '{}'", task.id)));
        }
        if let Some(secs) = task.timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(config_error(format!(
                    "task '{}' timeout_secs must be > 0 (got {secs})",
                    task.id
                )));
            }
        }
    }
    Ok(())
}

fn validate_task_dependencies(plan: &RawPlanFile) -> Result<()> {
    let ids: HashSet<&str> = plan.task.iter().map(|t| t.id.as_str()).collect();
    for task in &plan.task {
        for dep in task.upstream_ids() {
            if dep == task.id {
                return Err(config_error(format!(
                    "task '{}' cannot depend on itself",
                    task.id
                )));
            }
            if !ids.contains(dep) {
                return Err(config_error(format!(
                    "task '{}' has unknown dependency '{dep}'",
                    task.id
                )));
            }
        }
    }
    Ok(())
}

/// Build the graph the orchestrator will build, in declaration order.
fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    let tasks: Vec<Task> = plan.task.iter().map(TaskConfig::to_task).collect();

    let graph = DependencyGraph::from_tasks(&tasks).map_err(|err| match err {
        FlowdagError::MissingDependency { task, dependency } => config_error(format!(
            "task '{task}' depends on '{dependency}', which must be declared before it"
        )),
        other => other,
    })?;

    let cycles = graph.detect_cycles();
    if !cycles.is_empty() {
        return Err(FlowdagError::CyclicDependency { cycles });
    }
    Ok(())
}
