// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::dag::task::{DEFAULT_RETRY_BUDGET, DEFAULT_TASK_TIMEOUT, Dependency, Task};
use crate::engine::OrchestratorConfig;
use crate::exec::SimulationConfig;
use crate::recovery::{RecoveryConfig, RetryBackoff};
use crate::types::{DependencyKind, FailurePolicy, TaskPriority, TaskType};

/// Plan file as read from TOML, before validation.
///
/// ```toml
/// [settings]
/// max_retries = 3
/// failure_policy = "block_dependents"
///
/// [simulation]
/// missing_selectors = ["#gone"]
///
/// [[task]]
/// id = "open"
/// type = "navigate"
/// params = { url = "https://example.com" }
///
/// [[task]]
/// id = "login"
/// type = "click_element"
/// params = { selector = "#login" }
/// after = ["open"]
/// ```
///
/// Every section is optional except at least one `[[task]]`, which
/// validation enforces.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Tasks in declaration order. Upstream tasks must come first.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// Validated plan file.
///
/// Only obtainable through `TryFrom<RawPlanFile>`, so holding one means the
/// tasks form a valid acyclic graph.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub settings: SettingsSection,
    pub simulation: SimulationConfig,
    pub task: Vec<TaskConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        settings: SettingsSection,
        simulation: SimulationConfig,
        task: Vec<TaskConfig>,
    ) -> Self {
        Self {
            settings,
            simulation,
            task,
        }
    }

    /// Tasks in declaration order, ready to hand to the orchestrator.
    pub fn tasks(&self) -> Vec<Task> {
        self.task.iter().map(TaskConfig::to_task).collect()
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_retries: self.settings.max_retries,
            timeout: secs_or(self.settings.recovery_timeout_secs, Duration::from_secs(30)),
            backoff: self.settings.backoff.clone(),
            ..RecoveryConfig::default()
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            failure_policy: self.settings.failure_policy,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }
}

/// `[settings]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Retry count at which recovery gives up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Bound on each driver call made while recovering.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: f64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Retry failed actions through the recovery handler.
    #[serde(default = "default_use_recovery")]
    pub use_recovery: bool,

    /// Polling interval for `wait_for_condition` tasks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub backoff: RetryBackoff,
}

fn default_max_retries() -> u32 {
    3
}

fn default_recovery_timeout_secs() -> f64 {
    30.0
}

fn default_use_recovery() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            failure_policy: FailurePolicy::default(),
            use_recovery: default_use_recovery(),
            poll_interval_ms: default_poll_interval_ms(),
            backoff: RetryBackoff::default(),
        }
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default)]
    pub description: String,

    /// Type-specific parameters (`url`, `selector`, `value`, ...).
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Shorthand for sequential dependencies.
    #[serde(default)]
    pub after: Vec<String>,

    /// Dependencies with an explicit relation kind.
    #[serde(default)]
    pub depends_on: Vec<DependencyConfig>,

    /// Retry budget; defaults to 3.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Per-task timeout; defaults to 30 s.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

/// Entry of `depends_on`.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub task: String,

    #[serde(default)]
    pub kind: DependencyKind,

    #[serde(default)]
    pub condition: Option<String>,
}

impl TaskConfig {
    /// Upstream ids from both `after` and `depends_on`.
    pub fn upstream_ids(&self) -> impl Iterator<Item = &str> {
        self.after
            .iter()
            .map(String::as_str)
            .chain(self.depends_on.iter().map(|d| d.task.as_str()))
    }

    pub fn to_task(&self) -> Task {
        let mut task = Task::new(self.id.clone(), self.task_type)
            .with_priority(self.priority)
            .with_description(self.description.clone())
            .with_retry_budget(self.retries.unwrap_or(DEFAULT_RETRY_BUDGET))
            .with_timeout(
                self.timeout_secs
                    .map_or(DEFAULT_TASK_TIMEOUT, |secs| secs_or(secs, DEFAULT_TASK_TIMEOUT)),
            );
        task.parameters = self.params.clone();

        for upstream in &self.after {
            task = task.after(upstream.clone());
        }
        for dep in &self.depends_on {
            let mut dependency = Dependency::new(dep.task.clone(), dep.kind);
            if let Some(condition) = &dep.condition {
                dependency = dependency.with_condition(condition.clone());
            }
            task = task.with_dependency(dependency);
        }
        task
    }
}

fn secs_or(secs: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(fallback)
}
