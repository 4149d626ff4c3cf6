// src/dag/task.rs

//! Task definitions and per-task results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::types::{DependencyKind, TaskPriority, TaskStatus, TaskType};

/// Canonical task identifier type used throughout the crate.
pub type TaskId = String;

/// Default retry budget for a task.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Default per-task timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Edge from an upstream task to the task that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub task_id: TaskId,
    pub kind: DependencyKind,
    /// Only meaningful for [`DependencyKind::Conditional`]; carried through
    /// for outer layers, never evaluated by the scheduler.
    pub condition: Option<String>,
}

impl Dependency {
    pub fn new(task_id: impl Into<TaskId>, kind: DependencyKind) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            condition: None,
        }
    }

    pub fn sequential(task_id: impl Into<TaskId>) -> Self {
        Self::new(task_id, DependencyKind::Sequential)
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

/// A declared unit of work. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub description: String,
    /// Free-form parameters interpreted by the executor per task type
    /// (`url`, `selector`, `value`, `condition`, `timeout`).
    pub parameters: Map<String, Value>,
    pub dependencies: Vec<Dependency>,
    /// How many recovery retries the executor may spend on this task.
    pub retry_budget: u32,
    pub timeout: Duration,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            task_type,
            priority: TaskPriority::default(),
            description: String::new(),
            parameters: Map::new(),
            dependencies: Vec::new(),
            retry_budget: DEFAULT_RETRY_BUDGET,
            timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Add a sequential dependency on `upstream`.
    pub fn after(self, upstream: impl Into<TaskId>) -> Self {
        self.with_dependency(Dependency::sequential(upstream))
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// String parameter lookup; `None` if missing or not a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    /// Upstream ids in declaration order.
    pub fn upstream_ids(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.task_id.as_str())
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Task({}, {}, {})", self.id, self.task_type, self.priority)
    }
}

/// Outcome of one task in one run. Created once, never mutated after it
/// is stored by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "execution_time_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub retry_attempts: u32,
}

impl TaskResult {
    pub fn success(task_id: impl Into<TaskId>, output: Value, duration: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Success,
            success: true,
            output: Some(output),
            error: None,
            duration,
            timestamp: Utc::now(),
            retry_attempts: 0,
        }
    }

    pub fn failure(task_id: impl Into<TaskId>, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Failed,
            success: false,
            output: None,
            error: Some(error.into()),
            duration,
            timestamp: Utc::now(),
            retry_attempts: 0,
        }
    }

    /// Result for a task that never ran because `upstream` failed.
    pub fn blocked(task_id: impl Into<TaskId>, upstream: &str) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Blocked,
            success: false,
            output: None,
            error: Some(format!("blocked by failed dependency '{upstream}'")),
            duration: Duration::ZERO,
            timestamp: Utc::now(),
            retry_attempts: 0,
        }
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn execution_time_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}
