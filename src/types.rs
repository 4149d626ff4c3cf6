use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of task kinds understood by the orchestrator.
///
/// Only the first five are dispatched directly by the task executor; the
/// structural kinds (`ConditionalBranch`, `LoopTask`, `CompositeTask`) are
/// expected to be expanded by an outer layer before a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Navigate,
    FillForm,
    ClickElement,
    ExtractData,
    WaitForCondition,
    ConditionalBranch,
    LoopTask,
    CompositeTask,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Navigate => "navigate",
            TaskType::FillForm => "fill_form",
            TaskType::ClickElement => "click_element",
            TaskType::ExtractData => "extract_data",
            TaskType::WaitForCondition => "wait_for_condition",
            TaskType::ConditionalBranch => "conditional_branch",
            TaskType::LoopTask => "loop_task",
            TaskType::CompositeTask => "composite_task",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "navigate" => Ok(TaskType::Navigate),
            "fill_form" => Ok(TaskType::FillForm),
            "click_element" => Ok(TaskType::ClickElement),
            "extract_data" => Ok(TaskType::ExtractData),
            "wait_for_condition" => Ok(TaskType::WaitForCondition),
            "conditional_branch" => Ok(TaskType::ConditionalBranch),
            "loop_task" => Ok(TaskType::LoopTask),
            "composite_task" => Ok(TaskType::CompositeTask),
            other => Err(format!("invalid task type: {other}")),
        }
    }
}

/// Task priority. Ordering follows urgency: `Critical > High > Normal`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Normal,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!(
                "invalid priority: {other} (expected \"normal\", \"high\" or \"critical\")"
            )),
        }
    }
}

/// Execution status carried on a task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    /// Never executed because an upstream task failed.
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a task relates to one of its upstream tasks.
///
/// Readiness treats every kind the same way: the upstream must have
/// completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    Sequential,
    Parallel,
    Conditional,
    WaitFor,
}

/// What the orchestrator does with the dependents of a failed task.
///
/// - `LeaveUntilDeadlock` (default): dependents stay pending; once nothing
///   else can run the run aborts with a deadlock error naming them.
/// - `BlockDependents`: dependents are immediately given a `blocked` result
///   and the run carries on with unrelated tasks. A blocked critical task
///   counts toward `critical_failures`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    LeaveUntilDeadlock,
    BlockDependents,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "leave_until_deadlock" => Ok(FailurePolicy::LeaveUntilDeadlock),
            "block_dependents" => Ok(FailurePolicy::BlockDependents),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"leave_until_deadlock\" or \"block_dependents\")"
            )),
        }
    }
}
