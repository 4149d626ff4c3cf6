// src/engine/metrics.rs

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;

use crate::dag::task::{Task, TaskId, TaskResult};

/// Run-level aggregate computed by the orchestrator once a run ends.
///
/// Status counts cover every submitted task; tasks without a result are
/// counted as `pending`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub pending_tasks: usize,
    pub tasks_by_type: BTreeMap<String, usize>,
    pub tasks_by_priority: BTreeMap<String, usize>,
    pub tasks_by_status: BTreeMap<String, usize>,
    /// `completed_tasks / total_tasks`, 0.0 for an empty run.
    pub success_rate: f64,
    /// Mean execution time over tasks that produced a result.
    pub avg_task_time_ms: f64,
    pub critical_failures: usize,
    pub retries_used: u64,
    pub total_time_ms: f64,
}

impl TaskMetrics {
    pub(crate) fn aggregate(
        tasks: &[Task],
        results: &HashMap<TaskId, TaskResult>,
        critical_failures: usize,
        total_time: Duration,
    ) -> Self {
        let mut metrics = TaskMetrics {
            total_tasks: tasks.len(),
            critical_failures,
            total_time_ms: total_time.as_secs_f64() * 1000.0,
            ..TaskMetrics::default()
        };

        let mut time_ms = 0.0;
        for task in tasks {
            *metrics
                .tasks_by_type
                .entry(task.task_type.as_str().to_string())
                .or_insert(0) += 1;
            *metrics
                .tasks_by_priority
                .entry(task.priority.as_str().to_string())
                .or_insert(0) += 1;

            let status = match results.get(&task.id) {
                Some(result) => {
                    if result.success {
                        metrics.completed_tasks += 1;
                    } else {
                        metrics.failed_tasks += 1;
                    }
                    metrics.retries_used += u64::from(result.retry_attempts);
                    time_ms += result.execution_time_ms();
                    result.status.as_str()
                }
                None => {
                    metrics.pending_tasks += 1;
                    "pending"
                }
            };
            *metrics
                .tasks_by_status
                .entry(status.to_string())
                .or_insert(0) += 1;
        }

        let finished = metrics.completed_tasks + metrics.failed_tasks;
        if finished > 0 {
            metrics.avg_task_time_ms = time_ms / finished as f64;
        }
        if metrics.total_tasks > 0 {
            metrics.success_rate = metrics.completed_tasks as f64 / metrics.total_tasks as f64;
        }

        metrics
    }
}
