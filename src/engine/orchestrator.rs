// src/engine/orchestrator.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::task::{Task, TaskId, TaskResult};
use crate::errors::{FlowdagError, Result};
use crate::exec::driver::ActionDriver;
use crate::exec::executor::TaskExecutor;
use crate::types::{FailurePolicy, TaskPriority};

use super::metrics::TaskMetrics;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorConfig {
    pub failure_policy: FailurePolicy,
}

/// Drives a run: builds the graph, dispatches each ready frontier
/// concurrently and folds the results until every task is settled.
pub struct Orchestrator<D: ActionDriver> {
    executor: Arc<TaskExecutor<D>>,
    config: OrchestratorConfig,
    results: HashMap<TaskId, TaskResult>,
    metrics: TaskMetrics,
    runs: u64,
}

/// Per-run bookkeeping, touched only between batches.
#[derive(Debug, Default)]
struct RunState {
    completed: HashSet<TaskId>,
    failed: HashSet<TaskId>,
    critical_failures: usize,
}

impl RunState {
    fn settled(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    fn is_settled(&self, id: &str) -> bool {
        self.completed.contains(id) || self.failed.contains(id)
    }
}

impl<D: ActionDriver + 'static> Orchestrator<D> {
    pub fn new(executor: TaskExecutor<D>) -> Self {
        Self {
            executor: Arc::new(executor),
            config: OrchestratorConfig::default(),
            results: HashMap::new(),
            metrics: TaskMetrics::default(),
            runs: 0,
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn executor(&self) -> &TaskExecutor<D> {
        &self.executor
    }

    /// Metrics of the latest run.
    pub fn get_metrics(&self) -> TaskMetrics {
        self.metrics.clone()
    }

    /// Results of the latest run, including a run that ended in deadlock.
    pub fn results(&self) -> &HashMap<TaskId, TaskResult> {
        &self.results
    }

    /// Run `tasks` to completion.
    ///
    /// Fails before anything executes if the tasks do not form a valid
    /// acyclic graph, and with [`FlowdagError::Deadlock`] if the run stalls
    /// with tasks still pending. Metrics are aggregated in both the success
    /// and the deadlock case.
    pub async fn execute_tasks(&mut self, tasks: Vec<Task>) -> Result<HashMap<TaskId, TaskResult>> {
        let started = Instant::now();
        self.runs += 1;
        let run = self.runs;
        self.results.clear();
        self.metrics = TaskMetrics::default();

        let graph = DependencyGraph::from_tasks(&tasks)?;
        let cycles = graph.detect_cycles();
        if !cycles.is_empty() {
            error!(run, ?cycles, "dependency cycle; nothing executed");
            return Err(FlowdagError::CyclicDependency { cycles });
        }

        info!(run, tasks = tasks.len(), policy = ?self.config.failure_policy, "starting run");

        let mut state = RunState::default();
        let outcome = loop {
            if state.settled() >= tasks.len() {
                break Ok(());
            }

            let ready: Vec<Task> = graph
                .ready(&state.completed)
                .into_iter()
                .filter(|task| !state.failed.contains(&task.id))
                .cloned()
                .collect();

            if ready.is_empty() {
                let pending: Vec<TaskId> = graph
                    .tasks()
                    .filter(|task| !state.is_settled(&task.id))
                    .map(|task| task.id.clone())
                    .collect();
                error!(run, ?pending, "no task is ready; run is stuck");
                break Err(FlowdagError::Deadlock { pending });
            }

            let batch = self.dispatch_batch(run, ready).await;
            for (task, result) in batch {
                self.record(&graph, &mut state, &task, result);
            }
        };

        self.metrics = TaskMetrics::aggregate(
            &tasks,
            &self.results,
            state.critical_failures,
            started.elapsed(),
        );

        info!(
            run,
            completed = self.metrics.completed_tasks,
            failed = self.metrics.failed_tasks,
            pending = self.metrics.pending_tasks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );

        outcome.map(|()| self.results.clone())
    }

    /// Execute one ready frontier, one tokio task per member, and collect
    /// results in frontier order.
    ///
    /// Members live in a [`JoinSet`], so dropping the run mid-batch aborts
    /// them instead of leaving them to drive the driver unobserved.
    async fn dispatch_batch(&self, run: u64, ready: Vec<Task>) -> Vec<(Task, TaskResult)> {
        debug!(
            run,
            batch = ?ready.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            "dispatching ready tasks"
        );

        let mut set: JoinSet<(usize, TaskResult)> = JoinSet::new();
        let mut slots: HashMap<tokio::task::Id, usize> = HashMap::with_capacity(ready.len());
        for (idx, task) in ready.iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let owned = task.clone();
            let span = info_span!("task", run, id = %task.id);
            let handle = set.spawn(
                async move { (idx, executor.execute(&owned).await) }.instrument(span),
            );
            slots.insert(handle.id(), idx);
        }

        let mut settled: Vec<Option<TaskResult>> = vec![None; ready.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => settled[idx] = Some(result),
                Err(err) => {
                    let Some(&idx) = slots.get(&err.id()) else {
                        error!(run, error = %err, "unknown task aborted");
                        continue;
                    };
                    let id = &ready[idx].id;
                    error!(run, task = %id, error = %err, "task aborted");
                    settled[idx] = Some(TaskResult::failure(
                        id,
                        format!("task execution aborted: {err}"),
                        Duration::ZERO,
                    ));
                }
            }
        }

        ready
            .into_iter()
            .zip(settled)
            .map(|(task, result)| {
                let result = result.unwrap_or_else(|| {
                    TaskResult::failure(&task.id, "task produced no result", Duration::ZERO)
                });
                (task, result)
            })
            .collect()
    }

    fn record(
        &mut self,
        graph: &DependencyGraph,
        state: &mut RunState,
        task: &Task,
        result: TaskResult,
    ) {
        if result.success {
            state.completed.insert(task.id.clone());
        } else {
            if task.priority == TaskPriority::Critical {
                state.critical_failures += 1;
                warn!(task = %task.id, "critical task failed");
            }
            state.failed.insert(task.id.clone());
            if self.config.failure_policy == FailurePolicy::BlockDependents {
                self.block_dependents(graph, state, &task.id);
            }
        }
        self.results.insert(task.id.clone(), result);
    }

    /// Give every transitive dependent of `failed_id` a blocked result.
    /// Blocked critical tasks count as critical failures.
    fn block_dependents(&mut self, graph: &DependencyGraph, state: &mut RunState, failed_id: &str) {
        let mut stack: Vec<&str> = graph
            .dependents_of(failed_id)
            .iter()
            .map(String::as_str)
            .collect();

        while let Some(id) = stack.pop() {
            if state.is_settled(id) {
                continue;
            }
            debug!(task = %id, upstream = %failed_id, "blocking dependent of failed task");
            if graph.get(id).is_some_and(|t| t.priority == TaskPriority::Critical) {
                state.critical_failures += 1;
                warn!(task = %id, upstream = %failed_id, "critical task blocked");
            }
            state.failed.insert(id.to_string());
            self.results
                .insert(id.to_string(), TaskResult::blocked(id, failed_id));
            stack.extend(graph.dependents_of(id).iter().map(String::as_str));
        }
    }
}
