// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod recovery;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::PlanFile;
use crate::dag::{DependencyGraph, TaskId, TaskResult};
use crate::engine::{Orchestrator, TaskMetrics};
use crate::exec::{SimulatedDriver, TaskExecutor};
use crate::recovery::{RecoveryHandler, RecoveryMetrics};

/// High-level entry point used by `main.rs`.
///
/// Wires plan loading, the simulated driver, the recovery handler, the
/// executor and the orchestrator, then prints a report. The report is
/// printed even when the run ends in deadlock, before the error is returned.
pub async fn run(args: CliArgs) -> Result<()> {
    let plan = load_and_validate(&args.plan)?;
    info!(plan = %args.plan, tasks = plan.task.len(), "loaded plan");

    if args.dry_run {
        return print_dry_run(&plan);
    }

    let driver = Arc::new(SimulatedDriver::new(plan.simulation.clone()));
    let mut executor =
        TaskExecutor::new(Arc::clone(&driver)).with_poll_interval(plan.poll_interval());

    let recovery = plan
        .settings
        .use_recovery
        .then(|| Arc::new(RecoveryHandler::new(Arc::clone(&driver), plan.recovery_config())));
    if let Some(handler) = &recovery {
        executor = executor.with_recovery(Arc::clone(handler));
    }

    let mut orchestrator = Orchestrator::new(executor).with_config(plan.orchestrator_config());
    let outcome = orchestrator.execute_tasks(plan.tasks()).await;

    let report = RunReport {
        results: ordered_results(&plan, orchestrator.results()),
        metrics: orchestrator.get_metrics(),
        recovery: recovery.as_ref().map(|h| h.get_metrics()),
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&plan, &report);
    }

    outcome?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    results: Vec<&'a TaskResult>,
    metrics: TaskMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovery: Option<RecoveryMetrics>,
}

/// Results in plan order; tasks that never ran are left out.
fn ordered_results<'a>(
    plan: &PlanFile,
    results: &'a HashMap<TaskId, TaskResult>,
) -> Vec<&'a TaskResult> {
    plan.task.iter().filter_map(|t| results.get(&t.id)).collect()
}

fn print_report(plan: &PlanFile, report: &RunReport<'_>) {
    println!("flowdag run");
    for task in &plan.task {
        match report.results.iter().find(|r| r.task_id == task.id) {
            Some(result) if result.success => println!(
                "  ok      {} ({}) {:.1}ms retries={}",
                task.id,
                task.task_type,
                result.execution_time_ms(),
                result.retry_attempts
            ),
            Some(result) => println!(
                "  {:<7} {} ({}): {}",
                result.status.as_str(),
                task.id,
                task.task_type,
                result.error.as_deref().unwrap_or("no error message")
            ),
            None => println!("  pending {} ({})", task.id, task.task_type),
        }
    }

    let m = &report.metrics;
    println!();
    println!(
        "tasks: {} total, {} completed, {} failed, {} pending",
        m.total_tasks, m.completed_tasks, m.failed_tasks, m.pending_tasks
    );
    println!(
        "success rate: {:.1}%  avg task time: {:.1}ms  retries: {}  critical failures: {}",
        m.success_rate * 100.0,
        m.avg_task_time_ms,
        m.retries_used,
        m.critical_failures
    );
    println!("total time: {:.1}ms", m.total_time_ms);

    if let Some(r) = &report.recovery {
        println!(
            "recovery: {} errors, {}/{} recoveries succeeded",
            r.total_errors, r.recovery_successes, r.recovery_attempts
        );
    }
}

/// Print the tasks, their dependencies and the execution order.
fn print_dry_run(plan: &PlanFile) -> Result<()> {
    let tasks = plan.tasks();
    let graph = DependencyGraph::from_tasks(&tasks)?;
    let order = graph.execution_order()?;

    println!("flowdag dry-run");
    println!(
        "  settings: max_retries={} failure_policy={:?} use_recovery={}",
        plan.settings.max_retries, plan.settings.failure_policy, plan.settings.use_recovery
    );
    println!();

    println!("tasks ({}):", tasks.len());
    for task in &tasks {
        println!("  - {} ({}, {})", task.id, task.task_type, task.priority);
        if !task.description.is_empty() {
            println!("      description: {}", task.description);
        }
        let deps = graph.dependencies_of(&task.id);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if !task.parameters.is_empty() {
            println!("      params: {}", serde_json::Value::Object(task.parameters.clone()));
        }
    }

    println!();
    println!("execution order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
