// tests/orchestrator.rs

use std::sync::Arc;
use std::time::Duration;

use flowdag::dag::Task;
use flowdag::engine::{Orchestrator, OrchestratorConfig};
use flowdag::errors::FlowdagError;
use flowdag::exec::{ActionError, TaskExecutor};
use flowdag::types::{FailurePolicy, TaskPriority, TaskStatus, TaskType};
use flowdag_test_utils::builders::{chain, navigate};
use flowdag_test_utils::{Op, ScriptedDriver, init_tracing, with_timeout};

fn orchestrator(driver: &Arc<ScriptedDriver>) -> Orchestrator<ScriptedDriver> {
    Orchestrator::new(TaskExecutor::new(Arc::clone(driver)))
}

fn blocking_orchestrator(driver: &Arc<ScriptedDriver>) -> Orchestrator<ScriptedDriver> {
    orchestrator(driver).with_config(OrchestratorConfig {
        failure_policy: FailurePolicy::BlockDependents,
    })
}

/// Task whose click always fails: its selector never resolves.
fn broken(id: &str) -> Task {
    Task::new(id, TaskType::ClickElement).with_param("selector", format!("#{id}-missing"))
}

#[tokio::test]
async fn chain_runs_to_completion() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let mut orch = orchestrator(&driver);

    let results = with_timeout(orch.execute_tasks(chain(&["A", "B", "C"])))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.values().all(|r| r.success));

    let metrics = orch.get_metrics();
    assert_eq!(metrics.total_tasks, 3);
    assert_eq!(metrics.completed_tasks, 3);
    assert_eq!(metrics.failed_tasks, 0);
    assert_eq!(metrics.pending_tasks, 0);
    assert_eq!(metrics.success_rate, 1.0);
    assert_eq!(metrics.tasks_by_type.get("navigate"), Some(&3));
    assert_eq!(metrics.tasks_by_status.get("success"), Some(&3));

    assert_eq!(
        driver.calls(),
        vec![
            "navigate https://example.com/A",
            "navigate https://example.com/B",
            "navigate https://example.com/C",
        ]
    );
}

#[tokio::test]
async fn independent_tasks_run_concurrently() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.delay(Op::Navigate, Duration::from_millis(100));
    let mut orch = orchestrator(&driver);

    let results = with_timeout(orch.execute_tasks(vec![navigate("A"), navigate("B"), navigate("C")]))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(driver.max_in_flight(), 3);
}

#[tokio::test]
async fn cycle_fails_before_any_task_runs() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let mut orch = orchestrator(&driver);

    let err = with_timeout(orch.execute_tasks(vec![navigate("A").after("A")]))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowdagError::CyclicDependency { .. }));
    assert!(driver.calls().is_empty());
    assert!(orch.results().is_empty());
}

#[tokio::test]
async fn all_to_all_dependencies_fail_before_any_result() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let mut orch = orchestrator(&driver);

    let ids = ["A", "B", "C"];
    let tasks: Vec<Task> = ids
        .iter()
        .map(|id| {
            ids.iter()
                .filter(|other| *other != id)
                .fold(navigate(id), |task, other| task.after(*other))
        })
        .collect();

    let err = with_timeout(orch.execute_tasks(tasks)).await.unwrap_err();

    assert!(matches!(
        err,
        FlowdagError::MissingDependency { .. } | FlowdagError::CyclicDependency { .. }
    ));
    assert!(driver.calls().is_empty());
    assert!(orch.results().values().all(|r| !r.success));
}

#[tokio::test]
async fn failed_upstream_deadlocks_by_default() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#A-missing");
    let mut orch = orchestrator(&driver);

    let tasks = vec![broken("A"), navigate("B").after("A"), navigate("C")];
    let err = with_timeout(orch.execute_tasks(tasks)).await.unwrap_err();

    match err {
        FlowdagError::Deadlock { pending } => assert_eq!(pending, vec!["B"]),
        other => panic!("expected Deadlock, got {other:?}"),
    }

    let results = orch.results();
    assert_eq!(results.len(), 2);
    assert!(!results["A"].success);
    assert!(results["C"].success);

    let metrics = orch.get_metrics();
    assert_eq!(metrics.completed_tasks, 1);
    assert_eq!(metrics.failed_tasks, 1);
    assert_eq!(metrics.pending_tasks, 1);
    assert_eq!(metrics.tasks_by_status.get("pending"), Some(&1));
}

#[tokio::test]
async fn failed_task_is_not_retried_by_the_scheduler() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#A-missing");
    let mut orch = orchestrator(&driver);

    let results = with_timeout(orch.execute_tasks(vec![broken("A"), navigate("B")]))
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(driver.count(Op::Find), 1);
    assert_eq!(orch.get_metrics().success_rate, 0.5);
}

#[tokio::test]
async fn block_dependents_settles_the_run() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#A-missing");
    let mut orch = blocking_orchestrator(&driver);

    let tasks = vec![
        broken("A"),
        navigate("B").after("A"),
        navigate("C").after("B"),
        navigate("D"),
    ];
    let results = with_timeout(orch.execute_tasks(tasks)).await.unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(results["A"].status, TaskStatus::Failed);
    assert_eq!(results["B"].status, TaskStatus::Blocked);
    assert_eq!(results["C"].status, TaskStatus::Blocked);
    assert_eq!(results["D"].status, TaskStatus::Success);
    assert!(results["C"].error.as_deref().unwrap().contains("'A'"));

    assert_eq!(driver.count(Op::Navigate), 1);

    let metrics = orch.get_metrics();
    assert_eq!(metrics.failed_tasks, 3);
    assert_eq!(metrics.tasks_by_status.get("blocked"), Some(&2));
}

#[tokio::test]
async fn blocked_critical_dependent_counts_as_critical_failure() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#A-missing");
    let mut orch = blocking_orchestrator(&driver);

    let tasks = vec![
        broken("A"),
        navigate("B").after("A").with_priority(TaskPriority::Critical),
        navigate("C").after("A"),
    ];
    let results = with_timeout(orch.execute_tasks(tasks)).await.unwrap();

    assert_eq!(results["B"].status, TaskStatus::Blocked);
    assert_eq!(orch.get_metrics().critical_failures, 1);
}

#[tokio::test]
async fn dropping_a_run_mid_batch_stops_its_tasks() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.delay(Op::Find, Duration::from_millis(100));
    let mut orch = orchestrator(&driver);

    let task = Task::new("form", TaskType::FillForm)
        .with_param("selector", "#x")
        .with_param("value", "v");
    let run = tokio::time::timeout(Duration::from_millis(20), orch.execute_tasks(vec![task])).await;
    assert!(run.is_err());
    drop(orch);

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(driver.calls(), vec!["find #x"]);
    assert_eq!(driver.in_flight(), 0);
}

#[tokio::test]
async fn critical_failures_are_counted() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.fail_always(Op::Navigate, ActionError::Api("503".into()));
    let mut orch = orchestrator(&driver);

    let tasks = vec![
        navigate("A").with_priority(TaskPriority::Critical),
        navigate("B").with_priority(TaskPriority::Critical),
        navigate("C"),
    ];
    with_timeout(orch.execute_tasks(tasks)).await.unwrap();

    let metrics = orch.get_metrics();
    assert_eq!(metrics.critical_failures, 2);
    assert_eq!(metrics.failed_tasks, 3);
    assert_eq!(metrics.tasks_by_priority.get("critical"), Some(&2));
    assert_eq!(metrics.success_rate, 0.0);
}

#[tokio::test]
async fn results_and_metrics_reset_between_runs() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let mut orch = orchestrator(&driver);

    with_timeout(orch.execute_tasks(chain(&["A", "B"]))).await.unwrap();
    let results = with_timeout(orch.execute_tasks(vec![navigate("X")])).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(results.contains_key("X"));
    assert_eq!(orch.get_metrics().total_tasks, 1);
}

#[tokio::test]
async fn unknown_upstream_is_rejected_up_front() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let mut orch = orchestrator(&driver);

    let err = with_timeout(orch.execute_tasks(vec![navigate("A"), navigate("B").after("Z")]))
        .await
        .unwrap_err();

    assert!(matches!(err, FlowdagError::MissingDependency { .. }));
    assert!(driver.calls().is_empty());
}
