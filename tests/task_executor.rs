// tests/task_executor.rs

use std::sync::Arc;
use std::time::Duration;

use flowdag::dag::Task;
use flowdag::exec::{ActionError, TaskExecutor};
use flowdag::recovery::{RecoveryConfig, RecoveryHandler};
use flowdag::types::{TaskStatus, TaskType};
use flowdag_test_utils::{Op, ScriptedDriver, init_tracing, with_timeout};
use serde_json::json;

fn executor(driver: &Arc<ScriptedDriver>) -> TaskExecutor<ScriptedDriver> {
    TaskExecutor::new(Arc::clone(driver)).with_poll_interval(Duration::from_millis(5))
}

fn recovering_executor(driver: &Arc<ScriptedDriver>) -> TaskExecutor<ScriptedDriver> {
    let handler = Arc::new(RecoveryHandler::new(
        Arc::clone(driver),
        RecoveryConfig::without_pauses(),
    ));
    executor(driver).with_recovery(handler)
}

#[tokio::test]
async fn navigate_reports_url() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let task = Task::new("open", TaskType::Navigate).with_param("url", "https://example.com");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert_eq!(result.status, TaskStatus::Success);
    assert_eq!(result.task_id, "open");
    assert_eq!(result.output, Some(json!({ "navigated_to": "https://example.com" })));
    assert_eq!(result.error, None);
    assert_eq!(driver.calls(), vec!["navigate https://example.com"]);
}

#[tokio::test]
async fn fill_form_clears_then_fills() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let task = Task::new("fill", TaskType::FillForm)
        .with_param("selector", "#email")
        .with_param("value", "a@b.c");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert_eq!(result.output, Some(json!({ "filled": "#email" })));
    assert_eq!(
        driver.calls(),
        vec!["find #email", "clear #email", "fill #email=a@b.c"]
    );
}

#[tokio::test]
async fn fill_form_accepts_numeric_value() {
    let driver = Arc::new(ScriptedDriver::new());
    let task = Task::new("fill", TaskType::FillForm)
        .with_param("selector", "#age")
        .with_param("value", 42);

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert!(driver.calls().contains(&"fill #age=42".to_string()));
}

#[tokio::test]
async fn click_scrolls_element_into_view_first() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let task = Task::new("click", TaskType::ClickElement).with_param("selector", "#go");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert_eq!(result.output, Some(json!({ "clicked": "#go" })));
    assert_eq!(
        driver.calls(),
        vec!["find #go", "scroll_into_view #go", "click #go"]
    );
}

#[tokio::test]
async fn extract_returns_element_text() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.set_text("h1", "Welcome");
    let task = Task::new("read", TaskType::ExtractData).with_param("selector", "h1");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert_eq!(result.output, Some(json!({ "extracted": "Welcome" })));
}

#[tokio::test]
async fn wait_for_condition_polls_until_present() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing_for("#ready", 2);
    let task = Task::new("wait", TaskType::WaitForCondition).with_param("condition", "#ready");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert_eq!(result.output, Some(json!({ "condition_met": true })));
    assert_eq!(driver.count(Op::Find), 3);
    assert_eq!(driver.count(Op::Wait), 2);
}

#[tokio::test]
async fn wait_for_condition_times_out() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#never");
    let task = Task::new("wait", TaskType::WaitForCondition)
        .with_param("condition", "#never")
        .with_param("timeout", 0.05);

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert_eq!(result.status, TaskStatus::Failed);
    let error = result.error.unwrap();
    assert!(error.contains("#never"), "{error}");
    assert!(error.contains("timed out"), "{error}");
}

#[tokio::test]
async fn structural_types_are_not_dispatched() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    for task_type in [
        TaskType::ConditionalBranch,
        TaskType::LoopTask,
        TaskType::CompositeTask,
    ] {
        let task = Task::new("s", task_type);
        let result = with_timeout(executor(&driver).execute(&task)).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("unknown task type"), "{error}");
        assert!(error.contains(task_type.as_str()), "{error}");
    }
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn missing_parameter_is_a_failed_result() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    let task = Task::new("open", TaskType::Navigate);

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("url"));
    assert!(driver.calls().is_empty());
}

#[tokio::test]
async fn driver_failure_is_contained() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.fail_always(Op::Navigate, ActionError::Navigation("dns failure".into()));
    let task = Task::new("open", TaskType::Navigate).with_param("url", "https://x");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert_eq!(result.retry_attempts, 0);
    assert!(result.error.unwrap().contains("dns failure"));
}

#[tokio::test]
async fn missing_element_fails_without_recovery() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#gone");
    let task = Task::new("click", TaskType::ClickElement).with_param("selector", "#gone");

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("element not found"));
    assert_eq!(driver.count(Op::Click), 0);
}

#[tokio::test]
async fn task_timeout_bounds_the_attempt() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.delay(Op::Navigate, Duration::from_secs(10));
    let task = Task::new("slow", TaskType::Navigate)
        .with_param("url", "https://slow")
        .with_timeout(Duration::from_millis(50));

    let result = with_timeout(executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out"));
    assert_eq!(driver.in_flight(), 0);
}

#[tokio::test]
async fn recovery_retries_transient_failure() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing_for("#late", 1);
    let task = Task::new("click", TaskType::ClickElement).with_param("selector", "#late");

    let result = with_timeout(recovering_executor(&driver).execute(&task)).await;

    assert!(result.success);
    assert_eq!(result.retry_attempts, 1);
    assert_eq!(
        driver.calls(),
        vec![
            "find #late",
            "scroll 0,300",
            "find #late",
            "scroll_into_view #late",
            "click #late",
        ]
    );
}

#[tokio::test]
async fn recovery_stops_at_skip_action() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.missing("#gone");
    let task = Task::new("click", TaskType::ClickElement).with_param("selector", "#gone");

    let result = with_timeout(recovering_executor(&driver).execute(&task)).await;

    // scroll_and_retry, wait_and_retry, then skip_action ends the loop
    assert!(!result.success);
    assert_eq!(result.retry_attempts, 2);
    assert_eq!(driver.count(Op::Find), 3);
    assert_eq!(driver.count(Op::Click), 0);
}

#[tokio::test]
async fn recovery_respects_task_retry_budget() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.fail_always(Op::Navigate, ActionError::Browser("crash".into()));
    let task = Task::new("open", TaskType::Navigate)
        .with_param("url", "https://x")
        .with_retry_budget(1);

    let result = with_timeout(recovering_executor(&driver).execute(&task)).await;

    assert!(!result.success);
    assert_eq!(result.retry_attempts, 1);
    assert_eq!(driver.count(Op::Navigate), 2);
}

#[tokio::test]
async fn recovery_gives_up_at_handler_max_retries() {
    init_tracing();
    let driver = Arc::new(ScriptedDriver::new());
    driver.fail_always(Op::Navigate, ActionError::Browser("crash".into()));
    let handler = Arc::new(RecoveryHandler::new(
        Arc::clone(&driver),
        RecoveryConfig::without_pauses().with_max_retries(2),
    ));
    let task = Task::new("open", TaskType::Navigate)
        .with_param("url", "https://x")
        .with_retry_budget(10);

    let result = with_timeout(executor(&driver).with_recovery(Arc::clone(&handler)).execute(&task)).await;

    assert!(!result.success);
    assert_eq!(result.retry_attempts, 2);
    assert_eq!(driver.count(Op::Navigate), 3);

    let metrics = handler.get_metrics();
    assert_eq!(metrics.total_errors, 3);
    assert_eq!(metrics.recovery_successes, 2);
    assert_eq!(metrics.failed_recoveries, 1);
}
