// src/exec/executor.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::dag::task::{Task, TaskResult};
use crate::recovery::{ErrorContext, RecoveryHandler};
use crate::types::TaskType;

use super::driver::{ActionDriver, ActionError, ActionResult, ElementHandle};

/// Interval between presence checks in `wait_for_condition`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Runs one task at a time against an [`ActionDriver`].
///
/// `execute` never fails: driver errors, missing parameters, timeouts and
/// unsupported task types all come back as a failed [`TaskResult`].
pub struct TaskExecutor<D: ActionDriver> {
    driver: Arc<D>,
    recovery: Option<Arc<RecoveryHandler<D>>>,
    poll_interval: Duration,
}

impl<D: ActionDriver> TaskExecutor<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            recovery: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Retry failed attempts under the guidance of `handler`.
    pub fn with_recovery(mut self, handler: Arc<RecoveryHandler<D>>) -> Self {
        self.recovery = Some(handler);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn recovery(&self) -> Option<&Arc<RecoveryHandler<D>>> {
        self.recovery.as_ref()
    }

    pub async fn execute(&self, task: &Task) -> TaskResult {
        let started = Instant::now();
        let mut retries = 0u32;

        info!(task = %task.id, kind = %task.task_type, "executing task");

        loop {
            let err = match self.attempt(task).await {
                Ok(output) => {
                    let duration = started.elapsed();
                    info!(
                        task = %task.id,
                        retries,
                        elapsed_ms = duration.as_millis() as u64,
                        "task succeeded"
                    );
                    return TaskResult::success(&task.id, output, duration)
                        .with_retry_attempts(retries);
                }
                Err(err) => err,
            };

            match self.plan_retry(task, &err, retries).await {
                Some(next) => {
                    debug!(task = %task.id, retry = next, error = %err, "retrying task");
                    retries = next;
                }
                None => {
                    error!(task = %task.id, retries, error = %err, "task failed");
                    return TaskResult::failure(&task.id, err.to_string(), started.elapsed())
                        .with_retry_attempts(retries);
                }
            }
        }
    }

    /// New retry count if the failed attempt should be repeated.
    async fn plan_retry(&self, task: &Task, err: &ActionError, retries: u32) -> Option<u32> {
        let handler = self.recovery.as_ref()?;
        if retries >= task.retry_budget {
            return None;
        }

        let ctx = ErrorContext::for_task(&task.id, retries).with_action(task.task_type.as_str());
        let action = handler.handle_error(err, Some(ctx)).await;

        if action.can_recover && action.strategy.retries_action() {
            Some(action.retry_count)
        } else {
            warn!(
                task = %task.id,
                strategy = %action.strategy,
                reason = %action.reason,
                "giving up on task"
            );
            None
        }
    }

    async fn attempt(&self, task: &Task) -> ActionResult<Value> {
        match tokio::time::timeout(task.timeout, self.dispatch(task)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActionError::Timeout(format!(
                "task '{}' exceeded {:.1}s",
                task.id,
                task.timeout.as_secs_f64()
            ))),
        }
    }

    async fn dispatch(&self, task: &Task) -> ActionResult<Value> {
        match task.task_type {
            TaskType::Navigate => {
                let url = required_str(task, "url")?;
                self.driver.navigate(url).await?;
                Ok(json!({ "navigated_to": url }))
            }
            TaskType::FillForm => {
                let selector = required_str(task, "selector")?;
                let value = fill_value(task)?;
                let element = self.locate(selector).await?;
                self.driver.clear(&element).await?;
                self.driver.fill(&element, &value).await?;
                Ok(json!({ "filled": selector }))
            }
            TaskType::ClickElement => {
                let selector = required_str(task, "selector")?;
                let element = self.locate(selector).await?;
                self.driver.scroll_into_view(&element).await?;
                self.driver.click(&element).await?;
                Ok(json!({ "clicked": selector }))
            }
            TaskType::ExtractData => {
                let selector = required_str(task, "selector")?;
                let element = self.locate(selector).await?;
                let text = self.driver.text(&element).await?;
                Ok(json!({ "extracted": text }))
            }
            TaskType::WaitForCondition => {
                let condition = required_str(task, "condition")?;
                let limit = condition_timeout(task)?;
                self.wait_for(condition, limit).await?;
                Ok(json!({ "condition_met": true }))
            }
            other @ (TaskType::ConditionalBranch | TaskType::LoopTask | TaskType::CompositeTask) => {
                Err(ActionError::InvalidAction(format!("unknown task type: {other}")))
            }
        }
    }

    async fn locate(&self, selector: &str) -> ActionResult<ElementHandle> {
        self.driver
            .find(selector)
            .await?
            .ok_or_else(|| ActionError::ElementNotFound(selector.to_string()))
    }

    async fn wait_for(&self, condition: &str, limit: Duration) -> ActionResult<()> {
        let deadline = Instant::now() + limit;
        loop {
            if self.driver.find(condition).await?.is_some() {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ActionError::Timeout(format!(
                    "condition '{condition}' not met within {:.1}s",
                    limit.as_secs_f64()
                )));
            }
            self.driver
                .wait(self.poll_interval.min(deadline - now))
                .await?;
        }
    }
}

fn required_str<'t>(task: &'t Task, key: &str) -> ActionResult<&'t str> {
    task.param_str(key).ok_or_else(|| {
        ActionError::InvalidAction(format!(
            "{} task '{}' needs a string '{key}' parameter",
            task.task_type, task.id
        ))
    })
}

/// `value` may be any scalar; non-strings are filled in their JSON form.
fn fill_value(task: &Task) -> ActionResult<String> {
    match task.parameters.get("value") {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        _ => Err(ActionError::InvalidAction(format!(
            "fill_form task '{}' needs a scalar 'value' parameter",
            task.id
        ))),
    }
}

/// Optional `timeout` parameter in seconds; the task timeout otherwise.
fn condition_timeout(task: &Task) -> ActionResult<Duration> {
    match task.parameters.get("timeout") {
        None => Ok(task.timeout),
        Some(value) => value
            .as_f64()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| {
                ActionError::InvalidAction(format!(
                    "wait_for_condition task '{}' has an invalid 'timeout': {value}",
                    task.id
                ))
            }),
    }
}
