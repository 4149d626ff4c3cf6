use flowdag::config::{
    DependencyConfig, PlanFile, RawPlanFile, SettingsSection, TaskConfig,
};
use flowdag::dag::Task;
use flowdag::exec::SimulationConfig;
use flowdag::types::{DependencyKind, FailurePolicy, TaskPriority, TaskType};
use serde_json::{Map, Value};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanFileBuilder {
    plan: RawPlanFile,
}

impl PlanFileBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                settings: SettingsSection::default(),
                simulation: SimulationConfig::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.plan.task.push(task);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.plan.settings.failure_policy = policy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.plan.settings.max_retries = max_retries;
        self
    }

    pub fn with_missing_selector(mut self, selector: &str) -> Self {
        self.plan
            .simulation
            .missing_selectors
            .push(selector.to_string());
        self
    }

    /// The raw plan, for exercising validation failures.
    pub fn raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(id: &str, task_type: TaskType) -> Self {
        Self {
            task: TaskConfig {
                id: id.to_string(),
                task_type,
                priority: TaskPriority::Normal,
                description: String::new(),
                params: Map::new(),
                after: vec![],
                depends_on: vec![],
                retries: None,
                timeout_secs: None,
            },
        }
    }

    /// A `navigate` task pointing at `https://example.com/<id>`.
    pub fn navigate(id: &str) -> Self {
        Self::new(id, TaskType::Navigate).param("url", format!("https://example.com/{id}"))
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.task.params.insert(key.to_string(), value.into());
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn depends_on(mut self, dep: &str, kind: DependencyKind) -> Self {
        self.task.depends_on.push(DependencyConfig {
            task: dep.to_string(),
            kind,
            condition: None,
        });
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = Some(retries);
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.task.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// `navigate` task with a url derived from its id.
pub fn navigate(id: &str) -> Task {
    Task::new(id, TaskType::Navigate).with_param("url", format!("https://example.com/{id}"))
}

/// Strict chain: each task depends on the previous one.
pub fn chain(ids: &[&str]) -> Vec<Task> {
    let mut tasks: Vec<Task> = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        let mut task = navigate(id);
        if i > 0 {
            task = task.after(ids[i - 1]);
        }
        tasks.push(task);
    }
    tasks
}
