// src/dag/graph.rs

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::dag::task::{Task, TaskId};
use crate::errors::{FlowdagError, Result};

/// Internal node structure: the task plus its immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    task: Task,
    /// Direct dependencies: tasks that must complete before this one can run.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<TaskId>,
}

/// In-memory dependency graph keyed by task id.
///
/// Edges point upstream -> downstream. Registration order is remembered and
/// drives every traversal, so results are deterministic for a given input.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<TaskId, DagNode>,
    order: Vec<TaskId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph by adding `tasks` in the given order.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Result<Self> {
        let mut graph = Self::new();
        for task in tasks {
            graph.add(task.clone())?;
        }
        Ok(graph)
    }

    /// Register `task` and an edge from each of its upstream tasks.
    ///
    /// Every upstream id must already be registered, except the task's own id:
    /// a self-dependency is accepted here and later surfaces as a cycle.
    /// On error the graph is left untouched.
    pub fn add(&mut self, task: Task) -> Result<()> {
        if self.nodes.contains_key(&task.id) {
            return Err(FlowdagError::DuplicateTask(task.id));
        }

        if let Some(missing) = task
            .upstream_ids()
            .find(|dep| *dep != task.id && !self.nodes.contains_key(*dep))
        {
            return Err(FlowdagError::MissingDependency {
                task: task.id.clone(),
                dependency: missing.to_string(),
            });
        }

        let id = task.id.clone();
        let deps: Vec<TaskId> = task.upstream_ids().map(str::to_string).collect();

        self.nodes.insert(
            id.clone(),
            DagNode {
                task,
                deps: deps.clone(),
                dependents: Vec::new(),
            },
        );
        self.order.push(id.clone());

        for dep in deps {
            if let Some(upstream) = self.nodes.get_mut(&dep) {
                upstream.dependents.push(id.clone());
            }
        }

        debug!(task = %id, deps = ?self.dependencies_of(&id), "registered task");
        Ok(())
    }

    /// Add an extra edge `upstream -> downstream` between two registered
    /// tasks. Unlike [`add`](Self::add) this can close a cycle.
    pub fn link(&mut self, upstream: &str, downstream: &str) -> Result<()> {
        for id in [upstream, downstream] {
            if !self.nodes.contains_key(id) {
                return Err(FlowdagError::TaskNotFound(id.to_string()));
            }
        }

        if let Some(node) = self.nodes.get_mut(upstream) {
            node.dependents.push(downstream.to_string());
        }
        if let Some(node) = self.nodes.get_mut(downstream) {
            node.deps.push(upstream.to_string());
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.nodes.get(id).map(|n| &n.task)
    }

    /// All tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| &n.task))
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks not in `completed` whose dependencies are all in `completed`.
    ///
    /// The relation kind of a dependency is ignored. Highest priority first;
    /// equal priorities keep registration order.
    pub fn ready(&self, completed: &HashSet<TaskId>) -> Vec<&Task> {
        let mut ready: Vec<&Task> = self
            .order
            .iter()
            .filter(|id| !completed.contains(*id))
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.deps.iter().all(|dep| completed.contains(dep)))
            .map(|node| &node.task)
            .collect();

        ready.sort_by(|a, b| b.priority.cmp(&a.priority));
        ready
    }

    /// Every cycle met during a DFS from each unvisited node.
    ///
    /// A cycle is reported as the path from the first occurrence of the
    /// repeated node through the closing edge, e.g. `[A, B, C, A]`. Cycles may
    /// overlap; an empty result means the graph is acyclic.
    pub fn detect_cycles(&self) -> Vec<Vec<TaskId>> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut on_stack: HashSet<&str> = HashSet::new();
        let mut path: Vec<&str> = Vec::new();
        let mut cycles = Vec::new();

        for id in &self.order {
            if !visited.contains(id.as_str()) {
                self.cycle_dfs(id, &mut visited, &mut on_stack, &mut path, &mut cycles);
            }
        }

        cycles
    }

    fn cycle_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        on_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<TaskId>>,
    ) {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for next in self.dependents_of(node) {
            let next = next.as_str();
            if !visited.contains(next) {
                self.cycle_dfs(next, visited, on_stack, path, cycles);
            } else if on_stack.contains(next) {
                if let Some(start) = path.iter().position(|n| *n == next) {
                    let mut cycle: Vec<TaskId> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(next.to_string());
                    cycles.push(cycle);
                }
            }
        }

        path.pop();
        on_stack.remove(node);
    }

    /// Topological order: every task appears after all of its dependencies.
    ///
    /// Computed as the reverse DFS postorder over all components, visited in
    /// registration order. Fails with [`FlowdagError::CyclicDependency`] if
    /// the graph has a cycle.
    pub fn execution_order(&self) -> Result<Vec<TaskId>> {
        let cycles = self.detect_cycles();
        if !cycles.is_empty() {
            return Err(FlowdagError::CyclicDependency { cycles });
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut postorder: Vec<TaskId> = Vec::with_capacity(self.order.len());

        for id in &self.order {
            if !visited.contains(id.as_str()) {
                self.postorder_dfs(id, &mut visited, &mut postorder);
            }
        }

        postorder.reverse();
        Ok(postorder)
    }

    fn postorder_dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        postorder: &mut Vec<TaskId>,
    ) {
        visited.insert(node);
        for next in self.dependents_of(node) {
            if !visited.contains(next.as_str()) {
                self.postorder_dfs(next, visited, postorder);
            }
        }
        postorder.push(node.to_string());
    }
}
