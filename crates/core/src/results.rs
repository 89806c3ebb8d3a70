//! Result types for build operations
//!
//! Everything here lives for a single invocation; nothing is persisted.

use std::time::Duration;

use serde::Serialize;

use crate::tasks::{FreshnessPolicy, Task};
use crate::types::DocbuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    UpToDate,
    Succeeded,
    Failed,
}

/// Outcome of one task within a build
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub task: String,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub duration: Duration,
    /// Combined size of the task's resolved outputs after it finished
    pub output_bytes: u64,
}

/// The task that stopped the build and the tasks it took down with it
#[derive(Debug)]
pub struct BuildFailure {
    pub task: String,
    pub error: DocbuildError,
    /// Requested tasks that depend on the failed one, in execution order
    pub dependents: Vec<String>,
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub results: Vec<ExecutionResult>,
    pub failure: Option<BuildFailure>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn result(&self, task: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.task == task)
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.task.as_str())
            .collect()
    }
}

/// Summary of a registered task for listings
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub name: String,
    pub group: String,
    pub description: String,
    pub depends_on: Vec<String>,
}

impl From<&Task> for TaskInfo {
    fn from(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            group: task.group.clone(),
            description: task.description.clone(),
            depends_on: task.depends_on.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub name: String,
    pub description: String,
    pub action: String,
    pub always_runs: bool,
}

/// Resolved execution order for a set of targets, without running anything
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionPlan {
    pub targets: Vec<String>,
    pub steps: Vec<PlannedTask>,
}

impl ExecutionPlan {
    pub fn new(targets: &[String], tasks: &[&Task]) -> Self {
        Self {
            targets: targets.to_vec(),
            steps: tasks
                .iter()
                .map(|task| PlannedTask {
                    name: task.name.clone(),
                    description: task.description.clone(),
                    action: task.action.summary(),
                    always_runs: task.freshness == FreshnessPolicy::AlwaysStale,
                })
                .collect(),
        }
    }
}

/// Result of getting the task dependency graph
#[derive(Debug)]
pub struct DependencyGraphResult {
    pub graph: petgraph::Graph<String, ()>,
    pub cycles: Vec<Vec<String>>,
}
