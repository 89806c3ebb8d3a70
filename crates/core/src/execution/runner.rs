//! Incremental scheduler
//!
//! Runs a resolved task list strictly in order, one task at a time. Each task
//! is checked for freshness right before it would run, so outputs written by a
//! dependency earlier in the same run are taken into account. The first
//! failure stops the build; nothing is retried or rolled back.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{error, info};

use crate::environment::require_minimum_version;
use crate::execution::command::{ProcessInvoker, ProcessOutput};
use crate::execution::freshness::{check_freshness, Freshness};
use crate::graph::TaskGraph;
use crate::results::{BuildFailure, BuildReport, ExecutionResult, TaskStatus};
use crate::tasks::{Action, EnvironmentCheck, FreshnessPolicy, LineFilter, Task};
use crate::types::{DocbuildError, DocbuildResult};

/// Receives progress events while a build runs
pub trait TaskObserver {
    /// A stale task is about to run
    fn task_started(&self, _task: &Task) {}

    /// A task finished, was skipped as up to date, or failed
    fn task_finished(&self, _task: &Task, _result: &ExecutionResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl TaskObserver for NullObserver {}

pub struct Scheduler<'a> {
    graph: &'a TaskGraph,
    invoker: ProcessInvoker,
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a TaskGraph) -> Self {
        Self {
            graph,
            invoker: ProcessInvoker::new(),
        }
    }

    /// Resolve the execution order without running anything
    pub fn plan<S: AsRef<str>>(&self, roots: &[S]) -> DocbuildResult<Vec<&'a Task>> {
        self.graph.resolve_dependency_closure(roots)
    }

    /// Run `roots` and everything they depend on.
    ///
    /// Graph errors are returned before any task starts. Task failures end the
    /// build and are reported in [`BuildReport::failure`].
    pub fn run<S: AsRef<str>>(
        &self,
        roots: &[S],
        observer: &dyn TaskObserver,
    ) -> DocbuildResult<BuildReport> {
        let ordered = self.plan(roots)?;
        let mut report = BuildReport::default();
        // Files written in this run, keyed by the task that wrote them
        let mut written: HashMap<&str, Vec<PathBuf>> = HashMap::new();

        for task in &ordered {
            let started = Instant::now();
            let upstream: Vec<PathBuf> = task
                .depends_on
                .iter()
                .filter_map(|dep| written.get(dep.as_str()))
                .flatten()
                .cloned()
                .collect();

            let freshness = match check_freshness(task, &upstream) {
                Ok(freshness) => freshness,
                Err(e) => {
                    self.fail(task, e, &ordered, started, observer, &mut report);
                    break;
                }
            };

            if let Freshness::Stale { reason } = freshness {
                info!(task = %task.name, %reason, "running task");
                observer.task_started(task);

                match self.execute(task) {
                    Ok(output) => {
                        let result = ExecutionResult {
                            task: task.name.clone(),
                            status: TaskStatus::Succeeded,
                            exit_code: output.exit_code,
                            stdout: output.stdout,
                            duration: started.elapsed(),
                            output_bytes: output_size(task),
                        };
                        observer.task_finished(task, &result);
                        report.results.push(result);
                        written.insert(task.name.as_str(), handed_down(task, upstream));
                    }
                    Err(e) => {
                        self.fail(task, e, &ordered, started, observer, &mut report);
                        break;
                    }
                }
            } else {
                info!(task = %task.name, "up to date");
                let result = ExecutionResult {
                    task: task.name.clone(),
                    status: TaskStatus::UpToDate,
                    exit_code: None,
                    stdout: None,
                    duration: started.elapsed(),
                    output_bytes: output_size(task),
                };
                observer.task_finished(task, &result);
                report.results.push(result);
            }
        }

        Ok(report)
    }

    fn fail(
        &self,
        task: &Task,
        error: DocbuildError,
        ordered: &[&Task],
        started: Instant,
        observer: &dyn TaskObserver,
        report: &mut BuildReport,
    ) {
        error!(task = %task.name, %error, "task failed");
        let exit_code = match &error {
            DocbuildError::TaskExecution { code, .. } => *code,
            _ => None,
        };
        let result = ExecutionResult {
            task: task.name.clone(),
            status: TaskStatus::Failed,
            exit_code,
            stdout: None,
            duration: started.elapsed(),
            output_bytes: 0,
        };
        observer.task_finished(task, &result);
        report.results.push(result);
        report.failure = Some(BuildFailure {
            task: task.name.clone(),
            dependents: self.graph.dependents_of(&task.name, ordered),
            error,
        });
    }

    fn execute(&self, task: &Task) -> DocbuildResult<ProcessOutput> {
        let completed = ProcessOutput {
            exit_code: None,
            stdout: None,
        };
        match &task.action {
            Action::Process(spec) => self.invoker.run_checked(&task.name, spec),
            Action::FilterLines(filter) => {
                filter_lines(filter)?;
                Ok(completed)
            }
            Action::EnsureDirectories(dirs) => {
                for dir in dirs {
                    fs::create_dir_all(dir)?;
                }
                Ok(completed)
            }
            Action::CheckEnvironment(check) => {
                self.check_environment(check)?;
                Ok(completed)
            }
        }
    }

    fn check_environment(&self, check: &EnvironmentCheck) -> DocbuildResult<()> {
        for (label, dir) in &check.directories {
            if !dir.is_dir() {
                return Err(DocbuildError::Configuration(format!(
                    "Required {} directory '{}' does not exist",
                    label,
                    dir.display()
                )));
            }
        }
        for tool in &check.tools {
            require_minimum_version(
                &self.invoker,
                &tool.executable,
                tool.minimum,
                &check.working_dir,
            )?;
        }
        Ok(())
    }
}

fn filter_lines(filter: &LineFilter) -> DocbuildResult<()> {
    let content = fs::read_to_string(&filter.input)?;
    let mut kept = String::new();
    for line in content.lines().filter(|l| l.starts_with(&filter.prefix)) {
        kept.push_str(line);
        kept.push('\n');
    }
    if let Some(parent) = filter.output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&filter.output, kept)?;
    Ok(())
}

/// Files a finished task passes on to its dependents: its own outputs, or what
/// it received itself when it has no timestamped outputs
fn handed_down(task: &Task, upstream: Vec<PathBuf>) -> Vec<PathBuf> {
    if task.freshness == FreshnessPolicy::AlwaysStale || task.outputs.is_empty() {
        return upstream;
    }
    task.outputs
        .iter()
        .filter_map(|artifact| artifact.resolve().ok())
        .flatten()
        .collect()
}

fn output_size(task: &Task) -> u64 {
    task.outputs
        .iter()
        .filter_map(|artifact| artifact.resolve().ok())
        .flatten()
        .filter_map(|file| fs::metadata(file).ok())
        .map(|meta| meta.len())
        .sum()
}
