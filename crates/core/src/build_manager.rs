//! High-level build management interface
//!
//! This module provides the [`BuildManager`] which serves as the primary interface
//! for the command line. It loads the project configuration, resolves the
//! environment, builds the task graph once and answers listing, planning and
//! run requests against it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use docbuild_core::build_manager::{BuildManager, BuildManagerConfig};
//! use docbuild_core::execution::NullObserver;
//! use std::path::PathBuf;
//!
//! # fn example() -> docbuild_core::types::DocbuildResult<()> {
//! let manager = BuildManager::new(BuildManagerConfig {
//!     project_root: PathBuf::from("."),
//! })?;
//!
//! // Show what would run
//! let plan = manager.plan(&["build-html".to_string()])?;
//!
//! // Run it
//! let report = manager.run(&["build-html".to_string()], &NullObserver)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::configs::project::{parse_project_config, ProjectConfig};
use crate::environment::EnvironmentResolver;
use crate::execution::runner::{Scheduler, TaskObserver};
use crate::graph::TaskGraph;
use crate::pandoc::PandocSettings;
use crate::pipeline::{register_pipeline, PipelineConfig};
use crate::results::{BuildReport, DependencyGraphResult, ExecutionPlan, TaskInfo};
use crate::types::{DocbuildError, DocbuildResult};

/// Location of the project configuration, relative to the project root
pub const CONFIG_PATH: &str = ".docbuild/config.yml";

/// Configuration for initializing a build manager
pub struct BuildManagerConfig {
    pub project_root: PathBuf,
}

pub struct BuildManager {
    pub project_config: ProjectConfig,
    pub pipeline: PipelineConfig,
    pub pandoc: Arc<PandocSettings>,
    graph: TaskGraph,
}

impl BuildManager {
    /// Load configuration from the process environment and the project root
    pub fn new(config: BuildManagerConfig) -> DocbuildResult<Self> {
        let root = absolute(&config.project_root)?;
        Self::with_resolver(EnvironmentResolver::from_process(root))
    }

    /// Like [`BuildManager::new`] with an explicit variable table
    pub fn with_resolver(resolver: EnvironmentResolver) -> DocbuildResult<Self> {
        let project_config = Self::load_project_config(resolver.root())?;
        let pipeline = PipelineConfig::resolve(&project_config, &resolver)?;
        let pandoc = pipeline.pandoc_settings(&resolver)?;

        let mut graph = TaskGraph::new();
        register_pipeline(&mut graph, &pipeline, &pandoc)?;
        info!(tasks = graph.len(), root = %resolver.root().display(), "task graph ready");

        Ok(Self {
            project_config,
            pipeline,
            pandoc,
            graph,
        })
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// All registered tasks in registration order
    pub fn list_tasks(&self) -> Vec<TaskInfo> {
        self.graph.tasks().map(TaskInfo::from).collect()
    }

    /// Resolve the execution order for `targets` without running anything
    pub fn plan(&self, targets: &[String]) -> DocbuildResult<ExecutionPlan> {
        let tasks = Scheduler::new(&self.graph).plan(targets)?;
        Ok(ExecutionPlan::new(targets, &tasks))
    }

    /// Run `targets` with their dependencies
    pub fn run(&self, targets: &[String], observer: &dyn TaskObserver) -> DocbuildResult<BuildReport> {
        if targets.is_empty() {
            return Err(DocbuildError::Configuration("No target given".to_string()));
        }
        Scheduler::new(&self.graph).run(targets, observer)
    }

    pub fn dependency_graph(&self) -> DependencyGraphResult {
        DependencyGraphResult {
            graph: self.graph.to_petgraph(),
            cycles: self.graph.cycles(),
        }
    }

    fn load_project_config(root: &Path) -> DocbuildResult<ProjectConfig> {
        let config_path = root.join(CONFIG_PATH);
        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            DocbuildError::Configuration(format!(
                "Failed to read project config {}: {}",
                config_path.display(),
                e
            ))
        })?;

        parse_project_config(&content).map_err(|e| {
            DocbuildError::Configuration(format!(
                "Failed to parse project config {}: {}",
                config_path.display(),
                e
            ))
        })
    }
}

fn absolute(path: &Path) -> DocbuildResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{BUILD_HTML, VIEW_HTML};
    use std::collections::HashMap;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("convert/pandoc/filters")).unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        dir
    }

    fn manager(root: &Path) -> DocbuildResult<BuildManager> {
        BuildManager::with_resolver(EnvironmentResolver::new(root, HashMap::new()))
    }

    #[test]
    fn works_without_config_file() {
        let dir = project();
        let manager = manager(dir.path()).unwrap();
        let names: Vec<String> = manager.list_tasks().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&BUILD_HTML.to_string()));
        assert!(names.contains(&VIEW_HTML.to_string()));
    }

    #[test]
    fn invalid_config_is_a_configuration_error() {
        let dir = project();
        fs::create_dir_all(dir.path().join(".docbuild")).unwrap();
        fs::write(dir.path().join(CONFIG_PATH), "unknownKey: 1\n").unwrap();
        let err = manager(dir.path()).err().unwrap();
        assert!(matches!(err, DocbuildError::Configuration(ref m) if m.contains("config.yml")));
    }

    #[test]
    fn plan_lists_steps_in_order() {
        let dir = project();
        let plan = manager(dir.path())
            .unwrap()
            .plan(&[BUILD_HTML.to_string()])
            .unwrap();
        let steps: Vec<&str> = plan.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            steps,
            vec!["init-build", "define-environment", "convert-tables", "compile-stylesheet", "build-html"]
        );
        assert!(plan.steps[0].always_runs);
        assert!(!plan.steps[4].always_runs);
    }

    #[test]
    fn unknown_target_is_reported() {
        let dir = project();
        let err = manager(dir.path())
            .unwrap()
            .plan(&["build-epub".to_string()])
            .unwrap_err();
        assert!(matches!(err, DocbuildError::UnknownTask(ref n) if n == "build-epub"));
    }

    #[test]
    fn cycles_in_custom_tasks_are_visible_in_graph() {
        let dir = project();
        fs::create_dir_all(dir.path().join(".docbuild")).unwrap();
        fs::write(
            dir.path().join(CONFIG_PATH),
            "tasks:\n  - name: a\n    command: \"true\"\n    dependencies: [b]\n  - name: b\n    command: \"true\"\n    dependencies: [a]\n",
        )
        .unwrap();
        let manager = manager(dir.path()).unwrap();
        assert_eq!(
            manager.dependency_graph().cycles,
            vec![vec!["a".to_string(), "b".to_string()]]
        );
        assert!(matches!(
            manager.plan(&["a".to_string()]),
            Err(DocbuildError::CycleDetected(_))
        ));
    }
}
