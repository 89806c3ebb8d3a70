use std::path::PathBuf;

use thiserror::Error;

/// The main error type for docbuild operations
#[derive(Debug, Error)]
pub enum DocbuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Circular dependency detected: {}", format_cycle(.0))]
    CycleDetected(Vec<String>),

    #[error("Task '{0}' not found")]
    UnknownTask(String),

    #[error("Output '{}' of task '{task}' is already produced by task '{owner}'", .path.display())]
    OutputConflict {
        path: PathBuf,
        task: String,
        owner: String,
    },

    #[error("Failed to launch '{program}': {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Task '{task}' failed with exit code {}", .code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string()))]
    TaskExecution { task: String, code: Option<i32> },
}

impl DocbuildError {
    /// Whether the error was raised while building or validating the task graph
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            DocbuildError::DuplicateTask(_)
                | DocbuildError::CycleDetected(_)
                | DocbuildError::UnknownTask(_)
                | DocbuildError::OutputConflict { .. }
        )
    }
}

/// Render a cycle as a closed path, e.g. `a -> b -> a`
pub fn format_cycle(cycle: &[String]) -> String {
    let mut path = cycle.to_vec();
    if let Some(first) = path.first().cloned() {
        path.push(first);
    }
    path.join(" -> ")
}

/// Result type alias for docbuild operations
pub type DocbuildResult<T> = Result<T, DocbuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_closes_the_loop() {
        let err = DocbuildError::CycleDetected(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Circular dependency detected: a -> b -> a");
        assert!(err.is_graph_error());
    }

    #[test]
    fn single_task_cycle_points_to_itself() {
        assert_eq!(format_cycle(&["a".to_string()]), "a -> a");
        assert_eq!(format_cycle(&[]), "");
    }

    #[test]
    fn task_execution_message_without_code() {
        let err = DocbuildError::TaskExecution {
            task: "build-html".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
        assert!(!err.is_graph_error());
    }
}
