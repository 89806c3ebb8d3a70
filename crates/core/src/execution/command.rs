//! Process invocation
//!
//! Runs external executables with an argument vector, working directory and an
//! environment overlay, blocking until the child exits.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::tasks::ProcessSpec;
use crate::types::{DocbuildError, DocbuildResult};

/// Exit status and optionally captured standard output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }

    /// Spawn the process and wait for it. A non-zero exit is not an error here.
    pub fn run(&self, spec: &ProcessSpec) -> DocbuildResult<ProcessOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(&spec.env);

        debug!(
            command = %spec.command_line(),
            cwd = %spec.working_dir.display(),
            "spawning process"
        );

        let spawn_error = |source| DocbuildError::ProcessSpawn {
            program: spec.program.clone(),
            source,
        };

        if spec.capture_output {
            let output = command
                .stdin(Stdio::inherit())
                .stderr(Stdio::inherit())
                .output()
                .map_err(spawn_error)?;
            Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: Some(String::from_utf8_lossy(&output.stdout).into_owned()),
            })
        } else {
            let status = command.status().map_err(spawn_error)?;
            Ok(ProcessOutput {
                exit_code: status.code(),
                stdout: None,
            })
        }
    }

    /// Like [`ProcessInvoker::run`], but a non-zero exit fails the owning task
    pub fn run_checked(&self, task: &str, spec: &ProcessSpec) -> DocbuildResult<ProcessOutput> {
        let output = self.run(spec)?;
        if !output.success() {
            return Err(DocbuildError::TaskExecution {
                task: task.to_string(),
                code: output.exit_code,
            });
        }
        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sh(script: &str, dir: &std::path::Path) -> ProcessSpec {
        ProcessSpec::new("sh", dir).args(["-c", script])
    }

    #[test]
    fn captures_stdout_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessInvoker::new()
            .run(&sh("echo hello", dir.path()).capture_output())
            .unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.as_deref(), Some("hello\n"));
    }

    #[test]
    fn overlay_extends_inherited_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("DOCBUILD_TEST_VALUE".to_string(), "42".to_string());
        let spec = sh("echo \"$DOCBUILD_TEST_VALUE:${PATH:+has-path}\"", dir.path())
            .envs(env)
            .capture_output();

        let output = ProcessInvoker::new().run(&spec).unwrap();
        assert_eq!(output.stdout.as_deref(), Some("42:has-path\n"));
    }

    #[test]
    fn runs_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        ProcessInvoker::new()
            .run(&sh("echo x > marker.txt", dir.path()))
            .unwrap();
        assert!(dir.path().join("marker.txt").exists());
    }

    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessInvoker::new().run(&sh("exit 3", dir.path())).unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());

        let err = ProcessInvoker::new()
            .run_checked("convert-tables", &sh("exit 3", dir.path()))
            .unwrap_err();
        assert!(matches!(
            err,
            DocbuildError::TaskExecution { ref task, code: Some(3) } if task == "convert-tables"
        ));
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ProcessSpec::new("definitely-not-a-real-binary-4711", dir.path());
        let err = ProcessInvoker::new().run(&spec).unwrap_err();
        assert!(matches!(err, DocbuildError::ProcessSpawn { .. }));
    }
}
