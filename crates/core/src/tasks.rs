//! Task model
//!
//! A [`Task`] is a named unit of work with declared input and output
//! artifacts, upstream dependencies and an [`Action`]. Tasks are built once
//! while the graph is assembled and never change afterwards.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::environment::Version;

/// Group used when a task does not declare one
pub const DEFAULT_GROUP: &str = "other";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessPolicy {
    /// Run on every invocation
    AlwaysStale,
    /// Run only when an input is newer than the outputs
    TimestampBased,
}

/// External process invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Applied on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub capture_output: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
            capture_output: false,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn capture_output(mut self) -> Self {
        self.capture_output = true;
        self
    }

    /// Human readable command line, used in logs and plans
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Copy `input` to `output`, keeping only lines that start with `prefix`
#[derive(Debug, Clone, PartialEq)]
pub struct LineFilter {
    pub input: PathBuf,
    pub output: PathBuf,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequirement {
    pub executable: String,
    pub minimum: Version,
}

/// Directories that must exist and tools that must be recent enough
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvironmentCheck {
    pub directories: Vec<(String, PathBuf)>,
    pub tools: Vec<ToolRequirement>,
    /// Where version probes are run
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Process(ProcessSpec),
    FilterLines(LineFilter),
    EnsureDirectories(Vec<PathBuf>),
    CheckEnvironment(EnvironmentCheck),
}

impl Action {
    /// Short description for plans and logs
    pub fn summary(&self) -> String {
        match self {
            Action::Process(spec) => spec.command_line(),
            Action::FilterLines(filter) => format!(
                "filter lines starting with '{}' from {} into {}",
                filter.prefix,
                filter.input.display(),
                filter.output.display()
            ),
            Action::EnsureDirectories(dirs) => format!("create {} directories", dirs.len()),
            Action::CheckEnvironment(check) => format!(
                "check {} directories and {} tools",
                check.directories.len(),
                check.tools.len()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub group: String,
    pub description: String,
    pub inputs: Vec<Artifact>,
    pub outputs: Vec<Artifact>,
    pub depends_on: Vec<String>,
    pub action: Action,
    pub freshness: FreshnessPolicy,
}

impl Task {
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            group: DEFAULT_GROUP.to_string(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
            action,
            freshness: FreshnessPolicy::TimestampBased,
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input(mut self, artifact: Artifact) -> Self {
        self.inputs.push(artifact);
        self
    }

    pub fn inputs(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        self.inputs.extend(artifacts);
        self
    }

    pub fn output(mut self, artifact: Artifact) -> Self {
        self.outputs.push(artifact);
        self
    }

    pub fn depends_on(mut self, task: impl Into<String>) -> Self {
        self.depends_on.push(task.into());
        self
    }

    pub fn always_stale(mut self) -> Self {
        self.freshness = FreshnessPolicy::AlwaysStale;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_declaration_order() {
        let task = Task::new("t", Action::EnsureDirectories(vec![]))
            .depends_on("b")
            .depends_on("a")
            .input(Artifact::path("x"))
            .input(Artifact::path("y"));
        assert_eq!(task.depends_on, vec!["b", "a"]);
        assert_eq!(task.inputs, vec![Artifact::path("x"), Artifact::path("y")]);
        assert_eq!(task.group, DEFAULT_GROUP);
        assert_eq!(task.freshness, FreshnessPolicy::TimestampBased);
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let spec = ProcessSpec::new("pandoc", ".").args(["--verbose", "-o", "out.html"]);
        assert_eq!(spec.command_line(), "pandoc --verbose -o out.html");
        assert_eq!(Action::Process(spec).summary(), "pandoc --verbose -o out.html");
    }
}
