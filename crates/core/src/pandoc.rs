//! Pandoc invocation builder
//!
//! Turns an export format into a pandoc command line and a task. The argument
//! order is fixed: pandoc applies later `--defaults` files on top of earlier
//! ones and the last occurrence of a flag wins, so the order decides the
//! output.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::artifact::Artifact;
use crate::tasks::{Action, ProcessSpec, Task};
use crate::types::{DocbuildError, DocbuildResult};

/// Set for every child so filters and scripts can locate the project
pub const ROOT_DIR_VAR: &str = "DOCBUILD_ROOT_DIR";

/// Defaults files layered before and after the format specific one
const DIRS_DEFAULTS: &str = "pandoc-dirs.yaml";
const GENERAL_DEFAULTS: &str = "pandoc-general.yaml";
const FILTERS_DEFAULTS: &str = "pandoc-filters.yaml";

/// Common pandoc arguments for `export_format`, without input and output
pub fn build_args(
    export_format: &str,
    verbose: bool,
    fail_on_warning: bool,
    data_dir: &str,
) -> Vec<String> {
    let mut args = Vec::with_capacity(7);
    if fail_on_warning {
        args.push("--fail-if-warnings".to_string());
    }
    if verbose {
        args.push("--verbose".to_string());
    }
    args.push(format!("--data-dir={}", data_dir));
    for defaults in [
        DIRS_DEFAULTS.to_string(),
        GENERAL_DEFAULTS.to_string(),
        format!("pandoc-{}.yaml", export_format),
        FILTERS_DEFAULTS.to_string(),
    ] {
        args.push(format!("--defaults={}", defaults));
    }
    args
}

/// Directories appended to the search path variables of the conversion tools
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    /// Auxiliary python scripts and filters (`PYTHONPATH`)
    pub python: Vec<PathBuf>,
    /// TeX macros and packages (`TEXINPUTS`)
    pub tex: Vec<PathBuf>,
    /// Lua filters (`LUA_PATH`)
    pub lua: Vec<PathBuf>,
}

/// Start from `base` (the inherited environment), set the root marker and
/// extend the search path variables. Existing values are kept in front.
pub fn build_environment(
    base: &HashMap<String, String>,
    root: &Path,
    paths: &SearchPaths,
) -> DocbuildResult<BTreeMap<String, String>> {
    let mut env: BTreeMap<String, String> = base
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    env.insert(ROOT_DIR_VAR.to_string(), root.display().to_string());

    for (variable, dirs) in [("PYTHONPATH", &paths.python), ("TEXINPUTS", &paths.tex)] {
        if dirs.is_empty() {
            continue;
        }
        let extended = extend_search_path(env.get(variable).map(String::as_str), dirs)?;
        env.insert(variable.to_string(), extended);
    }

    if !paths.lua.is_empty() {
        // Lua separates templates with ';' on every platform
        let mut entries: Vec<String> = env
            .get("LUA_PATH")
            .filter(|v| !v.is_empty())
            .map(|v| vec![v.trim_end_matches(';').to_string()])
            .unwrap_or_default();
        for dir in &paths.lua {
            entries.push(format!("{0}/?;{0}/?.lua", dir.display()));
        }
        env.insert("LUA_PATH".to_string(), entries.join(";"));
    }

    Ok(env)
}

fn extend_search_path(existing: Option<&str>, dirs: &[PathBuf]) -> DocbuildResult<String> {
    let mut all: Vec<PathBuf> = existing
        .filter(|v| !v.is_empty())
        .map(|v| std::env::split_paths(v).collect())
        .unwrap_or_default();
    all.extend(dirs.iter().cloned());

    let joined = std::env::join_paths(&all).map_err(|e| {
        DocbuildError::Configuration(format!("Cannot build search path: {}", e))
    })?;
    Ok(joined.to_string_lossy().into_owned())
}

/// Shared, read-only settings of every conversion task
#[derive(Debug, Clone)]
pub struct PandocSettings {
    pub executable: String,
    pub data_dir: PathBuf,
    pub working_dir: PathBuf,
    /// Complete environment handed to pandoc
    pub env: BTreeMap<String, String>,
}

/// Conventional directories every conversion reads from
#[derive(Debug, Clone)]
pub struct ConventionalInputs {
    pub content: PathBuf,
    pub assets: PathBuf,
    pub literature: PathBuf,
}

/// One pandoc run: format specific flags plus input and output
#[derive(Debug, Clone)]
pub struct PandocInvocation {
    pub format: String,
    pub verbose: bool,
    pub fail_on_warning: bool,
    pub extra_args: Vec<String>,
    pub output: PathBuf,
    pub input: PathBuf,
}

impl PandocInvocation {
    /// Full argument vector; output flag, output path and input path come last
    pub fn args(&self, settings: &PandocSettings) -> Vec<String> {
        let mut args = build_args(
            &self.format,
            self.verbose,
            self.fail_on_warning,
            &settings.data_dir.display().to_string(),
        );
        args.extend(self.extra_args.iter().cloned());
        args.push("-o".to_string());
        args.push(self.output.display().to_string());
        args.push(self.input.display().to_string());
        args
    }
}

impl PandocSettings {
    pub fn filters_dir(&self) -> PathBuf {
        self.data_dir.join("filters")
    }

    pub fn defaults_dir(&self) -> PathBuf {
        self.data_dir.join("defaults")
    }

    /// [`ProcessSpec`] running pandoc with the shared environment
    pub fn process(&self, args: Vec<String>) -> ProcessSpec {
        ProcessSpec::new(&self.executable, &self.working_dir)
            .args(args)
            .envs(self.env.clone())
    }

    /// A task converting `invocation.input` into `invocation.output`. The
    /// conventional directories, the defaults and the filters are declared as
    /// inputs so any change there triggers a rebuild. They are globs, so a
    /// project without e.g. a literature directory is not rebuilt every time.
    pub fn conversion_task(
        &self,
        name: &str,
        invocation: &PandocInvocation,
        inputs: &ConventionalInputs,
    ) -> Task {
        Task::new(name, Action::Process(self.process(invocation.args(self))))
            .group("build")
            .description(format!(
                "Convert {} to {}",
                invocation.input.display(),
                invocation.format
            ))
            .input(Artifact::path(&invocation.input))
            .inputs(
                [
                    &inputs.content,
                    &inputs.assets,
                    &inputs.literature,
                    &self.defaults_dir(),
                    &self.filters_dir(),
                ]
                .into_iter()
                .map(|dir| Artifact::glob(dir, "**")),
            )
            .output(Artifact::path(&invocation.output))
    }
}
