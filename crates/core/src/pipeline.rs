//! Standard document pipeline
//!
//! Registers the conventional targets (`init-build`, `define-environment`,
//! `compile-stylesheet`, `convert-tables`, `transform-math`, `build-html`,
//! `build-pdf-tex`, `build-jira`, `view-html`) plus any tasks declared in the
//! project configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifact::Artifact;
use crate::configs::project::ProjectConfig;
use crate::configs::tasks::{Command, TaskConfig};
use crate::environment::{EnvironmentResolver, Version, CONVERT_DIR_VAR, TOOLS_DIR_VAR};
use crate::graph::TaskGraph;
use crate::pandoc::{
    build_environment, ConventionalInputs, PandocInvocation, PandocSettings, SearchPaths,
};
use crate::tasks::{
    Action, EnvironmentCheck, LineFilter, ProcessSpec, Task, ToolRequirement,
};
use crate::types::{DocbuildError, DocbuildResult};

pub const INIT_BUILD: &str = "init-build";
pub const DEFINE_ENVIRONMENT: &str = "define-environment";
pub const COMPILE_STYLESHEET: &str = "compile-stylesheet";
pub const CONVERT_TABLES: &str = "convert-tables";
pub const TRANSFORM_MATH: &str = "transform-math";
pub const BUILD_HTML: &str = "build-html";
pub const BUILD_PDF_TEX: &str = "build-pdf-tex";
pub const BUILD_JIRA: &str = "build-jira";
pub const VIEW_HTML: &str = "view-html";

pub const DEFAULT_MINIMUM_PANDOC: Version = Version::new(2, 14, 0);

/// Project settings with every default applied and every path absolute
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub root: PathBuf,
    pub convert_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub data_dir: PathBuf,
    pub content_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub literature_dir: PathBuf,
    pub build_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub stylesheets_dir: PathBuf,
    pub main_document: PathBuf,
    pub output_name: String,

    pub pandoc: String,
    pub minimum_pandoc: Version,
    pub verbose: bool,
    pub fail_on_warning: bool,
    pub extra_args: BTreeMap<String, Vec<String>>,

    pub python: String,
    pub sass: String,
    pub browser_sync: String,

    pub tables_config: PathBuf,
    pub table_sources: Vec<String>,
    pub tables_parallel: bool,

    pub math_source: PathBuf,
    pub math_prefix: String,

    pub custom_tasks: Vec<TaskConfig>,
}

impl PipelineConfig {
    /// Apply defaults to `config`. The conversion and tools directories are
    /// resolved through `resolver` and must exist.
    pub fn resolve(config: &ProjectConfig, resolver: &EnvironmentResolver) -> DocbuildResult<Self> {
        let root = resolver.root().to_path_buf();
        let convert_dir = resolver.resolve_directory(CONVERT_DIR_VAR, "convert")?;
        let tools_dir = resolver.resolve_directory(TOOLS_DIR_VAR, "tools")?;

        let dirs = config.directories.clone().unwrap_or_default();
        let pandoc = config.pandoc.clone().unwrap_or_default();
        let tools = config.tools.clone().unwrap_or_default();
        let tables = config.tables.clone().unwrap_or_default();
        let math = config.math.clone().unwrap_or_default();

        let dir = |value: Option<String>, default: &str| root.join(value.as_deref().unwrap_or(default));
        let build_dir = dir(dirs.build, "build");
        let generated_dir = match dirs.generated {
            Some(generated) => root.join(generated),
            None => build_dir.join("generated"),
        };

        let minimum_pandoc = match pandoc.minimum_version {
            Some(v) => v.parse()?,
            None => DEFAULT_MINIMUM_PANDOC,
        };

        let resolve_tool =
            |value: Option<String>, default: &str| locate_tool(&root, &tools_dir, value.as_deref().unwrap_or(default));

        Ok(Self {
            data_dir: convert_dir.join("pandoc"),
            content_dir: dir(dirs.content, "content"),
            assets_dir: dir(dirs.assets, "assets"),
            literature_dir: dir(dirs.literature, "literature"),
            stylesheets_dir: dir(dirs.stylesheets, "css"),
            main_document: dir(config.main_document.clone(), "content/main.md"),
            output_name: config.output_name.clone().unwrap_or_else(|| "main".to_string()),

            pandoc: resolve_tool(pandoc.executable, "pandoc"),
            minimum_pandoc,
            verbose: pandoc.verbose.unwrap_or(true),
            fail_on_warning: pandoc.fail_on_warning.unwrap_or(true),
            extra_args: pandoc.extra_args.unwrap_or_default(),

            python: resolve_tool(tools.python, "python3"),
            sass: resolve_tool(tools.sass, "sass"),
            browser_sync: resolve_tool(tools.browser_sync, "browser-sync"),

            tables_config: dir(tables.config, "tables.json"),
            table_sources: tables
                .sources
                .unwrap_or_else(|| vec!["content/**/tables/*.html".to_string()]),
            tables_parallel: tables.parallel.unwrap_or(false),

            math_source: dir(math.source, "content/includes/math-macros.md"),
            math_prefix: math.prefix.unwrap_or_else(|| "\\".to_string()),

            custom_tasks: config.tasks.clone().unwrap_or_default(),

            build_dir,
            generated_dir,
            convert_dir,
            tools_dir,
            root,
        })
    }

    pub fn filters_dir(&self) -> PathBuf {
        self.data_dir.join("filters")
    }

    pub fn html_output(&self) -> PathBuf {
        self.build_dir.join("html").join(format!("{}.html", self.output_name))
    }

    pub fn stylesheet_output(&self) -> PathBuf {
        self.build_dir.join("html").join("css").join("main.css")
    }

    pub fn tex_output(&self) -> PathBuf {
        self.build_dir.join("pdf").join(format!("{}.tex", self.output_name))
    }

    pub fn jira_output(&self) -> PathBuf {
        self.build_dir.join("jira").join(format!("{}.jira", self.output_name))
    }

    pub fn tables_output_dir(&self) -> PathBuf {
        self.generated_dir.join("tables")
    }

    /// The math source with its extension renamed to `.tex`, below the generated directory
    pub fn math_output(&self) -> PathBuf {
        let stem = self
            .math_source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "math-macros".to_string());
        self.generated_dir.join(format!("{}.tex", stem))
    }

    /// Build the shared pandoc settings on top of the inherited environment
    pub fn pandoc_settings(&self, resolver: &EnvironmentResolver) -> DocbuildResult<Arc<PandocSettings>> {
        let paths = SearchPaths {
            python: vec![self.filters_dir(), self.convert_dir.join("scripts")],
            tex: vec![self.data_dir.join("latex"), self.generated_dir.clone()],
            lua: vec![self.filters_dir()],
        };
        Ok(Arc::new(PandocSettings {
            executable: self.pandoc.clone(),
            data_dir: self.data_dir.clone(),
            working_dir: self.root.clone(),
            env: build_environment(resolver.vars(), &self.root, &paths)?,
        }))
    }
}

/// Prefer a tool installed below the tools directory, otherwise rely on `PATH`
fn locate_tool(root: &Path, tools_dir: &Path, name: &str) -> String {
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return root.join(name).display().to_string();
    }
    [tools_dir.join("bin"), tools_dir.join("node_modules").join(".bin")]
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .map_or_else(|| name.to_string(), |found| found.display().to_string())
}

/// Register the standard targets and the project's own tasks
pub fn register_pipeline(
    graph: &mut TaskGraph,
    config: &PipelineConfig,
    settings: &PandocSettings,
) -> DocbuildResult<()> {
    graph.register_all(standard_tasks(config, settings))?;

    let custom = config
        .custom_tasks
        .iter()
        .map(|task| custom_task(task, config, settings))
        .collect::<DocbuildResult<Vec<_>>>()?;
    graph.register_all(custom)
}

fn standard_tasks(config: &PipelineConfig, settings: &PandocSettings) -> Vec<Task> {
    let inputs = ConventionalInputs {
        content: config.content_dir.clone(),
        assets: config.assets_dir.clone(),
        literature: config.literature_dir.clone(),
    };
    let conversion = |name: &str, format: &str, output: PathBuf| {
        let invocation = PandocInvocation {
            format: format.to_string(),
            verbose: config.verbose,
            fail_on_warning: config.fail_on_warning,
            extra_args: config.extra_args.get(format).cloned().unwrap_or_default(),
            output,
            input: config.main_document.clone(),
        };
        settings.conversion_task(name, &invocation, &inputs)
    };
    let build = |sub: &str| config.build_dir.join(sub);

    vec![
        Task::new(
            INIT_BUILD,
            Action::EnsureDirectories(vec![
                config.build_dir.clone(),
                config.generated_dir.clone(),
                config.tables_output_dir(),
                build("html"),
                build("pdf"),
                build("jira"),
            ]),
        )
        .group("setup")
        .description("Prepare the build directories")
        .always_stale(),
        Task::new(
            DEFINE_ENVIRONMENT,
            Action::CheckEnvironment(EnvironmentCheck {
                directories: vec![
                    ("content".to_string(), config.content_dir.clone()),
                    ("conversion".to_string(), config.convert_dir.clone()),
                    ("pandoc data".to_string(), config.data_dir.clone()),
                    ("filters".to_string(), config.filters_dir()),
                    ("tools".to_string(), config.tools_dir.clone()),
                ],
                tools: vec![ToolRequirement {
                    executable: config.pandoc.clone(),
                    minimum: config.minimum_pandoc,
                }],
                working_dir: config.root.clone(),
            }),
        )
        .group("setup")
        .description("Check required directories and toolchain versions")
        .depends_on(INIT_BUILD)
        .always_stale(),
        Task::new(
            COMPILE_STYLESHEET,
            Action::Process(ProcessSpec::new(&config.sass, &config.root).args([
                "--no-source-map".to_string(),
                config.stylesheets_dir.join("main.scss").display().to_string(),
                config.stylesheet_output().display().to_string(),
            ])),
        )
        .group("preprocess")
        .description("Compile the stylesheets")
        .depends_on(INIT_BUILD)
        .input(Artifact::glob(&config.stylesheets_dir, "**/*.scss"))
        .output(Artifact::path(config.stylesheet_output())),
        Task::new(CONVERT_TABLES, Action::Process(convert_tables_process(config, settings)))
            .group("preprocess")
            .description("Convert table sources into intermediate documents")
            .depends_on(DEFINE_ENVIRONMENT)
            .input(Artifact::path(&config.tables_config))
            .input(Artifact::path(config.convert_dir.join("scripts").join("convert-tables.py")))
            .inputs(
                config
                    .table_sources
                    .iter()
                    .map(|pattern| Artifact::glob(&config.root, pattern.clone())),
            )
            .output(Artifact::glob(config.tables_output_dir(), "**")),
        Task::new(
            TRANSFORM_MATH,
            Action::FilterLines(LineFilter {
                input: config.math_source.clone(),
                output: config.math_output(),
                prefix: config.math_prefix.clone(),
            }),
        )
        .group("preprocess")
        .description("Extract math macros for LaTeX")
        .depends_on(DEFINE_ENVIRONMENT)
        .input(Artifact::path(&config.math_source))
        .output(Artifact::path(config.math_output())),
        conversion(BUILD_HTML, "html", config.html_output())
            .depends_on(CONVERT_TABLES)
            .depends_on(COMPILE_STYLESHEET)
            .input(Artifact::glob(config.tables_output_dir(), "**"))
            .input(Artifact::path(config.stylesheet_output())),
        conversion(BUILD_PDF_TEX, "latex", config.tex_output())
            .depends_on(CONVERT_TABLES)
            .depends_on(TRANSFORM_MATH)
            .input(Artifact::glob(config.tables_output_dir(), "**"))
            .input(Artifact::path(config.math_output())),
        conversion(BUILD_JIRA, "jira", config.jira_output())
            .depends_on(CONVERT_TABLES)
            .depends_on(DEFINE_ENVIRONMENT)
            .input(Artifact::glob(config.tables_output_dir(), "**")),
        Task::new(VIEW_HTML, Action::Process(preview_process(config)))
            .group("view")
            .description("Serve the HTML output and reload on changes")
            .depends_on(BUILD_HTML)
            .always_stale(),
    ]
}

fn convert_tables_process(config: &PipelineConfig, settings: &PandocSettings) -> ProcessSpec {
    let script = config.convert_dir.join("scripts").join("convert-tables.py");
    let mut args = vec![
        script.display().to_string(),
        "--data-dir".to_string(),
        config.data_dir.display().to_string(),
        "--root-dir".to_string(),
        config.root.display().to_string(),
        "--config".to_string(),
        config.tables_config.display().to_string(),
    ];
    if config.tables_parallel {
        args.push("--parallel".to_string());
    }
    ProcessSpec::new(&config.python, &config.root)
        .args(args)
        .envs(settings.env.clone())
}

fn preview_process(config: &PipelineConfig) -> ProcessSpec {
    let html_dir = config.build_dir.join("html");
    ProcessSpec::new(&config.browser_sync, &config.root).args([
        "start".to_string(),
        "--server".to_string(),
        html_dir.display().to_string(),
        "--index".to_string(),
        format!("{}.html", config.output_name),
        "--files".to_string(),
        html_dir.join("*.html").display().to_string(),
        html_dir.join("css").join("*.css").display().to_string(),
    ])
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

fn artifact_for(root: &Path, value: &str) -> Artifact {
    if is_glob(value) {
        Artifact::glob(root, value)
    } else {
        Artifact::path(root.join(value))
    }
}

/// Turn a configured task into a process task; shell strings go through `sh -c`
fn custom_task(
    task: &TaskConfig,
    config: &PipelineConfig,
    settings: &PandocSettings,
) -> DocbuildResult<Task> {
    let working_dir = task
        .working_dir
        .as_ref()
        .map_or_else(|| config.root.clone(), |dir| config.root.join(dir));

    let spec = match &task.command {
        Command::Single(cmd) => ProcessSpec::new("sh", working_dir).args(["-c", cmd.as_str()]),
        Command::Multiple(cmds) => {
            let (program, args) = cmds.split_first().ok_or_else(|| {
                DocbuildError::Configuration(format!("Task '{}' has an empty command", task.name))
            })?;
            ProcessSpec::new(program, working_dir).args(args.iter().cloned())
        }
    };
    let spec = spec
        .envs(settings.env.clone())
        .envs(task.env.clone().unwrap_or_default());

    let mut built = Task::new(&task.name, Action::Process(spec))
        .group(task.group.clone().unwrap_or_else(|| "custom".to_string()))
        .description(task.description.clone().unwrap_or_default())
        .inputs(task.inputs.iter().flatten().map(|i| artifact_for(&config.root, i)));
    for output in task.outputs.iter().flatten() {
        built = built.output(artifact_for(&config.root, output));
    }
    for dependency in task.dependencies.iter().flatten() {
        built = built.depends_on(dependency);
    }
    if task.always_run.unwrap_or(false) {
        built = built.always_stale();
    }
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::project::parse_project_config;
    use std::collections::HashMap;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("convert/pandoc/filters")).unwrap();
        fs::create_dir_all(dir.path().join("tools")).unwrap();
        dir
    }

    fn pipeline(root: &Path, yaml: &str) -> (PipelineConfig, TaskGraph) {
        let resolver = EnvironmentResolver::new(root, HashMap::new());
        let config = PipelineConfig::resolve(&parse_project_config(yaml).unwrap(), &resolver).unwrap();
        let settings = config.pandoc_settings(&resolver).unwrap();
        let mut graph = TaskGraph::new();
        register_pipeline(&mut graph, &config, &settings).unwrap();
        (config, graph)
    }

    fn order(graph: &TaskGraph, target: &str) -> Vec<String> {
        graph
            .resolve_dependency_closure(&[target])
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }

    #[test]
    fn html_target_resolves_in_pipeline_order() {
        let dir = project();
        let (_, graph) = pipeline(dir.path(), "");
        assert_eq!(
            order(&graph, BUILD_HTML),
            vec![INIT_BUILD, DEFINE_ENVIRONMENT, CONVERT_TABLES, COMPILE_STYLESHEET, BUILD_HTML]
        );
    }

    #[test]
    fn html_conversion_reads_the_compiled_stylesheet() {
        let dir = project();
        let (config, graph) = pipeline(dir.path(), "");
        let html = graph.get(BUILD_HTML).unwrap();
        assert!(html
            .inputs
            .contains(&Artifact::path(config.stylesheet_output())));
        let stylesheet = graph.get(COMPILE_STYLESHEET).unwrap();
        assert_eq!(stylesheet.outputs, vec![Artifact::path(config.stylesheet_output())]);
    }

    #[test]
    fn pdf_and_jira_targets_use_their_prerequisites() {
        let dir = project();
        let (_, graph) = pipeline(dir.path(), "");
        assert_eq!(
            order(&graph, BUILD_PDF_TEX),
            vec![INIT_BUILD, DEFINE_ENVIRONMENT, CONVERT_TABLES, TRANSFORM_MATH, BUILD_PDF_TEX]
        );
        assert_eq!(
            order(&graph, BUILD_JIRA),
            vec![INIT_BUILD, DEFINE_ENVIRONMENT, CONVERT_TABLES, BUILD_JIRA]
        );
        assert_eq!(order(&graph, VIEW_HTML).last().map(String::as_str), Some(VIEW_HTML));
    }

    #[test]
    fn missing_convert_directory_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tools")).unwrap();
        let resolver = EnvironmentResolver::new(dir.path(), HashMap::new());
        let err = PipelineConfig::resolve(&ProjectConfig::default(), &resolver).unwrap_err();
        assert!(matches!(err, DocbuildError::Configuration(_)));
    }

    #[test]
    fn conversion_uses_format_defaults_and_extra_args() {
        let dir = project();
        let (config, graph) = pipeline(
            dir.path(),
            "pandoc:\n  verbose: false\n  extraArgs:\n    latex: [\"--top-level-division=chapter\"]\n",
        );
        let Action::Process(spec) = &graph.get(BUILD_PDF_TEX).unwrap().action else {
            panic!("conversion must be a process");
        };
        assert_eq!(spec.program, "pandoc");
        assert_eq!(spec.args[0], "--fail-if-warnings");
        assert_eq!(spec.args[1], format!("--data-dir={}", config.data_dir.display()));
        assert!(spec.args.contains(&"--defaults=pandoc-latex.yaml".to_string()));
        let tail = &spec.args[spec.args.len() - 4..];
        assert_eq!(tail[0], "--top-level-division=chapter");
        assert_eq!(tail[1], "-o");
        assert_eq!(tail[2], config.tex_output().display().to_string());
        assert_eq!(tail[3], config.main_document.display().to_string());
        assert_eq!(
            spec.env.get(crate::pandoc::ROOT_DIR_VAR).map(String::as_str),
            Some(dir.path().to_str().unwrap())
        );
    }

    #[test]
    fn math_output_renames_extension() {
        let dir = project();
        let (config, _) = pipeline(dir.path(), "math:\n  source: content/macros.html\n");
        assert_eq!(config.math_output(), config.generated_dir.join("macros.tex"));
    }

    #[test]
    fn tools_below_tools_directory_are_preferred() {
        let dir = project();
        fs::create_dir_all(dir.path().join("tools/node_modules/.bin")).unwrap();
        fs::write(dir.path().join("tools/node_modules/.bin/sass"), "").unwrap();
        let (config, _) = pipeline(dir.path(), "");
        assert_eq!(
            config.sass,
            dir.path().join("tools/node_modules/.bin/sass").display().to_string()
        );
        assert_eq!(config.python, "python3");
    }

    #[test]
    fn custom_tasks_join_the_graph() {
        let dir = project();
        let yaml = r#"
tasks:
  - name: publish
    description: Upload the HTML output
    command: ["rsync", "-a", "build/html/", "host:/srv/docs"]
    dependencies: [build-html]
    inputs: ["build/html/**"]
    alwaysRun: true
"#;
        let (_, graph) = pipeline(dir.path(), yaml);
        let publish = graph.get("publish").unwrap();
        assert_eq!(publish.group, "custom");
        assert_eq!(publish.inputs, vec![Artifact::glob(dir.path(), "build/html/**")]);
        assert_eq!(order(&graph, "publish").last().map(String::as_str), Some("publish"));
    }

    #[test]
    fn custom_task_cannot_shadow_standard_target() {
        let dir = project();
        let resolver = EnvironmentResolver::new(dir.path(), HashMap::new());
        let project = parse_project_config("tasks:\n  - name: build-html\n    command: \"true\"\n").unwrap();
        let config = PipelineConfig::resolve(&project, &resolver).unwrap();
        let settings = config.pandoc_settings(&resolver).unwrap();
        let mut graph = TaskGraph::new();
        let err = register_pipeline(&mut graph, &config, &settings).unwrap_err();
        assert!(matches!(err, DocbuildError::DuplicateTask(ref n) if n == BUILD_HTML));
    }
}
