use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::configs::tasks::TaskConfig;
use crate::types::DocbuildResult;

/// Contents of `.docbuild/config.yml`. Every field is optional; defaults follow
/// the conventional document layout.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub directories: Option<DirectoriesConfig>,
    /// Entry document handed to pandoc (default `content/main.md`)
    pub main_document: Option<String>,
    /// Base file name of the rendered outputs (default `main`)
    pub output_name: Option<String>,
    pub pandoc: Option<PandocConfig>,
    pub tools: Option<ToolsConfig>,
    pub tables: Option<TablesConfig>,
    pub math: Option<MathConfig>,
    pub tasks: Option<Vec<TaskConfig>>,
}

/// Directories relative to the project root
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DirectoriesConfig {
    /// Markdown sources (default `content`)
    pub content: Option<String>,
    /// Images and other media (default `assets`)
    pub assets: Option<String>,
    /// Bibliography files (default `literature`)
    pub literature: Option<String>,
    /// Rendered outputs (default `build`)
    pub build: Option<String>,
    /// Intermediate files such as converted tables (default `build/generated`)
    pub generated: Option<String>,
    /// Stylesheet sources (default `css`)
    pub stylesheets: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PandocConfig {
    /// Executable name or path (default `pandoc`)
    pub executable: Option<String>,
    /// Lowest accepted version (default `2.14`)
    pub minimum_version: Option<String>,
    /// Pass `--verbose` (default true)
    pub verbose: Option<bool>,
    /// Pass `--fail-if-warnings` (default true)
    pub fail_on_warning: Option<bool>,
    /// Extra arguments per export format, appended after the defaults files
    pub extra_args: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolsConfig {
    /// Interpreter for the conversion scripts (default `python3`)
    pub python: Option<String>,
    /// Stylesheet compiler (default `sass`)
    pub sass: Option<String>,
    /// Preview server (default `browser-sync`)
    pub browser_sync: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TablesConfig {
    /// Table conversion config handed to the script (default `tables.json`)
    pub config: Option<String>,
    /// Glob patterns of table sources (default `content/**/tables/*.html`)
    pub sources: Option<Vec<String>>,
    /// Let the script convert files in parallel (default false)
    pub parallel: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MathConfig {
    /// File holding the math macro definitions (default `content/includes/math-macros.md`)
    pub source: Option<String>,
    /// Lines starting with this marker are kept (default `\`)
    pub prefix: Option<String>,
}

pub fn parse_project_config(yaml_str: &str) -> DocbuildResult<ProjectConfig> {
    // An empty file deserializes to unit, not to an empty mapping
    if yaml_str.trim().is_empty() {
        return Ok(ProjectConfig::default());
    }
    let config: ProjectConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}
