use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum Command {
    /// Run through `sh -c`
    Single(String),
    /// Executable followed by its arguments
    Multiple(Vec<String>),
}

/// A task declared in the project configuration in addition to the standard pipeline
#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    pub group: Option<String>,
    pub command: Command,
    pub dependencies: Option<Vec<String>>,
    /// Paths or glob patterns relative to the project root
    pub inputs: Option<Vec<String>>,
    /// Paths or glob patterns relative to the project root
    pub outputs: Option<Vec<String>>,
    /// Skip the timestamp check and run on every invocation
    pub always_run: Option<bool>,
    pub working_dir: Option<String>,
    pub env: Option<BTreeMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_command_forms() {
        let yaml = r#"
- name: lint
  command: "markdownlint content"
- name: spell
  command: ["cspell", "content/**/*.md"]
  inputs: ["content/**/*.md"]
  alwaysRun: true
"#;
        let tasks: Vec<TaskConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tasks[0].command, Command::Single("markdownlint content".to_string()));
        assert_eq!(
            tasks[1].command,
            Command::Multiple(vec!["cspell".to_string(), "content/**/*.md".to_string()])
        );
        assert_eq!(tasks[1].always_run, Some(true));
    }

    #[test]
    fn rejects_unknown_fields() {
        let yaml = "name: x\ncommand: echo\nscript: nope\n";
        assert!(serde_yaml::from_str::<TaskConfig>(yaml).is_err());
    }
}
