//! Environment resolution
//!
//! Locates the directories the pipeline depends on and gates the build on
//! toolchain versions. The variable table is captured once when the resolver
//! is created and never written back to the process environment.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::execution::command::ProcessInvoker;
use crate::tasks::ProcessSpec;
use crate::types::{DocbuildError, DocbuildResult};

/// Selects the directory with conversion scripts and pandoc data
pub const CONVERT_DIR_VAR: &str = "DOCBUILD_CONVERT_DIR";
/// Selects the directory with auxiliary tools
pub const TOOLS_DIR_VAR: &str = "DOCBUILD_TOOLS_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = DocbuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
            .ok_or_else(|| DocbuildError::Configuration(format!("Invalid version '{}'", s)))
    }
}

#[allow(clippy::unwrap_used)] // literal pattern
fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|[^\d.])(\d+)\.(\d+)(?:\.(\d+))?").unwrap())
}

/// Extract the first `major.minor[.patch]` token from tool output
pub fn parse_version(text: &str) -> Option<Version> {
    let captures = version_pattern().captures(text)?;
    let number = |i: usize| -> Option<u64> {
        captures
            .get(i)
            .map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(Version::new(number(1)?, number(2)?, number(3)?))
}

/// Run `executable --version` and parse the reported version
pub fn resolve_executable_version(
    invoker: &ProcessInvoker,
    executable: &str,
    working_dir: &Path,
) -> DocbuildResult<Version> {
    let spec = ProcessSpec::new(executable, working_dir)
        .args(["--version"])
        .capture_output();

    let output = invoker.run(&spec).map_err(|e| {
        DocbuildError::Toolchain(format!("'{}' is not available: {}", executable, e))
    })?;

    if !output.success() {
        return Err(DocbuildError::Toolchain(format!(
            "'{} --version' exited with code {:?}",
            executable, output.exit_code
        )));
    }

    let text = output.stdout.unwrap_or_default();
    parse_version(&text).ok_or_else(|| {
        DocbuildError::Toolchain(format!(
            "Could not parse a version from '{} --version' output: {}",
            executable,
            text.lines().next().unwrap_or_default()
        ))
    })
}

/// Fail with a toolchain error when `executable` is older than `minimum`
pub fn require_minimum_version(
    invoker: &ProcessInvoker,
    executable: &str,
    minimum: Version,
    working_dir: &Path,
) -> DocbuildResult<Version> {
    let version = resolve_executable_version(invoker, executable, working_dir)?;
    if version < minimum {
        return Err(DocbuildError::Toolchain(format!(
            "'{}' version {} is below the required minimum {}",
            executable, version, minimum
        )));
    }
    info!(%executable, %version, "toolchain version accepted");
    Ok(version)
}

/// Resolves project directories from environment variables with fallbacks
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    root: PathBuf,
    vars: HashMap<String, String>,
}

impl EnvironmentResolver {
    pub fn new(root: impl Into<PathBuf>, vars: HashMap<String, String>) -> Self {
        Self {
            root: root.into(),
            vars,
        }
    }

    /// Snapshot the current process environment
    pub fn from_process(root: impl Into<PathBuf>) -> Self {
        Self::new(root, std::env::vars().collect())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Use `variable` if it is set and non-empty, otherwise `default_relative`
    /// below the project root. The result must exist.
    pub fn resolve_directory(
        &self,
        variable: &str,
        default_relative: &str,
    ) -> DocbuildResult<PathBuf> {
        let configured = self
            .vars
            .get(variable)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());

        let path = match configured {
            Some(value) => self.root.join(value),
            None => self.root.join(default_relative),
        };

        if !path.is_dir() {
            let origin = match configured {
                Some(_) => format!("from ${}", variable),
                None => format!("default, ${} is not set", variable),
            };
            return Err(DocbuildError::Configuration(format!(
                "Directory '{}' ({}) does not exist",
                path.display(),
                origin
            )));
        }

        debug!(%variable, path = %path.display(), "resolved directory");
        Ok(path)
    }
}
