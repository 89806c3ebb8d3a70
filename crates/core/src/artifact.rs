//! Files tracked as task inputs and outputs
//!
//! An [`Artifact`] is either a literal path or a glob pattern below a base
//! directory. Resolution always hits the filesystem, so files generated by a
//! task earlier in the same run are picked up by later tasks.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use crate::types::DocbuildResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A single file, or every file below a directory
    Path(PathBuf),
    /// Files below `base` whose relative path matches `pattern`
    Glob { base: PathBuf, pattern: String },
}

impl Artifact {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Artifact::Path(path.into())
    }

    pub fn glob(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Artifact::Glob {
            base: base.into(),
            pattern: pattern.into(),
        }
    }

    /// The literal path, if this artifact is not a glob
    pub fn literal_path(&self) -> Option<&Path> {
        match self {
            Artifact::Path(path) => Some(path),
            Artifact::Glob { .. } => None,
        }
    }

    /// Resolve to the set of existing files, sorted
    pub fn resolve(&self) -> DocbuildResult<Vec<PathBuf>> {
        let mut files = match self {
            Artifact::Path(path) if path.is_file() => vec![path.clone()],
            Artifact::Path(path) if path.is_dir() => walk_files(path, None)?,
            Artifact::Path(_) => Vec::new(),
            Artifact::Glob { base, pattern } => {
                let matcher = Glob::new(pattern)?.compile_matcher();
                walk_files(base, Some(&matcher))?
            }
        };
        files.sort();
        Ok(files)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Path(path) => write!(f, "{}", path.display()),
            Artifact::Glob { base, pattern } => write!(f, "{}/{}", base.display(), pattern),
        }
    }
}

fn walk_files(root: &Path, matcher: Option<&GlobMatcher>) -> DocbuildResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.is_dir() {
        return Ok(files);
    }

    let mut queue = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(current_dir) = queue.pop_front() {
        for entry in std::fs::read_dir(&current_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                queue.push_back(path);
                continue;
            }

            let relative_path = path.strip_prefix(root).unwrap_or(&path);
            if matcher.map_or(true, |m| m.is_match(relative_path)) {
                files.push(path);
            }
        }
    }

    Ok(files)
}
