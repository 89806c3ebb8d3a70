//! Timestamp based freshness checks
//!
//! Timestamps are read from disk on every call; nothing is cached between
//! checks or between runs.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::tasks::{FreshnessPolicy, Task};
use crate::types::DocbuildResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    UpToDate,
    Stale { reason: String },
}

impl Freshness {
    fn stale(reason: impl Into<String>) -> Self {
        Freshness::Stale {
            reason: reason.into(),
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Freshness::UpToDate)
    }
}

fn modified(path: &Path) -> DocbuildResult<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

/// A task is up to date when it declares outputs, all of them exist, and every
/// output is newer than every input.
///
/// `upstream` holds files written in this run by the task's dependencies. They
/// count as inputs even when the task does not declare them.
pub fn check_freshness(task: &Task, upstream: &[PathBuf]) -> DocbuildResult<Freshness> {
    if task.freshness == FreshnessPolicy::AlwaysStale {
        return Ok(Freshness::stale("always runs"));
    }
    if task.outputs.is_empty() {
        return Ok(Freshness::stale("no outputs declared"));
    }

    let mut oldest_output: Option<(SystemTime, PathBuf)> = None;
    for artifact in &task.outputs {
        let files = artifact.resolve()?;
        if files.is_empty() {
            return Ok(Freshness::stale(format!("output {} does not exist", artifact)));
        }
        for file in files {
            let time = modified(&file)?;
            if oldest_output.as_ref().map_or(true, |(t, _)| time < *t) {
                oldest_output = Some((time, file));
            }
        }
    }

    let mut newest_input: Option<(SystemTime, PathBuf)> = None;
    for artifact in &task.inputs {
        if let Some(path) = artifact.literal_path() {
            if !path.exists() {
                return Ok(Freshness::stale(format!("input {} does not exist", path.display())));
            }
        }
        for file in artifact.resolve()? {
            let time = modified(&file)?;
            if newest_input.as_ref().map_or(true, |(t, _)| time > *t) {
                newest_input = Some((time, file));
            }
        }
    }
    for file in upstream.iter().filter(|f| f.exists()) {
        let time = modified(file)?;
        if newest_input.as_ref().map_or(true, |(t, _)| time > *t) {
            newest_input = Some((time, file.clone()));
        }
    }

    let freshness = match (newest_input, oldest_output) {
        (Some((input_time, input)), Some((output_time, output))) if input_time >= output_time => {
            Freshness::stale(format!(
                "{} is not older than {}",
                input.display(),
                output.display()
            ))
        }
        _ => Freshness::UpToDate,
    };

    debug!(task = %task.name, ?freshness, "freshness checked");
    Ok(freshness)
}
