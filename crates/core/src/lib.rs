//! docbuild Core Library
//!
//! This is the core library of the docbuild document pipeline. It turns a
//! Markdown source tree into HTML, LaTeX and Jira output by driving pandoc and
//! a few preprocessing tools through a task graph with incremental execution.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`build_manager`] - High-level interface used by the command line
//! - [`pipeline`] - The standard document targets and user-declared tasks
//! - [`pandoc`] - Pandoc argument and environment assembly
//! - [`graph`] - Task registration, dependency closure and cycle detection
//! - [`execution`] - Process invocation, freshness checks and the scheduler
//! - [`environment`] - Directory resolution and toolchain version checks
//! - [`tasks`] and [`artifact`] - The task model
//! - [`configs`] - Configuration parsing
//! - [`results`] - Result types for build operations
//! - [`types`] - Common error types and type aliases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docbuild_core::{BuildManager, BuildManagerConfig};
//! use docbuild_core::execution::NullObserver;
//! use std::path::PathBuf;
//!
//! # fn example() -> docbuild_core::types::DocbuildResult<()> {
//! let manager = BuildManager::new(BuildManagerConfig {
//!     project_root: PathBuf::from("."),
//! })?;
//!
//! let report = manager.run(&["build-pdf-tex".to_string()], &NullObserver)?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod build_manager;
pub mod configs;
pub mod environment;
pub mod execution;
pub mod graph;
pub mod pandoc;
pub mod pipeline;
pub mod results;
pub mod tasks;
pub mod types;

// Re-export the main types for easier usage
pub use build_manager::{BuildManager, BuildManagerConfig};
pub use types::{DocbuildError, DocbuildResult};
