//! Task execution module
//!
//! This module handles process invocation, freshness checks and the
//! incremental scheduler that runs a resolved task list.

pub mod command;
pub mod freshness;
pub mod runner;

pub use command::{ProcessInvoker, ProcessOutput};
pub use freshness::{check_freshness, Freshness};
pub use runner::{NullObserver, Scheduler, TaskObserver};
