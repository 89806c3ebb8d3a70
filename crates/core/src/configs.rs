//! Configuration parsing for the project build file and user-declared tasks

pub mod project;
pub mod tasks;
