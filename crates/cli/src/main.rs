use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use docbuild_core::{BuildManager, BuildManagerConfig, DocbuildError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod style;

/// docbuild - incremental document builds on top of pandoc
#[derive(Parser)]
#[command(name = "docbuild")]
#[command(about = "Build HTML, LaTeX and Jira documents from Markdown sources")]
#[command(version)]
struct Cli {
    /// Path to the project root (defaults to current directory)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// More log output; repeat for more detail. RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build one or more targets and everything they depend on
    Run {
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Show the execution order for targets without running anything
    Plan {
        #[arg(required = true)]
        targets: Vec<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every registered task
    List,
    /// Show the task dependency graph
    Graph,
    /// Print the JSON schema of .docbuild/config.yml
    Schema,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            match err.downcast_ref::<DocbuildError>() {
                Some(docbuild_error) => ExitCode::from(exit_status(docbuild_error)),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    if let Commands::Schema = cli.command {
        commands::schema::execute()?;
        return Ok(ExitCode::SUCCESS);
    }

    debug!(root = %cli.root.display(), "loading project");
    let manager = BuildManager::new(BuildManagerConfig {
        project_root: cli.root,
    })?;

    match cli.command {
        Commands::Run { targets } => commands::run::execute(&manager, &targets),
        Commands::Plan { targets, json } => {
            commands::plan::execute(&manager, &targets, json).map(|_| ExitCode::SUCCESS)
        }
        Commands::List => commands::list::execute(&manager).map(|_| ExitCode::SUCCESS),
        Commands::Graph => commands::graph::execute(&manager).map(|_| ExitCode::SUCCESS),
        Commands::Schema => Ok(ExitCode::SUCCESS),
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Process exit status for an error that ended the build
pub(crate) fn exit_status(error: &DocbuildError) -> u8 {
    match error {
        DocbuildError::Configuration(_) | DocbuildError::Yaml(_) | DocbuildError::Glob(_) => 2,
        DocbuildError::Toolchain(_) => 3,
        e if e.is_graph_error() => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_requires_a_target() {
        assert!(Cli::try_parse_from(["docbuild", "run"]).is_err());
        let cli = Cli::try_parse_from(["docbuild", "-vv", "run", "build-html", "build-jira"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run { targets } => assert_eq!(targets, vec!["build-html", "build-jira"]),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn errors_map_to_distinct_exit_statuses() {
        assert_eq!(exit_status(&DocbuildError::Configuration("x".into())), 2);
        assert_eq!(exit_status(&DocbuildError::Toolchain("x".into())), 3);
        assert_eq!(exit_status(&DocbuildError::UnknownTask("x".into())), 4);
        assert_eq!(
            exit_status(&DocbuildError::CycleDetected(vec!["a".into(), "b".into()])),
            4
        );
        assert_eq!(
            exit_status(&DocbuildError::TaskExecution {
                task: "build-html".into(),
                code: Some(1)
            }),
            1
        );
    }
}
