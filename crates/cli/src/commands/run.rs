use std::process::ExitCode;

use anyhow::Result;
use colored::*;
use docbuild_core::execution::TaskObserver;
use docbuild_core::results::{BuildFailure, BuildReport, ExecutionResult, TaskStatus};
use docbuild_core::tasks::Task;
use docbuild_core::BuildManager;

use crate::exit_status;
use crate::style::label_color;

/// Prints a banner per task as the build progresses
struct ConsoleReporter;

impl TaskObserver for ConsoleReporter {
    fn task_started(&self, task: &Task) {
        println!();
        println!(
            "┌─ {} {}",
            format!("Running task '{}'", task.name).bold(),
            format!("[{}]", task.group).color(label_color(&task.group)).bold()
        );
        if !task.description.is_empty() {
            println!("│  {}", task.description.bright_black());
        }
    }

    fn task_finished(&self, task: &Task, result: &ExecutionResult) {
        match result.status {
            TaskStatus::UpToDate => println!(
                "{} {} {}",
                "·".bright_black(),
                task.name.color(label_color(&task.group)),
                format!("up to date, {} bytes", result.output_bytes).bright_black()
            ),
            TaskStatus::Succeeded => {
                if let Some(stdout) = result.stdout.as_deref().filter(|s| !s.is_empty()) {
                    print!("{}", stdout);
                }
                println!(
                    "└─ {} {} {}",
                    "✓".green().bold(),
                    "done".green(),
                    format!(
                        "in {:.2?}, {} bytes written",
                        result.duration, result.output_bytes
                    )
                    .bright_black()
                );
            }
            TaskStatus::Failed => println!("└─ {} {}", "✗".red().bold(), "failed".red()),
        }
    }
}

pub fn execute(manager: &BuildManager, targets: &[String]) -> Result<ExitCode> {
    println!("{} {}", "Building".bold(), targets.join(", ").cyan());

    let report = manager.run(targets, &ConsoleReporter)?;

    println!();
    if let Some(failure) = &report.failure {
        print_failure(failure);
        return Ok(ExitCode::from(exit_status(&failure.error)));
    }

    for (target, bytes) in target_sizes(&report, targets) {
        println!("  {} {}", target.bold(), format!("{} bytes", bytes).bright_black());
    }
    let skipped = report.tasks_with_status(TaskStatus::UpToDate).len();
    println!(
        "{} {} {}",
        "✓".green().bold(),
        "All tasks completed successfully!".green().bold(),
        format!("({} up to date)", skipped).bright_black()
    );
    Ok(ExitCode::SUCCESS)
}

fn print_failure(failure: &BuildFailure) {
    eprintln!(
        "{} {}",
        "✗".red().bold(),
        format!("Task '{}' failed: {}", failure.task, failure.error)
            .red()
            .bold()
    );
    if !failure.dependents.is_empty() {
        eprintln!(
            "  {} {}",
            "Not built:".bright_black(),
            describe_dependents(&failure.dependents)
        );
    }
}

/// Output size of each requested target, whether it ran or was up to date
fn target_sizes<'a>(report: &'a BuildReport, targets: &'a [String]) -> Vec<(&'a str, u64)> {
    targets
        .iter()
        .filter_map(|target| {
            report
                .result(target)
                .map(|result| (target.as_str(), result.output_bytes))
        })
        .collect()
}

// Dependents form a set, not a chain
fn describe_dependents(dependents: &[String]) -> String {
    dependents.join(", ")
}
