use anyhow::Result;
use colored::*;
use docbuild_core::BuildManager;

pub fn execute(manager: &BuildManager, targets: &[String], json: bool) -> Result<()> {
    let plan = manager.plan(targets)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{} {}", "Execution plan for".bold(), targets.join(", ").cyan());
    println!("\n{}:", "Execution order".bold());
    for (i, step) in plan.steps.iter().enumerate() {
        let always = if step.always_runs {
            " (always runs)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  {}. {}{}", i + 1, step.name.bold(), always);
        println!("     {}", step.action.bright_black());
    }

    Ok(())
}
