use anyhow::Result;
use colored::*;
use docbuild_core::results::TaskInfo;
use docbuild_core::BuildManager;

use crate::style::label_color;

pub fn execute(manager: &BuildManager) -> Result<()> {
    let tasks = manager.list_tasks();

    println!("{}", "Tasks".bold().underline());
    if tasks.is_empty() {
        println!("  {}", "No tasks registered".dimmed());
        return Ok(());
    }

    // Groups in order of first appearance
    let mut groups: Vec<(&str, Vec<&TaskInfo>)> = Vec::new();
    for task in &tasks {
        match groups.iter().position(|(name, _)| *name == task.group) {
            Some(i) => groups[i].1.push(task),
            None => groups.push((task.group.as_str(), vec![task])),
        }
    }

    for (group, members) in groups {
        println!();
        println!("{}", group.color(label_color(group)).bold());
        for task in members {
            if task.description.is_empty() {
                println!("  {}", task.name.blue().bold());
            } else {
                println!("  {}  {}", task.name.blue().bold(), task.description.dimmed());
            }
        }
    }

    Ok(())
}
