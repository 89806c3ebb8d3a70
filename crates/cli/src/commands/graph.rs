use anyhow::Result;
use colored::*;
use docbuild_core::types::format_cycle;
use docbuild_core::BuildManager;

pub fn execute(manager: &BuildManager) -> Result<()> {
    println!("{}", "Task Dependency Graph:".bold().underline());

    let result = manager.dependency_graph();

    if !result.cycles.is_empty() {
        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!(
                "Circular dependencies detected: {}",
                describe_cycles(&result.cycles)
            )
            .yellow()
        );
    }

    let graph = &result.graph;
    for node_index in graph.node_indices() {
        println!("{}", graph[node_index].blue().bold());

        // Edges were added in declaration order; neighbors come back reversed
        let mut deps: Vec<&str> = graph
            .neighbors(node_index)
            .map(|neighbor| graph[neighbor].as_str())
            .collect();
        deps.reverse();

        if deps.is_empty() {
            println!("  {}", "no dependencies".dimmed());
        } else {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        }
        println!();
    }

    Ok(())
}

fn describe_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| format_cycle(cycle))
        .collect::<Vec<_>>()
        .join("; ")
}
