use anyhow::Result;
use colored::*;
use pipewright_core::pipeline::PipelineManager;

pub fn execute(manager: &PipelineManager) -> Result<()> {
    println!("{}", "Alias Graph:".bold().underline());

    let result = manager.get_alias_graph();

    if result.aliases.is_empty() {
        println!("No aliases declared");
        return Ok(());
    }

    if !result.cycles.is_empty() {
        let cycles_description = result
            .cycles
            .iter()
            .map(|cycle| {
                let mut path = cycle.clone();
                if let Some(first) = path.first().cloned() {
                    path.push(first);
                }
                path.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");

        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!("Cyclic aliases detected: {}", cycles_description).yellow()
        );
    }

    for (alias, members) in &result.aliases {
        println!("{}", alias.blue().bold());

        if !members.is_empty() {
            println!("  {} {}", "runs:".dimmed(), members.join(" -> "));
        } else {
            println!("  {}", "no members".dimmed());
        }
        println!();
    }

    Ok(())
}
