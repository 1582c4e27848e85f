use anyhow::Result;
use colored::*;
use pipewright_core::pipeline::PipelineManager;
use pipewright_core::tasks::get_task_color;

pub fn execute(manager: &PipelineManager, tasks: &[String]) -> Result<()> {
    // Get execution plan from pipeline manager
    let execution_plan = manager
        .get_execution_plan(tasks)
        .map_err(|e| anyhow::anyhow!("Failed to get execution plan: {}", e))?;

    println!(
        "{} {}",
        "Execution plan for".bold(),
        execution_plan.requested.join(" ").cyan()
    );

    println!("\n{}:", "Execution order".bold());
    for (i, leaf) in execution_plan.leaves.iter().enumerate() {
        println!("  {}. {}", i + 1, leaf.color(get_task_color(leaf)));
    }

    if execution_plan.leaves.is_empty() {
        println!("  {}", "Nothing to run".dimmed());
    }

    Ok(())
}
