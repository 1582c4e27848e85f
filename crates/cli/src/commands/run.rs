use anyhow::Result;
use colored::*;
use pipewright_core::pipeline::{PipelineManager, RunOptions};
use pipewright_core::results::TaskStatus;

pub async fn execute(manager: &PipelineManager, tasks: &[String], options: RunOptions) -> Result<()> {
    let requested = if tasks.is_empty() {
        manager.default_task().to_string()
    } else {
        tasks.join(" ")
    };
    println!("{} {}", "Running".bold(), requested.cyan());
    if let Some(env) = &options.environment {
        println!("{} {}", "Environment".bold(), env.yellow());
    }
    println!();

    let report = manager
        .run_tasks(tasks, &options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run tasks: {}", e))?;

    println!();
    println!("{}", "Summary".bold().underline());
    for result in &report.results {
        let marker = match &result.status {
            TaskStatus::Succeeded => "✓".green().bold(),
            TaskStatus::Failed { .. } => "✗".red().bold(),
            TaskStatus::Skipped => "-".dimmed(),
        };
        println!(
            "  {} {} {}",
            marker,
            result.name,
            format!("({:.2}s)", result.duration.as_secs_f64()).dimmed()
        );
    }
    println!();

    let failures = report.failures().count();
    let report = report.into_result()?;

    if failures == 0 {
        println!(
            "{} {}",
            "✓".green().bold(),
            "All tasks completed successfully!".green().bold()
        );
    } else {
        println!(
            "{} {}",
            "⚠".yellow().bold(),
            format!(
                "Completed with {} failed task(s) of {} (force)",
                failures,
                report.leaves.len()
            )
            .yellow()
            .bold()
        );
    }

    Ok(())
}
