use anyhow::Result;
use colored::*;
use pipewright_core::pipeline::PipelineManager;
use pipewright_core::tasks::get_task_color;

pub fn execute(manager: &PipelineManager) -> Result<()> {
    let result = manager.list_tasks();

    println!("{}", "Tasks".bold().underline());

    let mut tasks: Vec<_> = result.tasks.iter().collect();
    tasks.sort_by(|a, b| a.name.cmp(&b.name));

    if tasks.is_empty() {
        println!("  {}", "No tasks found".dimmed());
    }

    for task in tasks {
        println!(
            "{} {}",
            task.name.color(get_task_color(&task.name)).bold(),
            format!("[{}]", task.kind).dimmed()
        );
        if let Some(description) = &task.description {
            println!("  {}", description);
        }
        if !task.members.is_empty() {
            println!("  {} {}", "runs:".dimmed(), task.members.join(", "));
        }
        if !task.targets.is_empty() {
            println!("  {} {}", "targets:".dimmed(), task.targets.join(", "));
        }
    }

    if !result.environments.is_empty() {
        println!();
        println!("{}", "Environments".bold().underline());
        for env in &result.environments {
            println!("{}", env.yellow());
        }
    }

    if !result.watch_groups.is_empty() {
        println!();
        println!("{}", "Watch groups".bold().underline());
        for group in &result.watch_groups {
            println!("{}", group.cyan());
        }
    }

    Ok(())
}
