use anyhow::Result;
use colored::*;
use pipewright_core::pipeline::{PipelineManager, RunOptions};
use pipewright_core::watch::{watch, WatchOptions};

pub async fn execute(manager: &PipelineManager, groups: Vec<String>, run: RunOptions) -> Result<()> {
    let label = if groups.is_empty() {
        "all groups".to_string()
    } else {
        groups.join(", ")
    };
    println!("{} {}", "Watching".bold(), label.cyan());
    println!("{}", "Press Ctrl-C to stop".dimmed());

    watch(
        manager,
        &WatchOptions {
            groups,
            run,
            ..WatchOptions::default()
        },
    )
    .await
    .map_err(|e| anyhow::anyhow!("Watch failed: {}", e))
}
