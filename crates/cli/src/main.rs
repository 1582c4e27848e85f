use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pipewright_core::pipeline::{PipelineManager, PipelineManagerConfig, RunOptions};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Pipewright - A declarative task pipeline runner
#[derive(Parser)]
#[command(name = "pipewright")]
#[command(about = "Run declarative task pipelines for web application repositories")]
#[command(version)]
struct Cli {
    /// Path to the workspace root (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Show debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks one after another (the default task when none is given)
    Run {
        /// Task names, aliases or "task:target" names
        tasks: Vec<String>,
        #[command(flatten)]
        force: ForceArgs,
        /// Environment profile to apply before the first task
        #[arg(long)]
        env: Option<String>,
    },
    /// Show the ordered leaf tasks a run would execute
    Plan {
        /// Task names, aliases or "task:target" names
        tasks: Vec<String>,
    },
    /// List declared tasks, environment profiles and watch groups
    List,
    /// Show alias membership and cycles
    Graph,
    /// Re-run tasks when watched files change
    Watch {
        /// Only watch these groups (repeatable)
        #[arg(short, long)]
        group: Vec<String>,
        #[command(flatten)]
        force: ForceArgs,
        /// Environment profile applied before every run
        #[arg(long)]
        env: Option<String>,
    },
    /// Print the JSON schemas of the configuration files
    Schema,
}

/// Overrides for the pipeline's `options.force`; the last flag given wins
#[derive(Args, Debug, Default)]
struct ForceArgs {
    /// Keep going after a task fails
    #[arg(long, overrides_with = "no_force")]
    force: bool,
    /// Halt on the first failure even if the pipeline enables force
    #[arg(long, overrides_with = "force")]
    no_force: bool,
}

impl ForceArgs {
    fn value(&self) -> Option<bool> {
        match (self.force, self.no_force) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn run_options(force: &ForceArgs, env: Option<String>) -> RunOptions {
    RunOptions {
        // Without a flag the pipeline's own option decides
        force: force.value(),
        environment: env,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Schema = cli.command {
        return commands::schema::execute();
    }

    debug!(workspace = %cli.workspace.display(), "loading pipeline");

    // Initialize pipeline manager with all business logic
    let manager = PipelineManager::new(PipelineManagerConfig {
        workspace_root: cli.workspace.clone(),
    })
    .map_err(|e| {
        error!(workspace = %cli.workspace.display(), error = %e, "failed to load pipeline");
        anyhow::anyhow!("Failed to load pipeline: {}", e)
    })?;

    // Execute command (CLI layer only handles presentation)
    match cli.command {
        Commands::Run { tasks, force, env } => {
            commands::run::execute(&manager, &tasks, run_options(&force, env)).await
        }
        Commands::Plan { tasks } => commands::plan::execute(&manager, &tasks),
        Commands::List => commands::list::execute(&manager),
        Commands::Graph => commands::graph::execute(&manager),
        Commands::Watch { group, force, env } => {
            commands::watch::execute(&manager, group, run_options(&force, env)).await
        }
        Commands::Schema => commands::schema::execute(),
    }
}
