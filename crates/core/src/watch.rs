//! File watching
//!
//! A watch group pairs glob patterns with the tasks to re-run when a matching
//! file changes. Changes are collected from a polling watcher and flushed once
//! the workspace has been quiet for the group's debounce period.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Event as NotifyEvent, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::configs::pipeline::WatchGroupConfig;
use crate::pipeline::{PipelineManager, RunOptions, CONFIG_DIR};
use crate::types::{PipewrightError, PipewrightResult};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WatchGroup {
    pub name: String,
    pub tasks: Vec<String>,
    pub debounce: Duration,
    matcher: GlobSet,
}

impl WatchGroup {
    pub fn from_config(config: &WatchGroupConfig) -> PipewrightResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.files {
            let glob = Glob::new(pattern).map_err(|e| {
                PipewrightError::Config(format!(
                    "Watch group '{}' has an invalid pattern '{}': {}",
                    config.name, pattern, e
                ))
            })?;
            builder.add(glob);
        }
        let matcher = builder.build().map_err(|e| {
            PipewrightError::Config(format!("Watch group '{}': {}", config.name, e))
        })?;

        if config.tasks.is_empty() {
            return Err(PipewrightError::Config(format!(
                "Watch group '{}' has no tasks",
                config.name
            )));
        }

        Ok(Self {
            name: config.name.clone(),
            tasks: config.tasks.clone(),
            debounce: config
                .debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_DEBOUNCE),
            matcher,
        })
    }

    /// Whether a path relative to the workspace root belongs to this group
    pub fn matches(&self, relative: &Path) -> bool {
        self.matcher.is_match(relative)
    }
}

/// Groups touched by any of the changed paths, in declaration order, each once
pub fn groups_for_changes<'g>(groups: &'g [WatchGroup], changed: &[PathBuf]) -> Vec<&'g WatchGroup> {
    groups
        .iter()
        .filter(|group| changed.iter().any(|path| group.matches(path)))
        .collect()
}

/// Keep only the named groups; an empty filter keeps all of them
pub fn select_groups(groups: Vec<WatchGroup>, names: &[String]) -> PipewrightResult<Vec<WatchGroup>> {
    if let Some(unknown) = names.iter().find(|n| !groups.iter().any(|g| &g.name == *n)) {
        return Err(PipewrightError::Config(format!(
            "Watch group '{}' is not declared",
            unknown
        )));
    }
    Ok(groups
        .into_iter()
        .filter(|g| names.is_empty() || names.contains(&g.name))
        .collect())
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Groups to watch; empty means every group
    pub groups: Vec<String>,
    pub poll_interval: Duration,
    pub run: RunOptions,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            run: RunOptions::default(),
        }
    }
}

/// Watch the workspace until ctrl-c, re-running the tasks of every group a change touches.
///
/// Task failures are logged and watching continues.
pub async fn watch(manager: &PipelineManager, options: &WatchOptions) -> PipewrightResult<()> {
    watch_until(manager, options, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Watch the workspace until `shutdown` completes
pub async fn watch_until<F>(
    manager: &PipelineManager,
    options: &WatchOptions,
    shutdown: F,
) -> PipewrightResult<()>
where
    F: Future<Output = ()>,
{
    let groups = select_groups(manager.watch_groups()?, &options.groups)?;
    if groups.is_empty() {
        return Err(PipewrightError::Config(
            "No watch groups are configured".to_string(),
        ));
    }

    // Every group must expand cleanly before anything is watched
    for group in &groups {
        manager.get_execution_plan(&group.tasks)?;
    }

    let quiet_period = groups
        .iter()
        .map(|g| g.debounce)
        .min()
        .unwrap_or(DEFAULT_DEBOUNCE);

    // The watcher reports paths under the directory it was given
    let root = manager.root().canonicalize()?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let mut watcher = PollWatcher::new(
        forward_changes(tx),
        notify::Config::default().with_poll_interval(options.poll_interval),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    for group in &groups {
        info!(group = %group.name, tasks = ?group.tasks, "watching");
    }

    let mut pending: Vec<PathBuf> = Vec::new();
    let mut last_change = Instant::now();
    let mut flush_tick = tokio::time::interval(Duration::from_millis(100));
    flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("stopping watch");
                return Ok(());
            }
            Some(paths) = rx.recv() => {
                pending.extend(relative_paths(&root, &paths));
                last_change = Instant::now();
            }
            _ = flush_tick.tick() => {
                if pending.is_empty() || last_change.elapsed() < quiet_period {
                    continue;
                }
                let changed = std::mem::take(&mut pending);
                debug!(count = changed.len(), "flushing file changes");
                for group in groups_for_changes(&groups, &changed) {
                    run_group(manager, group, &options.run).await;
                }
            }
        }
    }
}

/// Watcher callback passing the paths of every create, modify or remove event to the loop.
///
/// The channel is unbounded so changes made while a group runs are queued, not dropped.
fn forward_changes(
    tx: mpsc::UnboundedSender<Vec<PathBuf>>,
) -> impl FnMut(Result<NotifyEvent, notify::Error>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            if tx.send(event.paths).is_err() {
                debug!("watch loop has stopped, dropping file change");
            }
        }
        Err(e) => warn!(error = %e, "file watcher reported an error"),
    }
}

async fn run_group(manager: &PipelineManager, group: &WatchGroup, options: &RunOptions) {
    info!(group = %group.name, "change detected, running tasks");
    match manager.run_tasks(&group.tasks, options).await {
        Ok(report) if report.is_done() => {
            info!(group = %group.name, tasks = report.executed().count(), "watch run finished");
        }
        Ok(report) => {
            let failed: Vec<_> = report.failures().map(|(task, _)| task).collect();
            warn!(group = %group.name, ?failed, "watch run failed, still watching");
        }
        Err(e) => {
            error!(group = %group.name, error = %e, "watch run could not start");
        }
    }
}

/// Paths relative to the (canonical) root, ignoring the pipeline's own configuration directory
fn relative_paths(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|path| {
            if path.is_absolute() {
                path.strip_prefix(root).ok().map(Path::to_path_buf)
            } else {
                Some(
                    path.components()
                        .filter(|c| !matches!(c, Component::CurDir))
                        .collect(),
                )
            }
        })
        .filter(|path| !path.starts_with(CONFIG_DIR))
        .collect()
}
