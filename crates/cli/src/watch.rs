use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagger_core::pipeline::{Pipeline, PipelineMode};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Whether a filesystem event should trigger a new run.
///
/// Reads and events that only touch paths under one of `ignored` (the cache
/// directory) do not count.
pub fn is_relevant(event: &Event, ignored: &[PathBuf]) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event
        .paths
        .iter()
        .any(|p| !ignored.iter().any(|dir| p.starts_with(dir)))
}

fn ignored_dirs(pipeline: &Pipeline) -> Vec<PathBuf> {
    let cache_dir = pipeline.config().cache_dir();
    let mut dirs = vec![cache_dir.clone()];
    if let Ok(canonical) = std::fs::canonicalize(&cache_dir) {
        dirs.push(canonical);
    }
    dirs
}

async fn run_once(pipeline: &Pipeline) {
    match pipeline.run(PipelineMode::All).await {
        Ok(summary) => {
            println!("{}", crate::report::summary_line(&summary));
        }
        Err(e) => error!(error = %e, "pipeline run failed"),
    }
}

/// Runs the pipeline once, then again after every settled burst of changes
/// under the target folder.
pub async fn watch_target(pipeline: &Pipeline, debounce: Duration) -> Result<()> {
    let root: PathBuf = pipeline.config().target_path();
    let ignored = ignored_dirs(pipeline);

    let (tx, mut rx) = mpsc::channel::<Event>(256);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let _ = tx.blocking_send(event);
        }
        Err(e) => warn!(error = %e, "watch error"),
    })?;
    watcher
        .watch(Path::new(&root), RecursiveMode::Recursive)
        .with_context(|| format!("watch {}", root.display()))?;

    run_once(pipeline).await;
    info!(root = %root.display(), "watching for changes");

    while let Some(event) = rx.recv().await {
        if !is_relevant(&event, &ignored) {
            continue;
        }
        debug!(paths = ?event.paths, "change detected");
        // Let the burst settle before running.
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(_)) => continue,
                Ok(None) => return Ok(()),
                Err(_) => break,
            }
        }
        run_once(pipeline).await;
    }
    Ok(())
}
