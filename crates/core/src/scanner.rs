//! Walks the content root and reports every file with its modification time.

use crate::config::ScanConfig;
use crate::error::PipelineError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::task;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ScannedItem {
    pub path: PathBuf,
    pub mtime: f64,
}

/// Seconds since the Unix epoch, with sub-second precision.
pub fn mtime_secs(modified: SystemTime) -> f64 {
    match modified.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Enumerates all files under `root`. Paths come back absolute.
///
/// Only the root itself is fatal; unreadable entries below it are skipped.
pub async fn scan(root: &Path, opts: &ScanConfig) -> Result<Vec<ScannedItem>, PipelineError> {
    let root = fs::canonicalize(root).map_err(|source| PipelineError::RootUnavailable {
        path: root.to_path_buf(),
        source,
    })?;
    let meta = fs::metadata(&root).map_err(|source| PipelineError::RootUnavailable {
        path: root.clone(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(PipelineError::RootUnavailable {
            path: root,
            source: std::io::Error::new(std::io::ErrorKind::Other, "not a directory"),
        });
    }
    fs::read_dir(&root).map_err(|source| PipelineError::RootUnavailable {
        path: root.clone(),
        source,
    })?;

    let exclude_set = build_globset(&opts.exclude)
        .map_err(|e| PipelineError::Scanner(format!("invalid exclude pattern: {e}")))?;
    let skip_hidden = opts.skip_hidden;
    let (tx, mut rx) = mpsc::channel(100);

    let walker_handle = task::spawn_blocking(move || {
        let walk = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || should_descend(e.path(), skip_hidden, &exclude_set));
        for entry in walk {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let mtime = match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(t) => mtime_secs(t),
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping file without mtime");
                    continue;
                }
            };

            let item = ScannedItem {
                path: path.to_path_buf(),
                mtime,
            };
            if tx.blocking_send(item).is_err() {
                // Receiver dropped, stop walking.
                break;
            }
        }
    });

    let mut items = Vec::new();
    while let Some(item) = rx.recv().await {
        items.push(item);
    }

    walker_handle
        .await
        .map_err(|e| PipelineError::Scanner(e.to_string()))?;
    Ok(items)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat)?);
    }
    builder.build()
}

fn should_descend(path: &Path, skip_hidden: bool, excludes: &GlobSet) -> bool {
    if excludes.is_match(path) {
        return false;
    }
    !(skip_hidden && is_hidden(path))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
