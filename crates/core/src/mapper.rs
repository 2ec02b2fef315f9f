//! Map stage: find stale files, classify them concurrently, persist the
//! forward index once everything has drained.

use crate::cache::CacheStore;
use crate::classifier::{path_key, Classified, Classifier};
use crate::config::{AppConfig, PdfMode, ScanConfig};
use crate::error::PipelineError;
use crate::extractor::{supported_pdf_mode, AdaptLimits};
use crate::models::ForwardIndex;
use crate::progress::ProgressTracker;
use crate::scanner::{self, ScannedItem};
use providers::ClassificationOracle;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct MapSettings {
    pub concurrency: usize,
    pub limits: AdaptLimits,
    pub pdf_mode: PdfMode,
    pub scan: ScanConfig,
}

impl From<&AppConfig> for MapSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            concurrency: cfg.pipeline.concurrency,
            limits: AdaptLimits::from(&cfg.pipeline),
            pdf_mode: supported_pdf_mode(cfg.pipeline.pdf_mode),
            scan: cfg.scan.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MapSummary {
    /// Files found under the root.
    pub discovered: usize,
    /// Files dispatched for classification.
    pub stale: usize,
    /// Files that got a fresh record this run.
    pub processed: usize,
    /// Files left for the next run.
    pub failed: usize,
}

pub struct MapStage {
    cache: CacheStore,
    oracle: Arc<dyn ClassificationOracle>,
    settings: MapSettings,
    progress: Arc<ProgressTracker>,
}

/// A file needs work unless its record was taken at exactly this mtime.
pub fn is_stale(forward: &ForwardIndex, item: &ScannedItem) -> bool {
    forward
        .get(&path_key(&item.path))
        .map(|record| !record.is_fresh(item.mtime))
        .unwrap_or(true)
}

impl MapStage {
    pub fn new(
        cache: CacheStore,
        oracle: Arc<dyn ClassificationOracle>,
        settings: MapSettings,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        Self {
            cache,
            oracle,
            settings,
            progress,
        }
    }

    pub async fn run(&self, root: &Path, allowed: &[String]) -> Result<MapSummary, PipelineError> {
        let mut forward = self.cache.load_forward().await;
        let scanned = scanner::scan(root, &self.settings.scan).await?;

        let mut summary = MapSummary {
            discovered: scanned.len(),
            ..MapSummary::default()
        };
        let stale: Vec<ScannedItem> = scanned
            .into_iter()
            .filter(|item| is_stale(&forward, item))
            .collect();
        summary.stale = stale.len();
        self.progress.begin(stale.len());
        info!(
            root = %root.display(),
            discovered = summary.discovered,
            stale = summary.stale,
            "map stage starting"
        );

        let classifier = Classifier::new(
            self.oracle.clone(),
            allowed,
            self.settings.limits.clone(),
            self.settings.pdf_mode,
        );
        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for item in stale {
            let classifier = classifier.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                // Held until this file is done; the semaphore is never closed.
                let _permit = permits.acquire_owned().await;
                let result = classifier.classify_file(&item.path).await;
                Classified {
                    path: item.path,
                    result,
                }
            });
        }

        // The join loop is the only writer of `forward`.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Classified {
                    result: Ok(record), ..
                }) => {
                    info!(file = %record.display_name, tags = ?record.tags, "classified");
                    forward.insert(record.path.clone(), record);
                    summary.processed += 1;
                }
                Ok(Classified {
                    path,
                    result: Err(e),
                }) => {
                    warn!(path = %path.display(), error = %e, "classification failed, will retry next run");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = ?e, "classification task panicked");
                    summary.failed += 1;
                }
            }
            self.progress.complete_one();
        }

        self.cache
            .save_forward(&forward)
            .await
            .map_err(PipelineError::Cache)?;
        info!(
            processed = summary.processed,
            failed = summary.failed,
            "map stage complete"
        );
        Ok(summary)
    }
}
