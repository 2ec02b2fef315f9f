use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::mapper::{MapSettings, MapStage, MapSummary};
use crate::models::PresentationView;
use crate::progress::{ProgressState, ProgressTracker};
use crate::reducer::ReduceStage;
use crate::view;
use anyhow::Context;
use providers::noop::NoopProvider;
use providers::openai::{OpenAiConfig, OpenAiProvider};
use providers::ClassificationOracle;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Map,
    Reduce,
    All,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub map: Option<MapSummary>,
    pub tags: Option<usize>,
}

impl PipelineSummary {
    /// Files (re)classified by this run.
    pub fn newly_analyzed(&self) -> usize {
        self.map.map(|m| m.processed).unwrap_or(0)
    }
}

/// The pipeline's entry points. Runs are serialized: starting one while
/// another is in flight fails with [`PipelineError::Busy`].
pub struct Pipeline {
    config: AppConfig,
    cache: CacheStore,
    map: MapStage,
    reduce: ReduceStage,
    progress: Arc<ProgressTracker>,
    run_guard: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: AppConfig, cache: CacheStore, oracle: Arc<dyn ClassificationOracle>) -> Self {
        let progress = Arc::new(ProgressTracker::new());
        let map = MapStage::new(
            cache.clone(),
            oracle,
            MapSettings::from(&config),
            progress.clone(),
        );
        let reduce = ReduceStage::new(cache.clone());
        Self {
            config,
            cache,
            map,
            reduce,
            progress,
            run_guard: Mutex::new(()),
        }
    }

    /// Opens the configured cache and oracle. A missing oracle credential is
    /// an error here, before any run starts.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let oracle = build_oracle(&config)?;
        let cache = CacheStore::open(&config).await.context("open cache store")?;
        Ok(Self::new(config, cache, oracle))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.snapshot()
    }

    pub fn progress_tracker(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub async fn run_map(&self) -> Result<MapSummary, PipelineError> {
        let _guard = self.run_guard.try_lock().map_err(|_| PipelineError::Busy)?;
        self.map_unguarded().await
    }

    pub async fn run_reduce(&self) -> Result<usize, PipelineError> {
        let _guard = self.run_guard.try_lock().map_err(|_| PipelineError::Busy)?;
        Ok(self.reduce.run().await?.len())
    }

    pub async fn run(&self, mode: PipelineMode) -> Result<PipelineSummary, PipelineError> {
        let _guard = self.run_guard.try_lock().map_err(|_| PipelineError::Busy)?;
        let mut summary = PipelineSummary::default();

        if matches!(mode, PipelineMode::Map | PipelineMode::All) {
            summary.map = Some(self.map_unguarded().await?);
        }
        if matches!(mode, PipelineMode::Reduce | PipelineMode::All) {
            summary.tags = Some(self.reduce.run().await?.len());
        }
        Ok(summary)
    }

    /// Empties both indices. Refused while a run is in flight.
    pub async fn clear_all(&self) -> Result<(), PipelineError> {
        let _guard = self.run_guard.try_lock().map_err(|_| PipelineError::Busy)?;
        self.cache.clear_all().await.map_err(PipelineError::Cache)
    }

    pub async fn presentation_view(&self) -> PresentationView {
        let reverse = self.cache.load_reverse().await;
        let forward = self.cache.load_forward().await;
        view::presentation_view(&forward, &reverse)
    }

    async fn map_unguarded(&self) -> Result<MapSummary, PipelineError> {
        self.map
            .run(&self.config.target_path(), &self.config.allowed_keys)
            .await
    }
}

pub fn build_oracle(config: &AppConfig) -> anyhow::Result<Arc<dyn ClassificationOracle>> {
    match config.oracle.provider.as_str() {
        "openai" => {
            let cfg = OpenAiConfig::from_env(&config.oracle.model, config.oracle.base_url.as_deref())
                .context("openai oracle is not configured")?;
            info!(model = %cfg.chat_model, base_url = %cfg.base_url, "using openai oracle");
            Ok(Arc::new(OpenAiProvider::new(cfg)))
        }
        "noop" => Ok(Arc::new(NoopProvider)),
        other => anyhow::bail!("unknown oracle provider: {other}"),
    }
}

/// First-run scaffolding: target folder and empty cache blobs.
pub async fn bootstrap(config: &AppConfig) -> anyhow::Result<CacheStore> {
    let target = config.target_path();
    tokio::fs::create_dir_all(&target)
        .await
        .with_context(|| format!("create target folder {}", target.display()))?;
    let cache = CacheStore::open(config).await?;
    cache.ensure_initialized().await?;
    Ok(cache)
}
