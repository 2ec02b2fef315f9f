//! Reduce stage: regroup the forward index by tag.

use crate::cache::CacheStore;
use crate::error::PipelineError;
use crate::models::{ForwardIndex, ReverseIndex};
use tracing::info;

/// Builds the reverse index from scratch. Buckets exist only for tags that
/// occur at least once.
pub fn reduce(forward: &ForwardIndex) -> ReverseIndex {
    let mut reverse = ReverseIndex::new();
    for (path, record) in forward {
        for tag in &record.tags {
            reverse.entry(tag.clone()).or_default().push(path.clone());
        }
    }
    reverse
}

pub struct ReduceStage {
    cache: CacheStore,
}

impl ReduceStage {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Must run after the map stage has saved; nothing here checks that.
    pub async fn run(&self) -> Result<ReverseIndex, PipelineError> {
        let forward = self.cache.load_forward().await;
        let reverse = reduce(&forward);
        self.cache
            .save_reverse(&reverse)
            .await
            .map_err(PipelineError::Cache)?;
        info!(files = forward.len(), tags = reverse.len(), "reduce stage complete");
        Ok(reverse)
    }
}
