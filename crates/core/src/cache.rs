//! Typed access to the two persisted indices.
//!
//! Reads never fail: an absent or unparsable blob is a cold start. Writes
//! replace the whole index.

use crate::config::{AppConfig, CacheBackend};
use crate::models::{ForwardIndex, ReverseIndex};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use storage::{BlobStore, JsonDirStore, SqliteBlobStore};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Forward,
    Reverse,
}

impl IndexKind {
    pub fn blob_name(self) -> &'static str {
        match self {
            IndexKind::Forward => "file-to-key",
            IndexKind::Reverse => "key-to-file",
        }
    }
}

#[derive(Clone)]
pub struct CacheStore {
    blobs: Arc<dyn BlobStore>,
}

impl CacheStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Opens the backend named in the config.
    pub async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let blobs: Arc<dyn BlobStore> = match config.cache.backend {
            CacheBackend::Json => Arc::new(JsonDirStore::open(config.cache_dir()).await?),
            CacheBackend::Sqlite => Arc::new(
                SqliteBlobStore::open(&config.cache.database)
                    .await
                    .with_context(|| format!("open cache database {}", config.cache.database))?,
            ),
        };
        Ok(Self::new(blobs))
    }

    async fn load<T: DeserializeOwned + Default>(&self, kind: IndexKind) -> T {
        let name = kind.blob_name();
        let body = match self.blobs.read(name).await {
            Ok(Some(body)) => body,
            Ok(None) => return T::default(),
            Err(e) => {
                warn!(blob = name, error = %format!("{e:#}"), "cache unreadable, starting empty");
                return T::default();
            }
        };
        match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                warn!(blob = name, error = %e, "cache corrupt, starting empty");
                T::default()
            }
        }
    }

    async fn save<T: Serialize>(&self, kind: IndexKind, value: &T) -> anyhow::Result<()> {
        let body = serde_json::to_string_pretty(value)?;
        self.blobs
            .write(kind.blob_name(), &body)
            .await
            .with_context(|| format!("save {}", kind.blob_name()))
    }

    pub async fn load_forward(&self) -> ForwardIndex {
        let mut index: ForwardIndex = self.load(IndexKind::Forward).await;
        for (path, record) in index.iter_mut() {
            record.path = path.clone();
        }
        index
    }

    pub async fn save_forward(&self, index: &ForwardIndex) -> anyhow::Result<()> {
        self.save(IndexKind::Forward, index).await
    }

    pub async fn load_reverse(&self) -> ReverseIndex {
        self.load(IndexKind::Reverse).await
    }

    pub async fn save_reverse(&self, index: &ReverseIndex) -> anyhow::Result<()> {
        self.save(IndexKind::Reverse, index).await
    }

    /// Resets both indices so the next map run classifies everything.
    pub async fn clear_all(&self) -> anyhow::Result<()> {
        info!("clearing all caches");
        self.save_forward(&ForwardIndex::new()).await?;
        self.save_reverse(&ReverseIndex::new()).await
    }

    /// Writes empty blobs for any index that has never been saved.
    pub async fn ensure_initialized(&self) -> anyhow::Result<()> {
        for kind in [IndexKind::Forward, IndexKind::Reverse] {
            if self.blobs.read(kind.blob_name()).await?.is_none() {
                self.blobs.write(kind.blob_name(), "{}").await?;
            }
        }
        Ok(())
    }
}
