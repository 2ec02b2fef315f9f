use crate::config::PdfMode;
use crate::error::ClassificationError;
use crate::extractor::{adapter_for, AdaptLimits};
use crate::models::FileRecord;
use crate::scanner::{display_name, mtime_secs};
use providers::ClassificationOracle;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a worker needs to classify files, shared across tasks.
#[derive(Clone)]
pub struct Classifier {
    oracle: Arc<dyn ClassificationOracle>,
    allowed: Arc<[String]>,
    limits: Arc<AdaptLimits>,
    pdf_mode: PdfMode,
}

impl Classifier {
    pub fn new(
        oracle: Arc<dyn ClassificationOracle>,
        allowed: &[String],
        limits: AdaptLimits,
        pdf_mode: PdfMode,
    ) -> Self {
        Self {
            oracle,
            allowed: allowed.into(),
            limits: Arc::new(limits),
            pdf_mode,
        }
    }

    /// Reads, adapts and classifies one file.
    ///
    /// The returned record carries the mtime seen just before the content was
    /// read, and its tags sorted.
    pub async fn classify_file(&self, path: &Path) -> Result<FileRecord, ClassificationError> {
        let read_err = |source| ClassificationError::Read {
            path: path.to_path_buf(),
            source,
        };
        let meta = tokio::fs::metadata(path).await.map_err(read_err)?;
        let mtime = mtime_secs(meta.modified().map_err(read_err)?);
        let bytes = tokio::fs::read(path).await.map_err(read_err)?;

        let adapter = adapter_for(path, self.pdf_mode);
        debug!(path = %path.display(), ?adapter, bytes = bytes.len(), "adapting content");
        let input = adapter.adapt(path, bytes, &self.limits).await?;

        let tags = self.oracle.classify(&input, &self.allowed).await?;
        let unexpected: Vec<&String> = tags
            .iter()
            .filter(|t| !self.allowed.contains(t))
            .collect();
        if !unexpected.is_empty() {
            warn!(
                path = %path.display(),
                oracle = self.oracle.name(),
                ?unexpected,
                "oracle returned tags outside the allowed set"
            );
        }

        Ok(FileRecord::new(
            path_key(path),
            tags,
            mtime,
            display_name(path),
        ))
    }
}

pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Outcome of one dispatched file, as seen by the aggregator.
#[derive(Debug)]
pub struct Classified {
    pub path: PathBuf,
    pub result: Result<FileRecord, ClassificationError>,
}
