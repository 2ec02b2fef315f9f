use providers::ProviderError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single file. Never aborts a run.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not adapt content: {0}")]
    Adapt(String),
    #[error("oracle error: {0}")]
    Oracle(#[from] ProviderError),
}

/// Failure of a whole run, reported instead of a summary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("content root {path} is not readable: {source}")]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache store: {0:#}")]
    Cache(#[source] anyhow::Error),
    #[error("scanner stopped unexpectedly: {0}")]
    Scanner(String),
    #[error("a pipeline run is already in progress")]
    Busy,
}
