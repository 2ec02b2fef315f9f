//! Core library: scanning, content adaptation, classification, and the
//! map/reduce indices built from the results.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod error;
pub mod extractor;
pub mod mapper;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod reducer;
pub mod scanner;
pub mod view;

pub use error::{ClassificationError, PipelineError};
