//! Classification oracle abstractions.
//!
//! An oracle takes adapted file content plus the set of allowed tags and
//! answers with the subset of tags that match. Concrete oracles live in the
//! submodules; `response` holds the parsing shared by all of them.

use thiserror::Error;

pub mod noop;
pub mod openai;
pub mod response;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("not implemented")]
    NotImplemented,
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
}

/// Which shape of content an oracle call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Image,
    MultiPageVisual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub mime: String,
    pub data: Vec<u8>,
}

/// Adapted file content, ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleInput {
    Text(String),
    Image(ImagePart),
    Pages(Vec<ImagePart>),
}

impl OracleInput {
    pub fn kind(&self) -> ContentKind {
        match self {
            OracleInput::Text(_) => ContentKind::Text,
            OracleInput::Image(_) => ContentKind::Image,
            OracleInput::Pages(_) => ContentKind::MultiPageVisual,
        }
    }
}

#[async_trait::async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Returns the tags from `allowed` that describe `input`.
    ///
    /// Implementations are expected, not required, to stay inside `allowed`.
    async fn classify(
        &self,
        input: &OracleInput,
        allowed: &[String],
    ) -> Result<Vec<String>, ProviderError>;

    fn name(&self) -> &str;
}

/// Instruction sent ahead of the content on every call.
pub fn classification_prompt(kind: ContentKind, allowed: &[String]) -> String {
    let allowed_json = serde_json::to_string(allowed).unwrap_or_else(|_| "[]".to_string());
    let subject = match kind {
        ContentKind::Text => "the text below",
        ContentKind::Image => "the attached image",
        ContentKind::MultiPageVisual => "the attached document pages",
    };
    format!(
        "You are a strict file classifier. Match {subject} against these allowed keys only: {allowed_json}.\n\
         Rules:\n\
         1. Output ONLY a JSON list of strings, e.g. [\"finance\", \"work-project\"].\n\
         2. If no keys match, output []."
    )
}
