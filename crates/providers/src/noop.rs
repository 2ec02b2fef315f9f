use crate::{ClassificationOracle, OracleInput, ProviderError};

/// Oracle that refuses every call. Files stay unclassified and are retried
/// once a real oracle is configured.
#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl ClassificationOracle for NoopProvider {
    async fn classify(
        &self,
        _input: &OracleInput,
        _allowed: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        Err(ProviderError::NotImplemented)
    }

    fn name(&self) -> &str {
        "noop"
    }
}
