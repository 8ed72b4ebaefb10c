//! Dummy generator — echoes the prompt back prefixed with `[echo]`.
//! Used offline and in tests; ignores sampling parameters.

use crate::error::ProviderError;
use crate::llm::GenerationParams;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, ProviderError> {
        Ok(format!("[echo] {prompt}"))
    }
}
