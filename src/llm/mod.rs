//! Generation provider abstraction.
//!
//! `GenerationProvider` is an enum over concrete backends. Add a new variant
//! + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities; clone them freely.
//! Calls are blocking, matching the synchronous pipeline.

pub mod prompt;
pub mod providers;

use crate::config::LlmConfig;
use crate::error::ProviderError;

// ── Parameters ────────────────────────────────────────────────────────────────

/// Sampling parameters passed through to the backend unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { max_new_tokens: 200, temperature: 0.7, top_p: 0.9 }
    }
}

impl From<&LlmConfig> for GenerationParams {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            max_new_tokens: cfg.max_new_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }
    }
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available generation backends.
///
/// Enum dispatch avoids `dyn` trait objects.
/// Adding a backend = new module + new variant + new `generate` arm.
#[derive(Debug, Clone)]
pub enum GenerationProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl GenerationProvider {
    /// Send `prompt` and return the raw reply text. The caller owns any
    /// post-processing.
    pub fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProviderError> {
        match self {
            GenerationProvider::Dummy(p) => p.generate(prompt, params),
            GenerationProvider::OpenAiCompatible(p) => p.generate(prompt, params),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GenerationProvider::Dummy(_) => "dummy",
            GenerationProvider::OpenAiCompatible(_) => "openai",
        }
    }
}
