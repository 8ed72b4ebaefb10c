//! Embedding provider abstraction.
//!
//! `EmbeddingProvider` is an enum over concrete backends, mirroring the
//! generation side in [`crate::llm`]. Every backend must be deterministic for
//! identical input and configuration.

pub mod hashing;
pub mod openai_compatible;

use rayon::prelude::*;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::ProviderError;

// ── Provider enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    Hashing(hashing::HashingEmbedder),
    OpenAiCompatible(openai_compatible::OpenAiEmbedder),
}

impl EmbeddingProvider {
    /// Construct the backend named by `config.provider`.
    ///
    /// `api_key` comes from `EMBEDDING_API_KEY` (never TOML) and is ignored by
    /// the hashing backend.
    pub fn from_config(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        match config.provider.as_str() {
            "hashing" => Ok(Self::Hashing(hashing::HashingEmbedder::new(config.dimension)?)),
            "openai" | "openai-compatible" => {
                let oai = &config.openai;
                let p = openai_compatible::OpenAiEmbedder::new(
                    oai.api_base_url.clone(),
                    oai.model.clone(),
                    oai.timeout_seconds,
                    api_key,
                )?;
                Ok(Self::OpenAiCompatible(p))
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    /// Short backend name for logs and stats.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hashing(_) => "hashing",
            Self::OpenAiCompatible(_) => "openai",
        }
    }

    /// Output length when known without a network round-trip.
    pub fn dimension(&self) -> Option<usize> {
        match self {
            Self::Hashing(h) => Some(h.dimension()),
            Self::OpenAiCompatible(_) => None,
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut out = self.embed_batch(&[text])?;
        out.pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding returned".into()))
    }

    /// Embed `texts` in order. All returned vectors share one non-zero length.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors: Vec<Vec<f32>> = match self {
            Self::Hashing(h) => texts.par_iter().map(|t| h.embed(t)).collect(),
            Self::OpenAiCompatible(p) => p.embed_batch(texts)?,
        };
        check_batch(texts.len(), &vectors)?;
        debug!(provider = self.name(), texts = texts.len(), "embedded batch");
        Ok(vectors)
    }
}

fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<(), ProviderError> {
    if vectors.len() != expected {
        return Err(ProviderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if dim == 0 {
        return Err(ProviderError::InvalidResponse("zero-length embedding".into()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(ProviderError::InvalidResponse(format!(
            "inconsistent embedding length: {} vs {dim}",
            bad.len()
        )));
    }
    Ok(())
}
