//! Crate-wide error types.
//!
//! `RagError` covers everything the pipeline surfaces to callers. None of the
//! retrieval variants are retried internally: they signal caller or data
//! errors, not transient conditions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    /// `build_indexes` (or an index `build`) was called with no chunks.
    #[error("empty input: no chunks to index")]
    EmptyInput,

    /// A query arrived before any index was built or loaded.
    #[error("indexes not built: call build_indexes or load first")]
    NotBuilt,

    /// Query text was blank after trimming.
    #[error("empty query")]
    EmptyQuery,

    /// Fusion weights must be finite, non-negative and sum to a positive number.
    #[error("invalid fusion weights: vector={vector}, graph={graph}")]
    InvalidWeight { vector: f32, graph: f32 },

    /// Persisted state is missing a component or fails the integrity check.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    #[error("unsupported search mode: {0}")]
    UnsupportedMode(String),

    #[error("embedding provider failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("generation provider failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure reported by an external model service (embedding or generation).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn invalid_weight_display_names_both_weights() {
        let e = RagError::InvalidWeight { vector: 0.0, graph: -1.0 };
        let msg = e.to_string();
        assert!(msg.contains("vector=0"));
        assert!(msg.contains("graph=-1"));
    }

    #[test]
    fn corrupt_state_display() {
        let e = RagError::CorruptState("graph.json missing".into());
        assert!(e.to_string().contains("graph.json missing"));
    }

    #[test]
    fn provider_error_is_source() {
        let e = RagError::Embedding(ProviderError::Request("connection refused".into()));
        assert!(e.to_string().contains("connection refused"));
        assert!(e.source().is_some());
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let e: RagError = io_err.into();
        assert!(e.to_string().contains("io error"));
        let _: &dyn Error = &e;
    }
}
