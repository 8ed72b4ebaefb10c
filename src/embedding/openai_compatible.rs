//! OpenAI-compatible embedding client (`/v1/embeddings`).
//!
//! Wire types are private. Blocking client: the pipeline is synchronous.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ProviderError;
use crate::llm::providers::openai_compatible::check_status;

/// Adapter for any HTTP endpoint implementing `/v1/embeddings`
/// (OpenAI, Ollama, LM Studio, text-embeddings-inference…).
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_base_url: String,
        model: String,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_base_url, model, api_key })
    }

    /// One request for the whole batch; results are reordered by `index`.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let payload = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        debug!(model = %self.model, inputs = texts.len(), "sending embedding request");

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "embedding HTTP request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;
        let response = check_status(response)?;

        let parsed = response.json::<EmbeddingResponse>().map_err(|e| {
            error!(error = %e, "failed to deserialize embedding response");
            ProviderError::InvalidResponse(format!("failed to parse response body: {e}"))
        })?;

        order_by_index(parsed.data, texts.len())
    }
}

fn order_by_index(mut data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>, ProviderError> {
    data.sort_by_key(|d| d.index);
    if data.len() != expected || data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(ProviderError::InvalidResponse(format!(
            "expected indices 0..{expected}, got {} entries",
            data.len()
        )));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_reordered_by_index() {
        let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        let out = order_by_index(parsed.data, 2).unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn missing_entries_rejected() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(order_by_index(parsed.data, 2), Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn request_serializes_model_and_input() {
        let texts = ["a", "b"];
        let json = serde_json::to_value(EmbeddingRequest { model: "m", input: &texts }).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["input"][1], "b");
    }
}
