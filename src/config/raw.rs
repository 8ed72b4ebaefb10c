//! Raw TOML shape — `serde` target before resolution.
//!
//! Every section is optional; missing keys fall back to the defaults below,
//! which match the values the pipeline was tuned with.

use serde::Deserialize;

#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub pipeline: RawPipeline,
    #[serde(default)]
    pub chunking: RawChunking,
    #[serde(default)]
    pub retrieval: RawRetrieval,
    #[serde(default)]
    pub graph: RawGraph,
    #[serde(default)]
    pub embedding: RawEmbedding,
    #[serde(default)]
    pub llm: RawLlm,
}

#[derive(Deserialize)]
pub(super) struct RawPipeline {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawPipeline {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawChunking {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RawChunking {
    fn default() -> Self {
        Self { chunk_size: default_chunk_size(), chunk_overlap: default_chunk_overlap() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawRetrieval {
    #[serde(default = "default_mode")]
    pub default_mode: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,
    #[serde(default = "default_graph_weight")]
    pub graph_weight: f32,
    #[serde(default = "default_context_chunks")]
    pub context_chunks: usize,
}

impl Default for RawRetrieval {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            top_k: default_top_k(),
            vector_weight: default_vector_weight(),
            graph_weight: default_graph_weight(),
            context_chunks: default_context_chunks(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGraph {
    #[serde(default = "default_entity_min_length")]
    pub entity_min_length: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for RawGraph {
    fn default() -> Self {
        Self {
            entity_min_length: default_entity_min_length(),
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawEmbedding {
    /// Maps to `default = "..."` in `[embedding]`.
    #[serde(rename = "default", default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub openai: RawOpenAiEmbedding,
}

impl Default for RawEmbedding {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            openai: RawOpenAiEmbedding::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiEmbedding {
    #[serde(default = "default_embedding_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiEmbedding {
    fn default() -> Self {
        Self {
            api_base_url: default_embedding_api_base_url(),
            model: default_embedding_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub openai: RawOpenAiLlm,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            prompt_template: None,
            openai: RawOpenAiLlm::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiLlm {
    #[serde(default = "default_llm_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiLlm {
    fn default() -> Self {
        Self {
            api_base_url: default_llm_api_base_url(),
            model: default_llm_model(),
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }
}

fn default_storage_dir() -> String { "~/.hybrid-rag".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_mode() -> String { "hybrid".to_string() }
fn default_top_k() -> usize { 5 }
fn default_vector_weight() -> f32 { 0.7 }
fn default_graph_weight() -> f32 { 0.3 }
fn default_context_chunks() -> usize { 3 }
fn default_entity_min_length() -> usize { 3 }
fn default_preview_chars() -> usize { 200 }
fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_dimension() -> usize { 384 }
fn default_batch_size() -> usize { 32 }
fn default_embedding_api_base_url() -> String { "http://localhost:11434/v1/embeddings".to_string() }
fn default_embedding_model() -> String { "all-minilm".to_string() }
fn default_timeout_seconds() -> u64 { 60 }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_max_new_tokens() -> u32 { 200 }
fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.9 }
fn default_llm_api_base_url() -> String { "http://localhost:11434/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "phi".to_string() }
fn default_llm_timeout_seconds() -> u64 { 120 }
