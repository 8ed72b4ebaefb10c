//! Resolved configuration types.

use std::path::PathBuf;

use crate::retrieval::fusion::SearchMode;

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the persisted pipeline (already expanded, no `~`).
    pub storage_dir: PathBuf,
    pub log_level: String,
    /// Optional append-mode log file; stderr when `None`.
    pub log_file: Option<PathBuf>,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub graph: GraphConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    /// From `LLM_API_KEY`; `None` for keyless local servers.
    pub llm_api_key: Option<String>,
    /// From `EMBEDDING_API_KEY`; falls back to `LLM_API_KEY` when unset.
    pub embedding_api_key: Option<String>,
}

/// Splitter settings used by the document loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks; must be below `chunk_size`.
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalConfig {
    pub default_mode: SearchMode,
    pub top_k: usize,
    pub vector_weight: f32,
    pub graph_weight: f32,
    /// Number of top hits rendered into the generation prompt.
    pub context_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Minimum character count for a capitalised run to count as an entity.
    pub entity_min_length: usize,
    /// Characters of chunk text kept on each document node.
    pub preview_chars: usize,
}

#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Active backend: `"hashing"` or `"openai"`.
    pub provider: String,
    /// Vector length for the hashing embedder.
    pub dimension: usize,
    /// Texts per provider call during index builds.
    pub batch_size: usize,
    pub openai: OpenAiEmbeddingConfig,
}

/// `[embedding.openai]` — any server implementing `/v1/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active backend: `"dummy"` or `"openai"`.
    pub provider: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Optional prompt template with `{{context}}` and `{{question}}` placeholders.
    pub prompt_template: Option<PathBuf>,
    pub openai: OpenAiConfig,
}

/// `[llm.openai]` — any server implementing `/v1/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
}
