//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or an explicit path), then applies
//! `HYBRID_RAG_STORAGE_DIR` and `HYBRID_RAG_LOG_LEVEL`. API keys come from
//! `LLM_API_KEY` / `EMBEDDING_API_KEY` only.
//!
//! # Module layout
//!
//! - **types** — resolved structs consumed by the pipeline and providers.
//! - **raw** — TOML shape with serde defaults; private.
//! - **load** — `load`, `load_from`, `defaults`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{defaults, expand_home, load, load_from};
pub use types::*;
