//! Hybrid retrieval-augmented question answering.
//!
//! Chunks are indexed twice: as dense vectors (exact L2 scan) and as a
//! document/entity knowledge graph. Queries run against either index or
//! both, with weighted score fusion, and the top hits are handed to a
//! generation backend.
//!
//! [`pipeline::RagPipeline`] is the single owner of the chunk store and both
//! indexes; every mutation goes through it.

pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod loader;
pub mod logger;
pub mod persistence;
pub mod pipeline;
pub mod retrieval;
pub mod store;

pub use error::{ProviderError, RagError};
pub use pipeline::{Answer, PipelineOptions, PipelineStats, QueryHit, RagPipeline};
pub use retrieval::fusion::SearchMode;
pub use store::{Chunk, ChunkId, RawChunk};
