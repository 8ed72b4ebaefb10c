//! Pipeline coordinator.
//!
//! [`RagPipeline`] owns the chunk store and both indexes and is the only
//! mutation path for them. Callers sharing one pipeline across threads must
//! serialise access themselves; there is no internal locking.
//!
//! Index maintenance is full-rebuild only: `build_indexes` re-embeds and
//! re-links every stored chunk, O(all chunks). Chunks ingested after a build
//! are invisible to queries until the next build.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::llm::prompt::{self, PromptBuilder};
use crate::llm::{GenerationParams, GenerationProvider};
use crate::persistence;
use crate::retrieval::entities::EntityExtractor;
use crate::retrieval::fusion::{FusedHit, FusionWeights, Ranker, ScoreBreakdown, SearchMode};
use crate::retrieval::graph::{EdgeKind, KnowledgeGraph};
use crate::retrieval::vector_index::VectorIndex;
use crate::store::{Chunk, ChunkId, ChunkStore, RawChunk};

// ── Options & result types ────────────────────────────────────────────────────

/// Tunables that are not part of the persisted state.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Characters of chunk text kept on graph document nodes.
    pub preview_chars: usize,
    /// Texts per embedding call during `build_indexes`.
    pub embed_batch_size: usize,
    /// Weights used by `query(.., SearchMode::Hybrid, ..)`.
    pub weights: FusionWeights,
    /// Hits rendered into the answer prompt by `ask`.
    pub context_chunks: usize,
    pub prompt: PromptBuilder,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            preview_chars: 200,
            embed_batch_size: 32,
            weights: FusionWeights::default(),
            context_chunks: 3,
            prompt: PromptBuilder::new(prompt::DEFAULT_TEMPLATE),
        }
    }
}

impl PipelineOptions {
    /// Resolve options from config, loading the prompt template if one is set.
    pub fn from_config(cfg: &Config) -> Result<Self, RagError> {
        Ok(Self {
            preview_chars: cfg.graph.preview_chars,
            embed_batch_size: cfg.embedding.batch_size,
            weights: FusionWeights::new(cfg.retrieval.vector_weight, cfg.retrieval.graph_weight)?,
            context_chunks: cfg.retrieval.context_chunks,
            prompt: PromptBuilder::from_file(cfg.llm.prompt_template.as_deref())?,
        })
    }
}

/// One ranked chunk as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub chunk_id: ChunkId,
    pub source: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
    pub contributing: ScoreBreakdown,
}

/// Generated answer plus the hits it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub mode: SearchMode,
    pub sources: Vec<QueryHit>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub chunks: usize,
    pub sources: usize,
    pub embedded: usize,
    pub vector_rows: usize,
    pub graph_documents: usize,
    pub graph_entities: usize,
    pub contains_edges: usize,
    pub same_source_edges: usize,
    pub built: bool,
}

/// Both indexes, always built (or loaded) together.
#[derive(Debug, Clone)]
pub(crate) struct Indexes {
    pub vectors: VectorIndex,
    pub graph: KnowledgeGraph,
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RagPipeline {
    store: ChunkStore,
    indexes: Option<Indexes>,
    embedder: EmbeddingProvider,
    extractor: EntityExtractor,
    options: PipelineOptions,
}

impl RagPipeline {
    pub fn new(embedder: EmbeddingProvider, extractor: EntityExtractor, options: PipelineOptions) -> Self {
        Self { store: ChunkStore::new(), indexes: None, embedder, extractor, options }
    }

    /// Build the providers and options named by `cfg`. The extractor is the
    /// capitalisation heuristic with `graph.entity_min_length`.
    pub fn from_config(cfg: &Config) -> Result<Self, RagError> {
        let embedder = EmbeddingProvider::from_config(&cfg.embedding, cfg.embedding_api_key.clone())
            .map_err(RagError::Embedding)?;
        let extractor = EntityExtractor::heuristic(cfg.graph.entity_min_length);
        Ok(Self::new(embedder, extractor, PipelineOptions::from_config(cfg)?))
    }

    pub(crate) fn from_parts(
        store: ChunkStore,
        indexes: Indexes,
        embedder: EmbeddingProvider,
        extractor: EntityExtractor,
        options: PipelineOptions,
    ) -> Self {
        Self { store, indexes: Some(indexes), embedder, extractor, options }
    }

    pub(crate) fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub(crate) fn indexes(&self) -> Option<&Indexes> {
        self.indexes.as_ref()
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn embedder(&self) -> &EmbeddingProvider {
        &self.embedder
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.store.get(id)
    }

    pub fn is_built(&self) -> bool {
        self.indexes.is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Append chunks under fresh ids, in input order. Whitespace-only chunks
    /// are dropped. Does not touch the indexes.
    pub fn ingest(&mut self, chunks: impl IntoIterator<Item = RawChunk>) -> Vec<ChunkId> {
        let mut ids = Vec::new();
        let mut skipped = 0usize;
        for raw in chunks {
            if raw.text.trim().is_empty() {
                skipped += 1;
                continue;
            }
            ids.push(self.store.push(raw));
        }
        if skipped > 0 {
            warn!(skipped, "dropped whitespace-only chunks");
        }
        info!(added = ids.len(), total = self.store.len(), "ingested chunks");
        ids
    }

    /// Rebuild both indexes from every stored chunk and attach embeddings.
    ///
    /// `EmptyInput` when the store is empty. On any failure the previous
    /// indexes stay in place.
    pub fn build_indexes(&mut self) -> Result<(), RagError> {
        if self.store.is_empty() {
            return Err(RagError::EmptyInput);
        }
        info!(chunks = self.store.len(), "building indexes");
        let (vectors, graph) = {
            let chunks: Vec<&Chunk> = self.store.iter().collect();
            let vectors = VectorIndex::build(&self.embedder, &chunks, self.options.embed_batch_size)?;
            let graph = KnowledgeGraph::build(&chunks, &self.extractor, self.options.preview_chars)?;
            (vectors, graph)
        };

        let rows: Vec<(ChunkId, Vec<f32>)> = vectors.rows().map(|(id, v)| (id, v.to_vec())).collect();
        for (id, embedding) in rows {
            self.store.set_embedding(id, embedding);
        }
        self.indexes = Some(Indexes { vectors, graph });
        info!(
            rows = self.store.embedded_count(),
            provider = self.embedder.name(),
            "indexes built"
        );
        Ok(())
    }

    /// Drop every chunk and both indexes. Ids keep counting up.
    pub fn reset(&mut self) {
        self.store.clear();
        self.indexes = None;
        info!("pipeline reset");
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Ranked chunks for `query` using `mode`; hybrid uses the configured
    /// weights.
    pub fn query(&self, query: &str, mode: SearchMode, k: usize) -> Result<Vec<QueryHit>, RagError> {
        self.run_query(query, mode, k, self.options.weights)
    }

    /// Hybrid search with explicit weights. Weights are validated before
    /// anything else.
    pub fn hybrid_search(
        &self,
        query: &str,
        k: usize,
        vector_weight: f32,
        graph_weight: f32,
    ) -> Result<Vec<QueryHit>, RagError> {
        let weights = FusionWeights::new(vector_weight, graph_weight)?;
        self.run_query(query, SearchMode::Hybrid, k, weights)
    }

    fn run_query(
        &self,
        query: &str,
        mode: SearchMode,
        k: usize,
        weights: FusionWeights,
    ) -> Result<Vec<QueryHit>, RagError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }
        let indexes = self.indexes.as_ref().ok_or(RagError::NotBuilt)?;
        if indexes.vectors.len() != self.store.len() {
            warn!(
                indexed = indexes.vectors.len(),
                stored = self.store.len(),
                "chunks ingested since the last build are not searchable"
            );
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ranker = Ranker {
            vectors: &indexes.vectors,
            graph: &indexes.graph,
            embedder: &self.embedder,
            extractor: &self.extractor,
        };
        let fused = ranker.search(query, mode, k, weights)?;
        info!(%mode, k, hits = fused.len(), "query");
        Ok(fused.into_iter().filter_map(|hit| self.to_query_hit(hit)).collect())
    }

    fn to_query_hit(&self, hit: FusedHit) -> Option<QueryHit> {
        let chunk = self.store.get(hit.chunk_id)?;
        Some(QueryHit {
            chunk_id: chunk.id,
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index,
            text: chunk.text.clone(),
            score: hit.score,
            contributing: hit.contributing,
        })
    }

    /// Retrieve, render the answer prompt over the top hits, and generate.
    pub fn ask(
        &self,
        question: &str,
        mode: SearchMode,
        k: usize,
        generator: &GenerationProvider,
        params: &GenerationParams,
    ) -> Result<Answer, RagError> {
        let sources = self.query(question, mode, k)?;
        let contexts: Vec<&str> = sources
            .iter()
            .take(self.options.context_chunks)
            .map(|h| h.text.as_str())
            .collect();
        let prompt = prompt::render(&self.options.prompt, question.trim(), &contexts);
        let raw = generator.generate(&prompt, params).map_err(RagError::Generation)?;
        info!(provider = generator.name(), context = contexts.len(), "answer generated");
        Ok(Answer {
            question: question.trim().to_string(),
            answer: prompt::extract_answer(&raw),
            mode,
            sources,
        })
    }

    // ── Graph views ──────────────────────────────────────────────────────────

    fn graph(&self) -> Result<&KnowledgeGraph, RagError> {
        self.indexes.as_ref().map(|i| &i.graph).ok_or(RagError::NotBuilt)
    }

    pub fn entities_of(&self, chunk_id: ChunkId) -> Result<Vec<String>, RagError> {
        Ok(self.graph()?.entities_of(chunk_id).into_iter().map(str::to_string).collect())
    }

    pub fn chunks_mentioning(&self, entity: &str) -> Result<Vec<ChunkId>, RagError> {
        Ok(self.graph()?.chunks_mentioning(entity))
    }

    pub fn same_source_neighbors(&self, chunk_id: ChunkId) -> Result<Vec<ChunkId>, RagError> {
        Ok(self.graph()?.same_source_neighbors(chunk_id))
    }

    pub fn degree_centrality(&self, chunk_id: ChunkId) -> Result<Option<f64>, RagError> {
        Ok(self.graph()?.degree_centrality(chunk_id))
    }

    pub fn stats(&self) -> PipelineStats {
        let mut stats = PipelineStats {
            chunks: self.store.len(),
            sources: self.store.sources().len(),
            embedded: self.store.embedded_count(),
            ..PipelineStats::default()
        };
        if let Some(idx) = &self.indexes {
            stats.built = true;
            stats.vector_rows = idx.vectors.len();
            stats.graph_documents = idx.graph.document_count();
            stats.graph_entities = idx.graph.entity_count();
            stats.contains_edges = idx.graph.edge_count(EdgeKind::Contains);
            stats.same_source_edges = idx.graph.edge_count(EdgeKind::SameSource);
        }
        stats
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Write chunks, vectors and graph to `dir` as one snapshot.
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        persistence::save(self, dir)
    }

    /// Load the snapshot in `cfg.storage_dir` with the providers `cfg` names.
    pub fn open(cfg: &Config) -> Result<Self, RagError> {
        let fresh = Self::from_config(cfg)?;
        Self::load(&cfg.storage_dir, fresh.embedder, fresh.extractor, fresh.options)
    }

    /// Load a snapshot written by [`save`](Self::save). The providers and
    /// options are not persisted and must be supplied again.
    pub fn load(
        dir: &Path,
        embedder: EmbeddingProvider,
        extractor: EntityExtractor,
        options: PipelineOptions,
    ) -> Result<Self, RagError> {
        persistence::load(dir, embedder, extractor, options)
    }
}
