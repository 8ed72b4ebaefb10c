//! Weighted score fusion of vector and graph rankings.
//!
//! Hybrid search over-fetches `2·k` candidates from each index, takes the
//! union, and scores every chunk as
//! `w_v · vector_score + w_g · graph_score` with a missing side counting as 0.
//! Weights are normalised by their sum. The final order is combined score
//! descending, then chunk id ascending.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::entities::EntityExtractor;
use super::graph::{GraphHit, KnowledgeGraph};
use super::vector_index::{VectorHit, VectorIndex};
use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::store::ChunkId;

/// Candidates requested from each index per requested result in hybrid mode.
pub const OVERFETCH_FACTOR: usize = 2;

// ── Search mode ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Graph,
    Hybrid,
}

impl SearchMode {
    pub const ALL: [SearchMode; 3] = [SearchMode::Vector, SearchMode::Graph, SearchMode::Hybrid];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Vector => "vector",
            SearchMode::Graph => "graph",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = RagError;

    /// Case-insensitive; surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vector" => Ok(SearchMode::Vector),
            "graph" => Ok(SearchMode::Graph),
            "hybrid" => Ok(SearchMode::Hybrid),
            _ => Err(RagError::UnsupportedMode(s.to_string())),
        }
    }
}

// ── Weights ───────────────────────────────────────────────────────────────────

/// Normalised fusion weights. Always finite, non-negative, summing to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    vector: f32,
    graph: f32,
}

impl FusionWeights {
    /// Accepts any finite, non-negative pair with a positive sum and divides
    /// each by the sum. Anything else is `InvalidWeight`.
    pub fn new(vector: f32, graph: f32) -> Result<Self, RagError> {
        let sum = vector + graph;
        let ok = vector.is_finite() && graph.is_finite() && vector >= 0.0 && graph >= 0.0 && sum > 0.0;
        if !ok || !sum.is_finite() {
            return Err(RagError::InvalidWeight { vector, graph });
        }
        Ok(Self { vector: vector / sum, graph: graph / sum })
    }

    pub fn vector(&self) -> f32 {
        self.vector
    }

    pub fn graph(&self) -> f32 {
        self.graph
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.7, graph: 0.3 }
    }
}

// ── Results ───────────────────────────────────────────────────────────────────

/// Per-index scores behind a fused score. `None` = the chunk was not
/// returned by that index (or the index was not queried).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vector: Option<f32>,
    pub graph: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub contributing: ScoreBreakdown,
}

/// Vector-only passthrough: native order, score = vector score.
pub fn from_vector(hits: &[VectorHit]) -> Vec<FusedHit> {
    hits.iter()
        .map(|h| FusedHit {
            chunk_id: h.chunk_id,
            score: h.score,
            contributing: ScoreBreakdown { vector: Some(h.score), graph: None },
        })
        .collect()
}

/// Graph-only passthrough: native order, score = graph score.
pub fn from_graph(hits: &[GraphHit]) -> Vec<FusedHit> {
    hits.iter()
        .map(|h| FusedHit {
            chunk_id: h.chunk_id,
            score: h.score,
            contributing: ScoreBreakdown { vector: None, graph: Some(h.score) },
        })
        .collect()
}

/// Merge two rankings into the top `k` by weighted score.
///
/// Ranking uses f64 sub-scores recomputed from each hit's distance and rank.
/// Distinct distances a few ulps apart can share one f32 `1/(1+d)`; in f64
/// they stay ordered, so only exactly equal inputs fall through to the id
/// tiebreak. The reported score is the f64 value narrowed to f32, which
/// keeps it non-increasing in the returned order.
pub fn fuse(
    vector: &[VectorHit],
    graph: &[GraphHit],
    weights: FusionWeights,
    k: usize,
) -> Vec<FusedHit> {
    let vector_hits: BTreeMap<ChunkId, &VectorHit> = vector.iter().map(|h| (h.chunk_id, h)).collect();
    let graph_hits: BTreeMap<ChunkId, &GraphHit> = graph.iter().map(|h| (h.chunk_id, h)).collect();
    let ids: BTreeSet<ChunkId> = vector_hits.keys().chain(graph_hits.keys()).copied().collect();
    let (wv, wg) = (f64::from(weights.vector), f64::from(weights.graph));

    let mut ranked: Vec<(f64, FusedHit)> = ids
        .into_iter()
        .map(|id| {
            let v = vector_hits.get(&id).copied();
            let g = graph_hits.get(&id).copied();
            let exact = wv * v.map_or(0.0, |h| 1.0 / (1.0 + f64::from(h.distance)))
                + wg * g.map_or(0.0, |h| 1.0 / (1.0 + h.rank as f64));
            let hit = FusedHit {
                chunk_id: id,
                score: exact as f32,
                contributing: ScoreBreakdown { vector: v.map(|h| h.score), graph: g.map(|h| h.score) },
            };
            (exact, hit)
        })
        .collect();

    ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.chunk_id.cmp(&b.1.chunk_id)));
    ranked.truncate(k);
    ranked.into_iter().map(|(_, hit)| hit).collect()
}

// ── Ranker ────────────────────────────────────────────────────────────────────

/// Borrowed view over both built indexes and their query-side collaborators.
#[derive(Debug, Clone, Copy)]
pub struct Ranker<'a> {
    pub vectors: &'a VectorIndex,
    pub graph: &'a KnowledgeGraph,
    pub embedder: &'a EmbeddingProvider,
    pub extractor: &'a EntityExtractor,
}

impl Ranker<'_> {
    /// Dispatch on `mode`. Single modes never touch the other index.
    pub fn search(
        &self,
        query: &str,
        mode: SearchMode,
        k: usize,
        weights: FusionWeights,
    ) -> Result<Vec<FusedHit>, RagError> {
        match mode {
            SearchMode::Vector => Ok(from_vector(&self.vectors.search(self.embedder, query, k)?)),
            SearchMode::Graph => Ok(from_graph(&self.graph.search(query, k, self.extractor))),
            SearchMode::Hybrid => self.hybrid(query, k, weights),
        }
    }

    pub fn hybrid(&self, query: &str, k: usize, weights: FusionWeights) -> Result<Vec<FusedHit>, RagError> {
        let fetch = k.saturating_mul(OVERFETCH_FACTOR);
        let vector_hits = self.vectors.search(self.embedder, query, fetch)?;
        let graph_hits = self.graph.search(query, fetch, self.extractor);
        let fused = fuse(&vector_hits, &graph_hits, weights, k);
        debug!(
            vector_candidates = vector_hits.len(),
            graph_candidates = graph_hits.len(),
            returned = fused.len(),
            w_vector = weights.vector,
            w_graph = weights.graph,
            "hybrid fusion"
        );
        Ok(fused)
    }
}
