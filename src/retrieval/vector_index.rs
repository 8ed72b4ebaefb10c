//! Exact nearest-neighbour search over chunk embeddings.
//!
//! Linear scan, O(n·d) per query. Distances are computed in parallel with
//! rayon; the result order is decided afterwards by a stable sort, so ties
//! always fall back to row order (which is ascending chunk id).

use rayon::prelude::*;
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{ProviderError, RagError};
use crate::store::{Chunk, ChunkId};

/// One vector search result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    ids: Vec<ChunkId>,
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Embed every chunk, in `batch_size` groups, and index the result in the
    /// given order. `EmptyInput` when `chunks` is empty.
    pub fn build(
        embedder: &EmbeddingProvider,
        chunks: &[&Chunk],
        batch_size: usize,
    ) -> Result<Self, RagError> {
        if chunks.is_empty() {
            return Err(RagError::EmptyInput);
        }
        let mut rows = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).map_err(RagError::Embedding)?;
            rows.extend(batch.iter().map(|c| c.id).zip(vectors));
            debug!(embedded = rows.len(), total = chunks.len(), "embedding progress");
        }
        let index = Self::from_rows(rows)?;
        info!(rows = index.len(), dimension = index.dimension, "vector index built");
        Ok(index)
    }

    /// Index precomputed `(id, vector)` rows in the given order.
    ///
    /// `EmptyInput` for no rows; an `Embedding` error when vector lengths
    /// differ or are zero.
    pub fn from_rows(rows: Vec<(ChunkId, Vec<f32>)>) -> Result<Self, RagError> {
        let dimension = rows.first().map(|(_, v)| v.len()).ok_or(RagError::EmptyInput)?;
        if dimension == 0 {
            return Err(RagError::Embedding(ProviderError::InvalidResponse(
                "zero-length embedding".into(),
            )));
        }
        if let Some((id, v)) = rows.iter().find(|(_, v)| v.len() != dimension) {
            return Err(RagError::Embedding(ProviderError::InvalidResponse(format!(
                "chunk {id}: embedding length {} differs from {dimension}",
                v.len()
            ))));
        }
        let (ids, vectors) = rows.into_iter().unzip();
        Ok(Self { ids, vectors, dimension })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Row-ordered chunk ids.
    pub fn ids(&self) -> &[ChunkId] {
        &self.ids
    }

    /// Row-ordered `(id, vector)` pairs.
    pub fn rows(&self) -> impl Iterator<Item = (ChunkId, &[f32])> {
        self.ids.iter().copied().zip(self.vectors.iter().map(Vec::as_slice))
    }

    /// Embed `query` and return the `k` closest rows, nearest first.
    pub fn search(
        &self,
        embedder: &EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<Vec<VectorHit>, RagError> {
        let q = embedder.embed(query).map_err(RagError::Embedding)?;
        self.search_embedding(&q, k)
    }

    /// `k` closest rows to an already-embedded query. `k` larger than the
    /// index returns every row.
    pub fn search_embedding(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, RagError> {
        if query.len() != self.dimension {
            return Err(RagError::Embedding(ProviderError::InvalidResponse(format!(
                "query embedding length {} differs from index dimension {}",
                query.len(),
                self.dimension
            ))));
        }
        let distances: Vec<f32> = self.vectors.par_iter().map(|v| squared_l2(query, v)).collect();

        let mut order: Vec<usize> = (0..distances.len()).collect();
        order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
        order.truncate(k);

        Ok(order
            .into_iter()
            .map(|row| VectorHit {
                chunk_id: self.ids[row],
                distance: distances[row],
                score: distance_to_score(distances[row]),
            })
            .collect())
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Map a non-negative distance into `(0, 1]`, decreasing.
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbedder;

    fn index(rows: &[(ChunkId, [f32; 2])]) -> VectorIndex {
        VectorIndex::from_rows(rows.iter().map(|(id, v)| (*id, v.to_vec())).collect()).unwrap()
    }

    #[test]
    fn empty_rows_rejected() {
        assert!(matches!(VectorIndex::from_rows(vec![]), Err(RagError::EmptyInput)));
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = VectorIndex::from_rows(vec![(0, vec![1.0, 0.0]), (1, vec![1.0])]).unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
    }

    #[test]
    fn nearest_first() {
        let idx = index(&[(0, [5.0, 5.0]), (1, [0.0, 0.0]), (2, [1.0, 0.0])]);
        let hits = idx.search_embedding(&[0.0, 0.0], 3).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].score, 0.5);
    }

    #[test]
    fn ties_keep_row_order() {
        let idx = index(&[(4, [1.0, 0.0]), (7, [0.0, 1.0]), (9, [-1.0, 0.0])]);
        let hits = idx.search_embedding(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.chunk_id).collect::<Vec<_>>(), vec![4, 7, 9]);
    }

    #[test]
    fn k_larger_than_rows_returns_all() {
        let idx = index(&[(0, [0.0, 0.0]), (1, [1.0, 1.0])]);
        assert_eq!(idx.search_embedding(&[0.0, 0.0], 10).unwrap().len(), 2);
        assert!(idx.search_embedding(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn query_dimension_mismatch() {
        let idx = index(&[(0, [0.0, 0.0])]);
        assert!(idx.search_embedding(&[0.0], 1).is_err());
    }

    #[test]
    fn build_embeds_in_batches() {
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(64).unwrap());
        let texts = ["alpha apples", "bravo bananas", "charlie cherries", "delta dates", "echo elderberries"];
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: i as ChunkId,
                text: t.to_string(),
                source: "s".into(),
                chunk_index: i,
                embedding: None,
            })
            .collect();
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let idx = VectorIndex::build(&embedder, &refs, 2).unwrap();
        assert_eq!(idx.ids(), &[0, 1, 2, 3, 4]);
        assert_eq!(idx.dimension(), 64);
        let hits = idx.search(&embedder, "delta dates", 1).unwrap();
        assert_eq!(hits[0].chunk_id, 3);
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn build_with_no_chunks_is_empty_input() {
        let embedder = EmbeddingProvider::Hashing(HashingEmbedder::new(8).unwrap());
        assert!(matches!(VectorIndex::build(&embedder, &[], 4), Err(RagError::EmptyInput)));
    }
}
