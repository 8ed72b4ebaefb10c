//! Authoritative chunk store.
//!
//! Ids are assigned from a monotonically increasing counter and are never
//! reused, not even after [`ChunkStore::clear`]. Iteration is in ascending id
//! order, which is also the row order of the vector index.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::RagError;

pub type ChunkId = u64;

/// Loader output: one piece of text with its provenance, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk {
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
}

impl RawChunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, chunk_index: usize) -> Self {
        Self { text: text.into(), source: source.into(), chunk_index }
    }
}

/// A retrievable unit of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    /// Attached by `build_indexes`; `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: BTreeMap<ChunkId, Chunk>,
    next_id: ChunkId,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted chunks.
    ///
    /// Fails with `CorruptState` on duplicate ids or when `next_id` does not
    /// exceed every stored id.
    pub fn from_parts(chunks: Vec<Chunk>, next_id: ChunkId) -> Result<Self, RagError> {
        let mut map = BTreeMap::new();
        for chunk in chunks {
            if chunk.id >= next_id {
                return Err(RagError::CorruptState(format!(
                    "chunk id {} is not below next_id {next_id}",
                    chunk.id
                )));
            }
            let id = chunk.id;
            if map.insert(id, chunk).is_some() {
                return Err(RagError::CorruptState(format!("duplicate chunk id {id}")));
            }
        }
        Ok(Self { chunks: map, next_id })
    }

    /// Append a chunk under a fresh id.
    pub fn push(&mut self, raw: RawChunk) -> ChunkId {
        let id = self.next_id;
        self.next_id += 1;
        self.chunks.insert(
            id,
            Chunk {
                id,
                text: raw.text,
                source: raw.source,
                chunk_index: raw.chunk_index,
                embedding: None,
            },
        );
        id
    }

    pub fn get(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Id the next pushed chunk will receive.
    pub fn next_id(&self) -> ChunkId {
        self.next_id
    }

    /// Chunks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ChunkId> + '_ {
        self.chunks.keys().copied()
    }

    /// Distinct source identifiers.
    pub fn sources(&self) -> BTreeSet<&str> {
        self.chunks.values().map(|c| c.source.as_str()).collect()
    }

    /// Number of chunks that currently carry an embedding.
    pub fn embedded_count(&self) -> usize {
        self.chunks.values().filter(|c| c.embedding.is_some()).count()
    }

    /// Attach (or replace) a chunk's embedding. Returns `false` for unknown ids.
    pub fn set_embedding(&mut self, id: ChunkId, embedding: Vec<f32>) -> bool {
        match self.chunks.get_mut(&id) {
            Some(chunk) => {
                chunk.embedding = Some(embedding);
                true
            }
            None => false,
        }
    }

    /// Drop every chunk. The id counter keeps running.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential() {
        let mut store = ChunkStore::new();
        let a = store.push(RawChunk::new("alpha", "a.txt", 0));
        let b = store.push(RawChunk::new("beta", "a.txt", 1));
        assert_eq!((a, b), (0, 1));
        assert_eq!(store.next_id(), 2);
        assert_eq!(store.get(b).unwrap().text, "beta");
    }

    #[test]
    fn ids_not_reused_after_clear() {
        let mut store = ChunkStore::new();
        store.push(RawChunk::new("alpha", "a.txt", 0));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.push(RawChunk::new("beta", "b.txt", 0)), 1);
    }

    #[test]
    fn sources_are_distinct() {
        let mut store = ChunkStore::new();
        store.push(RawChunk::new("x", "a.txt", 0));
        store.push(RawChunk::new("y", "a.txt", 1));
        store.push(RawChunk::new("z", "b.txt", 0));
        assert_eq!(store.sources().len(), 2);
    }

    #[test]
    fn set_embedding_unknown_id() {
        let mut store = ChunkStore::new();
        assert!(!store.set_embedding(7, vec![1.0]));
        let id = store.push(RawChunk::new("x", "a", 0));
        assert!(store.set_embedding(id, vec![1.0, 0.0]));
        assert_eq!(store.embedded_count(), 1);
    }

    #[test]
    fn from_parts_rejects_duplicates_and_stale_counter() {
        let chunk = |id| Chunk {
            id,
            text: "t".into(),
            source: "s".into(),
            chunk_index: 0,
            embedding: None,
        };
        assert!(ChunkStore::from_parts(vec![chunk(0), chunk(0)], 5).is_err());
        assert!(ChunkStore::from_parts(vec![chunk(3)], 3).is_err());
        let store = ChunkStore::from_parts(vec![chunk(2), chunk(0)], 3).unwrap();
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![0, 2]);
    }
}
