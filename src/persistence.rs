//! On-disk snapshot of a built pipeline.
//!
//! ## Layout
//! ```text
//! {dir}/
//! ├── chunks.json    # chunk store: id counter + chunks (with embeddings)
//! ├── vectors.json   # vector rows in index order + SHA-256 digest
//! └── graph.json     # graph nodes + typed edges
//! ```
//!
//! All three carry the same `format_version` and `snapshot_id`; they are
//! loaded together or not at all. Each file is written to `*.tmp` first and
//! renamed into place once all three temp files exist.
//!
//! `load` refuses anything that does not line up: missing files, mixed
//! snapshots, vector rows that disagree with the chunks' embeddings, graph
//! documents that are not exactly the indexed chunks. Every such failure is
//! `CorruptState`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::embedding::EmbeddingProvider;
use crate::error::RagError;
use crate::pipeline::{Indexes, PipelineOptions, RagPipeline};
use crate::retrieval::entities::EntityExtractor;
use crate::retrieval::graph::{GraphNode, GraphSnapshot, KnowledgeGraph};
use crate::retrieval::vector_index::VectorIndex;
use crate::store::{Chunk, ChunkId, ChunkStore};

// ── Storage constants ─────────────────────────────────────────────────────────

pub const FORMAT_VERSION: u32 = 1;
pub const CHUNKS_FILE: &str = "chunks.json";
pub const VECTORS_FILE: &str = "vectors.json";
pub const GRAPH_FILE: &str = "graph.json";

// ── File shapes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    format_version: u32,
    snapshot_id: Uuid,
    /// RFC 3339, informational only.
    saved_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunksFile {
    #[serde(flatten)]
    header: Header,
    next_id: ChunkId,
    chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorsFile {
    #[serde(flatten)]
    header: Header,
    dimension: usize,
    /// Hex SHA-256 over every row's id and vector bytes, in row order.
    digest: String,
    rows: Vec<VectorRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorRow {
    chunk_id: ChunkId,
    vector: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphFile {
    #[serde(flatten)]
    header: Header,
    graph: GraphSnapshot,
}

// ── Save ──────────────────────────────────────────────────────────────────────

/// Write `pipeline` to `dir`, creating it if needed. `NotBuilt` when the
/// pipeline has no indexes.
pub fn save(pipeline: &RagPipeline, dir: &Path) -> Result<(), RagError> {
    let indexes = pipeline.indexes().ok_or(RagError::NotBuilt)?;
    let store = pipeline.store();
    fs::create_dir_all(dir)?;

    let header = Header {
        format_version: FORMAT_VERSION,
        snapshot_id: Uuid::now_v7(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    };

    let rows: Vec<VectorRow> = indexes
        .vectors
        .rows()
        .map(|(chunk_id, v)| VectorRow { chunk_id, vector: v.to_vec() })
        .collect();

    let chunks = ChunksFile {
        header: header.clone(),
        next_id: store.next_id(),
        chunks: store.iter().cloned().collect(),
    };
    let vectors = VectorsFile {
        header: header.clone(),
        dimension: indexes.vectors.dimension(),
        digest: rows_digest(&rows),
        rows,
    };
    let graph = GraphFile { header: header.clone(), graph: indexes.graph.to_snapshot() };

    let staged = [
        stage(dir, CHUNKS_FILE, &chunks)?,
        stage(dir, VECTORS_FILE, &vectors)?,
        stage(dir, GRAPH_FILE, &graph)?,
    ];
    for (tmp, target) in &staged {
        fs::rename(tmp, target)?;
    }

    info!(
        dir = %dir.display(),
        snapshot = %header.snapshot_id,
        chunks = chunks.chunks.len(),
        rows = vectors.rows.len(),
        "pipeline saved"
    );
    Ok(())
}

/// Serialise `value` to `{dir}/{name}.tmp`; returns `(tmp, final)` paths.
fn stage<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(PathBuf, PathBuf), RagError> {
    let target = dir.join(name);
    let tmp = dir.join(format!("{name}.tmp"));
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    fs::write(&tmp, json)?;
    debug!(path = %tmp.display(), "staged snapshot file");
    Ok((tmp, target))
}

fn rows_digest(rows: &[VectorRow]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(row.chunk_id.to_le_bytes());
        for x in &row.vector {
            hasher.update(x.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

// ── Load ──────────────────────────────────────────────────────────────────────

/// Read and cross-check a snapshot, then assemble a built pipeline around
/// the given providers.
pub fn load(
    dir: &Path,
    embedder: EmbeddingProvider,
    extractor: EntityExtractor,
    options: PipelineOptions,
) -> Result<RagPipeline, RagError> {
    let chunks: ChunksFile = read(dir, CHUNKS_FILE)?;
    let vectors: VectorsFile = read(dir, VECTORS_FILE)?;
    let graph: GraphFile = read(dir, GRAPH_FILE)?;

    for (name, h) in [
        (CHUNKS_FILE, &chunks.header),
        (VECTORS_FILE, &vectors.header),
        (GRAPH_FILE, &graph.header),
    ] {
        if h.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "{name}: format_version {} (expected {FORMAT_VERSION})",
                h.format_version
            )));
        }
    }
    let snapshot = chunks.header.snapshot_id;
    if vectors.header.snapshot_id != snapshot || graph.header.snapshot_id != snapshot {
        return Err(corrupt("files belong to different snapshots".into()));
    }

    let store = ChunkStore::from_parts(chunks.chunks, chunks.next_id)?;
    let vector_index = check_vectors(&store, vectors, &embedder)?;
    let kg = check_graph(&store, &vector_index, graph.graph)?;

    info!(
        dir = %dir.display(),
        %snapshot,
        chunks = store.len(),
        rows = vector_index.len(),
        "pipeline loaded"
    );
    let indexes = Indexes { vectors: vector_index, graph: kg };
    Ok(RagPipeline::from_parts(store, indexes, embedder, extractor, options))
}

fn read<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, RagError> {
    let path = dir.join(name);
    if !path.exists() {
        return Err(corrupt(format!("{name} is missing")));
    }
    let data = fs::read_to_string(&path)?;
    serde_json::from_str(&data).map_err(|e| corrupt(format!("{name}: {e}")))
}

fn check_vectors(
    store: &ChunkStore,
    file: VectorsFile,
    embedder: &EmbeddingProvider,
) -> Result<VectorIndex, RagError> {
    if rows_digest(&file.rows) != file.digest {
        return Err(corrupt("vectors.json digest mismatch".into()));
    }
    if let Some(expected) = embedder.dimension() {
        if expected != file.dimension {
            return Err(corrupt(format!(
                "vector dimension {} does not match the {} embedder ({expected})",
                file.dimension,
                embedder.name()
            )));
        }
    }
    if !file.rows.windows(2).all(|w| w[0].chunk_id < w[1].chunk_id) {
        return Err(corrupt("vector rows are not in ascending chunk id order".into()));
    }

    let row_ids: BTreeSet<ChunkId> = file.rows.iter().map(|r| r.chunk_id).collect();
    let embedded: BTreeSet<ChunkId> = store
        .iter()
        .filter(|c| c.embedding.is_some())
        .map(|c| c.id)
        .collect();
    if row_ids != embedded {
        return Err(corrupt(format!(
            "vector rows cover {} chunks but {} chunks carry embeddings",
            row_ids.len(),
            embedded.len()
        )));
    }
    for row in &file.rows {
        if row.vector.len() != file.dimension {
            return Err(corrupt(format!("row for chunk {} has wrong length", row.chunk_id)));
        }
        let stored = store.get(row.chunk_id).and_then(|c| c.embedding.as_ref());
        if stored != Some(&row.vector) {
            return Err(corrupt(format!(
                "row for chunk {} differs from the chunk's embedding",
                row.chunk_id
            )));
        }
    }

    let rows = file.rows.into_iter().map(|r| (r.chunk_id, r.vector)).collect();
    VectorIndex::from_rows(rows).map_err(|e| corrupt(format!("vector index: {e}")))
}

fn check_graph(
    store: &ChunkStore,
    vectors: &VectorIndex,
    snapshot: GraphSnapshot,
) -> Result<KnowledgeGraph, RagError> {
    for node in &snapshot.nodes {
        if let GraphNode::Document { chunk_id, source, .. } = node {
            match store.get(*chunk_id) {
                Some(chunk) if chunk.source == *source => {}
                Some(_) => {
                    return Err(corrupt(format!("graph document {chunk_id} has the wrong source")));
                }
                None => {
                    return Err(corrupt(format!("graph references unknown chunk {chunk_id}")));
                }
            }
        }
    }
    let kg = KnowledgeGraph::from_snapshot(snapshot)?;
    let indexed: BTreeSet<ChunkId> = vectors.ids().iter().copied().collect();
    if kg.document_ids() != indexed {
        return Err(corrupt(format!(
            "graph has {} documents but the vector index has {} rows",
            kg.document_count(),
            indexed.len()
        )));
    }
    Ok(kg)
}

fn corrupt(msg: String) -> RagError {
    RagError::CorruptState(msg)
}
