//! Knowledge graph over chunks and the entities they mention.
//!
//! Nodes are either a document (one per chunk) or an entity (one per
//! normalised entity string). Edges are directed:
//!
//! - `contains`: document → entity, the chunk's text mentions the entity.
//! - `same_source`: document → document, both chunks come from the same
//!   source. Added in both directions for every pair, so a source with `m`
//!   chunks contributes `m·(m−1)` edges. That is the known scaling limit of
//!   the build.
//!
//! Graph search follows `contains` edges one hop back from the query's
//! entities and ranks the reached chunks by how many distinct query entities
//! reach them, then by degree centrality, then by ascending chunk id.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::entities::{EntityExtractor, normalize};
use crate::error::RagError;
use crate::store::{Chunk, ChunkId};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphNode {
    Document {
        chunk_id: ChunkId,
        /// First `preview_chars` characters of the chunk text.
        preview: String,
        source: String,
    },
    Entity {
        /// Normalised (trimmed, lowercase) entity string.
        name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    SameSource,
}

/// One graph search result.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphHit {
    pub chunk_id: ChunkId,
    /// 0 = best.
    pub rank: usize,
    /// Distinct query entities connected to this chunk.
    pub matched_entities: usize,
    pub centrality: f64,
    /// `1 / (1 + rank)`.
    pub score: f32,
}

/// Serialisable form: node list plus edges as node positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

// ── Graph ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<GraphNode, EdgeKind>,
    documents: HashMap<ChunkId, NodeIndex>,
    entities: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Full build from `chunks` (in the given order). `EmptyInput` when empty.
    pub fn build(
        chunks: &[&Chunk],
        extractor: &EntityExtractor,
        preview_chars: usize,
    ) -> Result<Self, RagError> {
        if chunks.is_empty() {
            return Err(RagError::EmptyInput);
        }
        let mut kg = Self::default();
        let mut by_source: BTreeMap<&str, Vec<NodeIndex>> = BTreeMap::new();

        for chunk in chunks {
            if kg.documents.contains_key(&chunk.id) {
                continue;
            }
            let doc = kg.add_document(chunk, preview_chars);
            for entity in extractor.extract(&chunk.text) {
                let ent = kg.add_entity(entity);
                kg.add_edge_once(doc, ent, EdgeKind::Contains);
            }
            by_source.entry(chunk.source.as_str()).or_default().push(doc);
        }

        for docs in by_source.values() {
            for &a in docs {
                for &b in docs {
                    if a != b {
                        kg.add_edge_once(a, b, EdgeKind::SameSource);
                    }
                }
            }
        }

        info!(
            documents = kg.document_count(),
            entities = kg.entity_count(),
            edges = kg.graph.edge_count(),
            "knowledge graph built"
        );
        Ok(kg)
    }

    fn add_document(&mut self, chunk: &Chunk, preview_chars: usize) -> NodeIndex {
        let idx = self.graph.add_node(GraphNode::Document {
            chunk_id: chunk.id,
            preview: chunk.text.chars().take(preview_chars).collect(),
            source: chunk.source.clone(),
        });
        self.documents.insert(chunk.id, idx);
        idx
    }

    fn add_entity(&mut self, name: String) -> NodeIndex {
        if let Some(&idx) = self.entities.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Entity { name: name.clone() });
        self.entities.insert(name, idx);
        idx
    }

    /// Returns `false` when an edge of this kind already joins the pair.
    fn add_edge_once(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> bool {
        if self.graph.edges_connecting(from, to).any(|e| *e.weight() == kind) {
            return false;
        }
        self.graph.add_edge(from, to, kind);
        true
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Rank chunks reachable from the query's entities. No matching entity
    /// yields an empty result.
    pub fn search(&self, query: &str, k: usize, extractor: &EntityExtractor) -> Vec<GraphHit> {
        let query_entities = extractor.extract(query);
        let mut matches: BTreeMap<ChunkId, usize> = BTreeMap::new();

        for entity in &query_entities {
            let Some(&ent) = self.entities.get(entity) else { continue };
            for doc in self.contains_sources(ent) {
                *matches.entry(doc).or_default() += 1;
            }
        }

        let mut candidates: Vec<(ChunkId, usize, f64)> = matches
            .into_iter()
            .map(|(id, n)| (id, n, self.degree_centrality(id).unwrap_or(0.0)))
            .collect();
        candidates.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| b.2.total_cmp(&a.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(k);

        debug!(
            query_entities = query_entities.len(),
            hits = candidates.len(),
            "graph search"
        );

        candidates
            .into_iter()
            .enumerate()
            .map(|(rank, (chunk_id, matched_entities, centrality))| GraphHit {
                chunk_id,
                rank,
                matched_entities,
                centrality,
                score: rank_to_score(rank),
            })
            .collect()
    }

    /// Chunk ids with a `contains` edge into entity node `ent`.
    fn contains_sources(&self, ent: NodeIndex) -> impl Iterator<Item = ChunkId> + '_ {
        self.graph
            .edges_directed(ent, Direction::Incoming)
            .filter(|e| *e.weight() == EdgeKind::Contains)
            .filter_map(|e| match &self.graph[e.source()] {
                GraphNode::Document { chunk_id, .. } => Some(*chunk_id),
                GraphNode::Entity { .. } => None,
            })
    }

    /// `(in-degree + out-degree) / (n − 1)` over the whole graph, or 1.0
    /// for a single-node graph. `None` for unknown chunk ids.
    pub fn degree_centrality(&self, chunk_id: ChunkId) -> Option<f64> {
        let &idx = self.documents.get(&chunk_id)?;
        let n = self.graph.node_count();
        if n <= 1 {
            return Some(1.0);
        }
        let degree = self.graph.edges_directed(idx, Direction::Incoming).count()
            + self.graph.edges_directed(idx, Direction::Outgoing).count();
        Some(degree as f64 / (n - 1) as f64)
    }

    /// Entities mentioned by a chunk, sorted.
    pub fn entities_of(&self, chunk_id: ChunkId) -> Vec<&str> {
        let Some(&idx) = self.documents.get(&chunk_id) else { return Vec::new() };
        let mut out: Vec<&str> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == EdgeKind::Contains)
            .filter_map(|e| match &self.graph[e.target()] {
                GraphNode::Entity { name } => Some(name.as_str()),
                GraphNode::Document { .. } => None,
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Chunks whose text mentions `entity` (normalised before lookup), ascending.
    pub fn chunks_mentioning(&self, entity: &str) -> Vec<ChunkId> {
        let Some(&ent) = self.entities.get(&normalize(entity)) else { return Vec::new() };
        let ids: BTreeSet<ChunkId> = self.contains_sources(ent).collect();
        ids.into_iter().collect()
    }

    /// Other chunks from the same source, ascending.
    pub fn same_source_neighbors(&self, chunk_id: ChunkId) -> Vec<ChunkId> {
        let Some(&idx) = self.documents.get(&chunk_id) else { return Vec::new() };
        let ids: BTreeSet<ChunkId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == EdgeKind::SameSource)
            .filter_map(|e| self.document_id(e.target()))
            .collect();
        ids.into_iter().collect()
    }

    fn document_id(&self, idx: NodeIndex) -> Option<ChunkId> {
        match &self.graph[idx] {
            GraphNode::Document { chunk_id, .. } => Some(*chunk_id),
            GraphNode::Entity { .. } => None,
        }
    }

    pub fn document_ids(&self) -> BTreeSet<ChunkId> {
        self.documents.keys().copied().collect()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.graph.edge_weights().filter(|w| **w == kind).count()
    }

    // ── Snapshot ─────────────────────────────────────────────────────────────

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let nodes = self.graph.node_weights().cloned().collect();
        let edges = self
            .graph
            .edge_references()
            .map(|e| GraphEdge {
                from: e.source().index(),
                to: e.target().index(),
                kind: *e.weight(),
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }

    /// Rebuild from a snapshot, checking that it is structurally sound:
    /// unique documents and entities, edges in range and between the right
    /// node kinds, `same_source` only between chunks sharing a source, and
    /// no duplicate edges. Any violation is `CorruptState`.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, RagError> {
        let mut kg = Self::default();
        for node in snapshot.nodes {
            match &node {
                GraphNode::Document { chunk_id, .. } => {
                    let id = *chunk_id;
                    let idx = kg.graph.add_node(node);
                    if kg.documents.insert(id, idx).is_some() {
                        return Err(corrupt(format!("duplicate document node for chunk {id}")));
                    }
                }
                GraphNode::Entity { name } => {
                    if name.is_empty() || normalize(name) != *name {
                        return Err(corrupt(format!("entity '{name}' is not normalised")));
                    }
                    let name = name.clone();
                    let idx = kg.graph.add_node(node);
                    if kg.entities.insert(name.clone(), idx).is_some() {
                        return Err(corrupt(format!("duplicate entity node '{name}'")));
                    }
                }
            }
        }

        let n = kg.graph.node_count();
        for edge in snapshot.edges {
            if edge.from >= n || edge.to >= n || edge.from == edge.to {
                return Err(corrupt(format!("edge {} -> {} out of range", edge.from, edge.to)));
            }
            let (from, to) = (NodeIndex::new(edge.from), NodeIndex::new(edge.to));
            let valid = match (&kg.graph[from], &kg.graph[to], edge.kind) {
                (GraphNode::Document { .. }, GraphNode::Entity { .. }, EdgeKind::Contains) => true,
                (
                    GraphNode::Document { source: a, .. },
                    GraphNode::Document { source: b, .. },
                    EdgeKind::SameSource,
                ) => a == b,
                _ => false,
            };
            if !valid {
                return Err(corrupt(format!(
                    "{:?} edge {} -> {} joins the wrong nodes",
                    edge.kind, edge.from, edge.to
                )));
            }
            if !kg.add_edge_once(from, to, edge.kind) {
                return Err(corrupt(format!("duplicate edge {} -> {}", edge.from, edge.to)));
            }
        }
        Ok(kg)
    }
}

fn corrupt(msg: String) -> RagError {
    RagError::CorruptState(format!("graph: {msg}"))
}

/// Graph rank to fusion score: 1.0, 0.5, 0.333…
pub fn rank_to_score(rank: usize) -> f32 {
    1.0 / (1.0 + rank as f32)
}
