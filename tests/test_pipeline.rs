//! End-to-end pipeline tests: load → ingest → build → query → ask.
//!
//! All tests use the hashing embedder and the dummy generator; no network.

use std::fs;

use hybrid_rag::config;
use hybrid_rag::embedding::EmbeddingProvider;
use hybrid_rag::embedding::hashing::HashingEmbedder;
use hybrid_rag::llm::{self, GenerationParams};
use hybrid_rag::loader;
use hybrid_rag::pipeline::{PipelineOptions, RagPipeline};
use hybrid_rag::retrieval::entities::EntityExtractor;
use hybrid_rag::{RagError, RawChunk, SearchMode};
use tempfile::TempDir;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn new_pipeline() -> RagPipeline {
    RagPipeline::new(
        EmbeddingProvider::Hashing(HashingEmbedder::new(128).expect("embedder")),
        EntityExtractor::default(),
        PipelineOptions::default(),
    )
}

fn alice_bob() -> RagPipeline {
    let mut p = new_pipeline();
    p.ingest([
        RawChunk::new("Alice met Bob in Paris.", "doc1", 0),
        RawChunk::new("Bob works at Acme.", "doc2", 0),
    ]);
    p.build_indexes().expect("build");
    p
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn shared_entity_surfaces_both_chunks_lowest_id_first() {
    let p = alice_bob();
    let hits = p.query("Who is Bob?", SearchMode::Graph, 2).unwrap();
    let sources: Vec<&str> = hits.iter().map(|h| h.source.as_str()).collect();
    assert_eq!(sources, vec!["doc1", "doc2"]);
    assert_eq!(hits[0].score, 1.0);
    assert_eq!(hits[1].score, 0.5);
}

#[test]
fn build_with_empty_store_is_empty_input() {
    let mut p = new_pipeline();
    assert!(matches!(p.build_indexes(), Err(RagError::EmptyInput)));
    // Only whitespace: still nothing to index.
    p.ingest([RawChunk::new("   ", "blank", 0)]);
    assert!(matches!(p.build_indexes(), Err(RagError::EmptyInput)));
}

#[test]
fn zero_weights_are_invalid() {
    let p = alice_bob();
    let err = p.hybrid_search("Who is Bob?", 2, 0.0, 0.0).unwrap_err();
    assert!(matches!(err, RagError::InvalidWeight { .. }));
}

#[test]
fn unnormalised_weights_equal_normalised() {
    let p = alice_bob();
    let a = p.hybrid_search("Where does Bob work?", 2, 7.0, 3.0).unwrap();
    let b = p.hybrid_search("Where does Bob work?", 2, 0.7, 0.3).unwrap();
    assert_eq!(a.iter().map(|h| h.chunk_id).collect::<Vec<_>>(), b.iter().map(|h| h.chunk_id).collect::<Vec<_>>());
    for (x, y) in a.iter().zip(&b) {
        assert!((x.score - y.score).abs() < 1e-6);
    }
}

#[test]
fn query_before_build_and_blank_query() {
    let mut p = new_pipeline();
    p.ingest([RawChunk::new("Alice met Bob.", "doc1", 0)]);
    assert!(matches!(p.query("Bob", SearchMode::Hybrid, 3), Err(RagError::NotBuilt)));
    p.build_indexes().unwrap();
    assert!(matches!(p.query("", SearchMode::Hybrid, 3), Err(RagError::EmptyQuery)));
}

#[test]
fn unknown_mode_string_is_unsupported() {
    let err = "keyword".parse::<SearchMode>().unwrap_err();
    assert!(matches!(err, RagError::UnsupportedMode(m) if m == "keyword"));
}

#[test]
fn vector_mode_returns_every_chunk_when_k_is_large() {
    let p = alice_bob();
    let hits = p.query("anything at all", SearchMode::Vector, 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.contributing.graph.is_none() && h.score > 0.0 && h.score <= 1.0));
}

#[test]
fn ingest_after_build_needs_rebuild() {
    let mut p = alice_bob();
    p.ingest([RawChunk::new("Carol runs Globex.", "doc3", 0)]);
    assert!(p.query("Carol", SearchMode::Graph, 5).unwrap().is_empty());
    p.build_indexes().unwrap();
    let hits = p.query("Carol", SearchMode::Graph, 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "doc3");
    assert_eq!(p.stats().embedded, 3);
}

#[test]
fn ids_stay_stable_across_rebuilds() {
    let mut p = alice_bob();
    let before = p.chunk(1).unwrap().clone();
    p.build_indexes().unwrap();
    let after = p.chunk(1).unwrap();
    assert_eq!(before.id, after.id);
    assert_eq!(before.text, after.text);
    assert_eq!(before.embedding, after.embedding);
}

#[test]
fn same_source_chunks_are_linked() {
    let mut p = new_pipeline();
    p.ingest([
        RawChunk::new("Dave founded Initech.", "report.md", 0),
        RawChunk::new("The company grew quickly.", "report.md", 1),
        RawChunk::new("Unrelated text.", "other.md", 0),
    ]);
    p.build_indexes().unwrap();
    assert_eq!(p.same_source_neighbors(0).unwrap(), vec![1]);
    assert_eq!(p.same_source_neighbors(1).unwrap(), vec![0]);
    assert!(p.same_source_neighbors(2).unwrap().is_empty());
    assert_eq!(p.stats().same_source_edges, 2);
}

#[test]
fn vector_only_hybrid_keeps_vector_order_on_rounded_score_ties() {
    // The query shares no token with either chunk, so both distances land a
    // few ulps apart near 2.0 and their f32 scores coincide.
    let mut p = RagPipeline::new(
        EmbeddingProvider::Hashing(HashingEmbedder::new(48).expect("embedder")),
        EntityExtractor::default(),
        PipelineOptions::default(),
    );
    p.ingest([
        RawChunk::new("Alice Alice Bob Dave Dave", "src0", 0),
        RawChunk::new("Paris Alice", "src0", 1),
    ]);
    p.build_indexes().unwrap();

    let vector: Vec<u64> = p.query("Acme Globex", SearchMode::Vector, 2).unwrap().iter().map(|h| h.chunk_id).collect();
    let hybrid: Vec<u64> = p.hybrid_search("Acme Globex", 2, 1.0, 0.0).unwrap().iter().map(|h| h.chunk_id).collect();
    assert_eq!(hybrid, vector);
}

// ── Config, loader and generation ─────────────────────────────────────────────

#[test]
fn directory_to_answer_with_default_config() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("people.txt"), "Alice met Bob in Paris.").unwrap();
    fs::write(docs.path().join("work.md"), "# Work\n\nBob works at Acme.").unwrap();

    let cfg = config::defaults().unwrap();
    let mut p = RagPipeline::from_config(&cfg).unwrap();
    let chunks = loader::load_documents(docs.path(), &cfg.chunking).unwrap();
    assert_eq!(chunks.len(), 2);
    p.ingest(chunks);
    p.build_indexes().unwrap();

    let generator = llm::providers::build(&cfg.llm, None).unwrap();
    let answer = p
        .ask("Who is Bob?", SearchMode::Hybrid, 2, &generator, &GenerationParams::from(&cfg.llm))
        .unwrap();
    assert_eq!(answer.question, "Who is Bob?");
    assert_eq!(answer.mode, SearchMode::Hybrid);
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.answer.contains("Question: Who is Bob?"));
}

#[test]
fn context_is_limited_to_configured_chunks() {
    let mut p = RagPipeline::new(
        EmbeddingProvider::Hashing(HashingEmbedder::new(64).unwrap()),
        EntityExtractor::default(),
        PipelineOptions { context_chunks: 1, ..PipelineOptions::default() },
    );
    p.ingest([
        RawChunk::new("Bob likes tea.", "a", 0),
        RawChunk::new("Bob likes coffee.", "b", 0),
    ]);
    p.build_indexes().unwrap();
    let generator = llm::GenerationProvider::Dummy(llm::providers::dummy::DummyProvider);
    let answer = p
        .ask("Bob", SearchMode::Graph, 2, &generator, &GenerationParams::default())
        .unwrap();
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.answer.contains("Document 1:"));
    assert!(!answer.answer.contains("Document 2:"));
}

#[test]
fn custom_extractor_drives_graph_search() {
    let ex = EntityExtractor::from_fn(|text| {
        text.split_whitespace()
            .filter(|w| w.starts_with('#'))
            .map(|w| w.trim_start_matches('#').to_string())
            .collect()
    });
    let mut p = RagPipeline::new(
        EmbeddingProvider::Hashing(HashingEmbedder::new(32).unwrap()),
        ex,
        PipelineOptions::default(),
    );
    p.ingest([
        RawChunk::new("notes about #rust and #graphs", "n", 0),
        RawChunk::new("more on #graphs", "n", 1),
    ]);
    p.build_indexes().unwrap();
    let hits = p.query("#rust #graphs", SearchMode::Graph, 5).unwrap();
    assert_eq!(hits.iter().map(|h| h.chunk_id).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(p.chunks_mentioning("GRAPHS").unwrap(), vec![0, 1]);
}
