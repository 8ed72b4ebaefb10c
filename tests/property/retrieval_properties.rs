//! Property tests for ranking invariants: vector completeness and ordering,
//! graph rank ordering, hybrid/vector equivalence, determinism, and
//! save/load stability.

use proptest::prelude::*;
use tempfile::TempDir;

use hybrid_rag::embedding::EmbeddingProvider;
use hybrid_rag::embedding::hashing::HashingEmbedder;
use hybrid_rag::pipeline::{PipelineOptions, RagPipeline};
use hybrid_rag::retrieval::entities::EntityExtractor;
use hybrid_rag::retrieval::graph::KnowledgeGraph;
use hybrid_rag::retrieval::vector_index::VectorIndex;
use hybrid_rag::store::{Chunk, RawChunk};
use hybrid_rag::SearchMode;

const WORDS: &[&str] = &[
    "Alice", "Bob", "Carol", "Dave", "Paris", "Berlin", "Acme", "Globex", "river", "market",
    "works", "visited", "with", "the", "report", "quietly", "near", "built",
];

type ChunkSpec = (Vec<usize>, usize);

fn chunks_strategy() -> impl Strategy<Value = Vec<ChunkSpec>> {
    prop::collection::vec((prop::collection::vec(0..WORDS.len(), 1..8), 0..3usize), 1..12)
}

fn query_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(0..WORDS.len(), 1..4).prop_map(|ws| text(&ws))
}

fn text(words: &[usize]) -> String {
    words.iter().map(|&w| WORDS[w]).collect::<Vec<_>>().join(" ")
}

fn raw_chunks(specs: &[ChunkSpec]) -> Vec<RawChunk> {
    specs
        .iter()
        .enumerate()
        .map(|(i, (words, src))| RawChunk::new(text(words), format!("src{src}"), i))
        .collect()
}

fn embedder() -> EmbeddingProvider {
    EmbeddingProvider::Hashing(HashingEmbedder::new(48).unwrap())
}

fn pipeline(specs: &[ChunkSpec]) -> RagPipeline {
    let mut p = RagPipeline::new(embedder(), EntityExtractor::default(), PipelineOptions::default());
    p.ingest(raw_chunks(specs));
    p.build_indexes().unwrap();
    p
}

fn ids(hits: &[hybrid_rag::QueryHit]) -> Vec<u64> {
    hits.iter().map(|h| h.chunk_id).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn vector_query_with_large_k_returns_every_chunk_once(specs in chunks_strategy(), q in query_strategy()) {
        let p = pipeline(&specs);
        let n = specs.len();
        let mut got = ids(&p.query(&q, SearchMode::Vector, n + 3).unwrap());
        prop_assert_eq!(got.len(), n);
        got.sort_unstable();
        prop_assert_eq!(got, (0..n as u64).collect::<Vec<_>>());
    }

    #[test]
    fn vector_distances_never_decrease(
        rows in prop::collection::vec(prop::collection::vec(-5i8..5, 3), 1..20),
        query in prop::collection::vec(-5i8..5, 3),
        k in 1usize..25,
    ) {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i as u64, v.into_iter().map(f32::from).collect()))
            .collect();
        let index = VectorIndex::from_rows(rows).unwrap();
        let q: Vec<f32> = query.into_iter().map(f32::from).collect();
        let hits = index.search_embedding(&q, k).unwrap();
        prop_assert_eq!(hits.len(), k.min(index.len()));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
            if pair[0].distance == pair[1].distance {
                prop_assert!(pair[0].chunk_id < pair[1].chunk_id);
            }
        }
    }

    #[test]
    fn graph_ranking_respects_match_count_then_centrality(specs in chunks_strategy(), q in query_strategy()) {
        let chunks: Vec<Chunk> = raw_chunks(&specs)
            .into_iter()
            .enumerate()
            .map(|(i, r)| Chunk { id: i as u64, text: r.text, source: r.source, chunk_index: r.chunk_index, embedding: None })
            .collect();
        let refs: Vec<&Chunk> = chunks.iter().collect();
        let ex = EntityExtractor::default();
        let kg = KnowledgeGraph::build(&refs, &ex, 200).unwrap();
        let hits = kg.search(&q, chunks.len(), &ex);

        let query_entities = ex.extract(&q);
        for hit in &hits {
            prop_assert!(hit.matched_entities >= 1);
            let chunk_entities = ex.extract(&chunks[hit.chunk_id as usize].text);
            prop_assert_eq!(hit.matched_entities, query_entities.intersection(&chunk_entities).count());
        }
        for (i, hit) in hits.iter().enumerate() {
            prop_assert_eq!(hit.rank, i);
        }
        for pair in hits.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.matched_entities >= b.matched_entities);
            if a.matched_entities == b.matched_entities {
                prop_assert!(a.centrality >= b.centrality);
                if a.centrality == b.centrality {
                    prop_assert!(a.chunk_id < b.chunk_id);
                }
            }
        }
        // Every chunk sharing an entity with the query is reachable.
        let expected = chunks
            .iter()
            .filter(|c| !ex.extract(&c.text).is_disjoint(&query_entities))
            .count();
        prop_assert_eq!(hits.len(), expected);
    }

    #[test]
    fn hybrid_with_vector_only_weight_matches_vector_mode(
        specs in chunks_strategy(),
        q in query_strategy(),
        k in 1usize..8,
    ) {
        let p = pipeline(&specs);
        let vector = p.query(&q, SearchMode::Vector, k).unwrap();
        let hybrid = p.hybrid_search(&q, k, 1.0, 0.0).unwrap();
        prop_assert_eq!(ids(&hybrid), ids(&vector));
    }

    #[test]
    fn hybrid_is_deterministic(specs in chunks_strategy(), q in query_strategy(), k in 1usize..8) {
        let p = pipeline(&specs);
        let first = p.query(&q, SearchMode::Hybrid, k).unwrap();
        let second = p.query(&q, SearchMode::Hybrid, k).unwrap();
        prop_assert_eq!(&first, &second);
        for pair in first.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn save_then_load_gives_identical_results(specs in chunks_strategy(), q in query_strategy()) {
        let p = pipeline(&specs);
        let tmp = TempDir::new().unwrap();
        p.save(tmp.path()).unwrap();
        let restored = RagPipeline::load(
            tmp.path(),
            embedder(),
            EntityExtractor::default(),
            PipelineOptions::default(),
        )
        .unwrap();
        for mode in SearchMode::ALL {
            prop_assert_eq!(
                restored.query(&q, mode, 5).unwrap(),
                p.query(&q, mode, 5).unwrap()
            );
        }
    }
}
