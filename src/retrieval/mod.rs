//! The two indexes and the ranker that fuses them.
//!
//! - [`entities`] — pluggable `text -> entity set` extraction.
//! - [`vector_index`] — exact squared-L2 nearest neighbours.
//! - [`graph`] — document/entity graph with degree-centrality ranking.
//! - [`fusion`] — weighted score fusion and the closed [`fusion::SearchMode`].
//!
//! Both indexes are full-rebuild only: `build` is O(all chunks) and replaces
//! any previous state.

pub mod entities;
pub mod fusion;
pub mod graph;
pub mod vector_index;
