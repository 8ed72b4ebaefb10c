//! Entity extraction.
//!
//! The graph builder only sees [`EntityExtractor`], a shared
//! `Fn(&str) -> BTreeSet<String>`. The default is a capitalisation heuristic:
//! every maximal alphanumeric run that starts with an uppercase letter and is
//! at least `min_len` characters long, minus a small stop-word list. False
//! positives ("Monday") and misses ("iPhone") are expected.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Default minimum entity length in characters.
pub const DEFAULT_MIN_LEN: usize = 3;

/// Capitalised words that are almost never entities. Compared lowercase.
const STOP_WORDS: &[&str] = &[
    "about", "after", "all", "also", "and", "any", "are", "because", "been", "before", "both",
    "but", "can", "could", "did", "does", "each", "every", "for", "from", "had", "has", "have",
    "her", "here", "his", "how", "however", "into", "its", "may", "might", "more", "most", "must",
    "nor", "not", "now", "our", "she", "should", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "under", "was", "were",
    "what", "when", "where", "which", "while", "who", "whom", "whose", "why", "will", "with",
    "would", "yes", "yet", "you", "your",
];

type ExtractFn = dyn Fn(&str) -> BTreeSet<String> + Send + Sync;

/// Shared, cloneable `text -> entity set` function.
///
/// Whatever the inner function returns is trimmed, lowercased and stripped of
/// empty strings, so graph entity nodes stay deduplicated by normalised name.
#[derive(Clone)]
pub struct EntityExtractor(Arc<ExtractFn>);

impl EntityExtractor {
    /// Capitalised-run heuristic with the given minimum length.
    pub fn heuristic(min_len: usize) -> Self {
        Self::from_fn(move |text| extract_capitalized(text, min_len))
    }

    /// Wrap an arbitrary extractor (an NER model, a gazetteer lookup…).
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> BTreeSet<String> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        (self.0)(text)
            .iter()
            .map(|e| normalize(e))
            .filter(|e| !e.is_empty())
            .collect()
    }
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::heuristic(DEFAULT_MIN_LEN)
    }
}

impl fmt::Debug for EntityExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntityExtractor(..)")
    }
}

/// Canonical form used as the entity node key.
pub fn normalize(entity: &str) -> String {
    entity.trim().to_lowercase()
}

/// The default heuristic. Returns normalised entity strings.
pub fn extract_capitalized(text: &str, min_len: usize) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|run| run.chars().next().is_some_and(char::is_uppercase))
        .filter(|run| run.chars().count() >= min_len)
        .map(normalize)
        .filter(|e| !STOP_WORDS.contains(&e.as_str()))
        .collect()
}
