use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::SearchEngine;
use crate::filter::SearchFilters;

pub const DEFAULT_MIN_RELEVANCE: f64 = 30.0;
pub const DEFAULT_RETRIEVE_LIMIT: usize = 5;

/// Outcome of asking the catalog for a product before any fallback
/// acquisition (such as a crawl) is attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Retrieval {
    /// Catalog results scoring at or above the threshold, best first.
    Catalog { products: Vec<Map<String, Value>> },
    /// Nothing in the catalog cleared the threshold. `best_score` is the top
    /// score seen, if the search matched anything at all.
    Fallback { best_score: Option<f64> },
}

impl Retrieval {
    pub fn needs_fallback(&self) -> bool {
        matches!(self, Retrieval::Fallback { .. })
    }
}

/// Search the catalog and keep only results whose `relevance_score` reaches
/// `min_relevance`.
pub fn retrieve(engine: &SearchEngine, query: &str, min_relevance: f64, limit: usize) -> Retrieval {
    let result = engine.search(query.trim(), &SearchFilters::default(), limit);
    let score = |p: &Map<String, Value>| p.get("relevance_score").and_then(Value::as_f64).unwrap_or(0.0);

    let best_score = result.results.iter().map(score).reduce(f64::max);
    let products: Vec<_> = result
        .results
        .into_iter()
        .filter(|p| score(p) >= min_relevance)
        .collect();

    if products.is_empty() {
        Retrieval::Fallback { best_score }
    } else {
        Retrieval::Catalog { products }
    }
}
