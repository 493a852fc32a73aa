use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogError, Product};
use crate::filter::{sort_results, SearchFilters};
use crate::index::CatalogIndex;
use crate::rank::Ranker;
use crate::scoring::NEUTRAL_SCORE;
use crate::similar::find_similar;
use crate::RowId;

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}
fn default_cache_capacity() -> usize { DEFAULT_CACHE_CAPACITY }

impl Default for EngineConfig {
    fn default() -> Self { Self { cache_capacity: DEFAULT_CACHE_CAPACITY } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Product objects with `relevance_score` and `id` attached.
    pub results: Vec<Map<String, Value>>,
    pub search_time_ms: f64,
    pub total_results: usize,
    pub from_cache: bool,
    /// Percentage of searches since the last clear that were served from cache.
    pub cache_hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
    pub total_products: usize,
    pub index_size: usize,
    pub unique_terms: usize,
    pub unique_brands: usize,
    pub cache_hit_rate: f64,
    pub avg_search_time_ms: f64,
    pub index_build_time_ms: f64,
    pub cache_size: usize,
    pub total_searches: u64,
    pub avg_doc_length: f64,
}

/// A catalog and everything derived from it. Never mutated once built.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub index: CatalogIndex,
    pub generation: u64,
    pub build_time: Duration,
}

#[derive(Serialize)]
struct CacheKey<'a> {
    query: &'a str,
    filters: &'a SearchFilters,
    limit: usize,
}

struct CacheState {
    /// `None` when the configured capacity is zero; nothing is cached then.
    entries: Option<LruCache<String, SearchResult>>,
    /// Snapshot generation the cached entries were computed against.
    generation: u64,
    hits: u64,
    total_searches: u64,
    computed_searches: u64,
    avg_search_time_ms: f64,
}

impl CacheState {
    fn lookup(&mut self, key: &str) -> Option<SearchResult> {
        self.entries.as_mut()?.get(key).cloned()
    }

    fn insert(&mut self, key: String, result: SearchResult) {
        if let Some(entries) = self.entries.as_mut() {
            entries.put(key, result);
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.as_ref().is_some_and(|e| e.contains(key))
    }

    fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.len())
    }

    fn clear(&mut self) {
        if let Some(entries) = self.entries.as_mut() {
            entries.clear();
        }
    }

    fn hit_rate(&self) -> f64 {
        if self.total_searches == 0 {
            return 0.0;
        }
        self.hits as f64 / self.total_searches as f64 * 100.0
    }
}

/// In-memory product search engine.
///
/// Searches run against an immutable snapshot taken at the start of the
/// call, so a concurrent [`SearchEngine::load_rows`] never exposes a
/// half-built index. The cache has its own lock, held only for lookups,
/// inserts and counter updates.
pub struct SearchEngine {
    snapshot: RwLock<Arc<Snapshot>>,
    cache: Mutex<CacheState>,
}

impl Default for SearchEngine {
    fn default() -> Self { Self::new(EngineConfig::default()) }
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            cache: Mutex::new(CacheState {
                entries: NonZeroUsize::new(config.cache_capacity).map(LruCache::new),
                generation: 0,
                hits: 0,
                total_searches: 0,
                computed_searches: 0,
                avg_search_time_ms: 0.0,
            }),
        }
    }

    /// Replace the catalog with `rows` and rebuild every index.
    ///
    /// All-or-nothing: on error the previously loaded catalog stays in place.
    pub fn load_rows(&self, rows: Vec<Value>) -> Result<(), CatalogError> {
        let start = Instant::now();
        let catalog = match Catalog::from_rows(rows) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "catalog load rejected");
                return Err(e);
            }
        };
        let index = CatalogIndex::build(&catalog);
        let build_time = start.elapsed();
        info!(
            rows = catalog.len(),
            terms = index.term_doc_freq.len(),
            brands = index.brands.len(),
            build_ms = build_time.as_secs_f64() * 1000.0,
            "catalog loaded"
        );

        let mut snapshot = self.snapshot.write();
        let generation = snapshot.generation + 1;
        *snapshot = Arc::new(Snapshot { catalog, index, generation, build_time });
        // Cleared while the write lock is held so no search can pair the new
        // catalog with results cached from the old one.
        let mut cache = self.cache.lock();
        cache.clear();
        cache.generation = generation;
        Ok(())
    }

    /// The snapshot searches currently run against.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn search(&self, query: &str, filters: &SearchFilters, limit: usize) -> SearchResult {
        let start = Instant::now();
        let key = cache_key(query, filters, limit);

        {
            let mut cache = self.cache.lock();
            cache.total_searches += 1;
            let cached = cache.lookup(&key);
            if let Some(hit) = cached {
                cache.hits += 1;
                let hit_rate = cache.hit_rate();
                drop(cache);
                debug!(query, "search served from cache");
                return SearchResult { from_cache: true, cache_hit_rate: hit_rate, ..hit };
            }
        }

        let snapshot = self.snapshot();
        let ranked = if query.is_empty() {
            snapshot.catalog.iter().map(|p| (p.id, NEUTRAL_SCORE)).collect()
        } else {
            Ranker::new(&snapshot.catalog, &snapshot.index).rank(query)
        };
        let candidates = ranked.len();

        let mut ranked = filters.apply(&snapshot.catalog, ranked);
        sort_results(&snapshot.catalog, &mut ranked, filters.sort_by);
        ranked.truncate(limit);

        let results: Vec<Map<String, Value>> = ranked
            .iter()
            .filter_map(|&(id, score)| {
                let mut obj = snapshot.catalog.get(id)?.to_json();
                obj.insert("relevance_score".into(), Value::from(round2(score)));
                Some(obj)
            })
            .collect();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut cache = self.cache.lock();
        cache.computed_searches += 1;
        cache.avg_search_time_ms += (elapsed_ms - cache.avg_search_time_ms) / cache.computed_searches as f64;
        let result = SearchResult {
            total_results: results.len(),
            results,
            search_time_ms: elapsed_ms,
            from_cache: false,
            cache_hit_rate: cache.hit_rate(),
        };
        if cache.generation == snapshot.generation {
            cache.insert(key, result.clone());
        }
        drop(cache);

        debug!(query, candidates, results = result.total_results, elapsed_ms, "search computed");
        result
    }

    /// Products most similar to `row_id`; empty when the id is unknown.
    pub fn similar(&self, row_id: RowId, limit: usize) -> Vec<(RowId, f64)> {
        find_similar(&self.snapshot().catalog, row_id, limit)
    }

    pub fn product(&self, row_id: RowId) -> Option<Product> {
        self.snapshot().catalog.get(row_id).cloned()
    }

    /// Distinct non-empty brands in first-seen order.
    pub fn brands(&self) -> Vec<String> {
        self.snapshot().index.brands.clone()
    }

    /// `(min, max)` catalog price, `(0.0, 0.0)` when empty.
    pub fn price_range(&self) -> (f64, f64) {
        let snapshot = self.snapshot();
        match (snapshot.index.min_price(), snapshot.index.max_price()) {
            (Some(min), Some(max)) => (min, max),
            _ => (0.0, 0.0),
        }
    }

    pub fn stats(&self) -> EngineStats {
        let snapshot = self.snapshot();
        let cache = self.cache.lock();
        EngineStats {
            total_products: snapshot.catalog.len(),
            index_size: snapshot.index.inverted.len(),
            unique_terms: snapshot.index.term_doc_freq.len(),
            unique_brands: snapshot.index.brands.len(),
            cache_hit_rate: cache.hit_rate(),
            avg_search_time_ms: cache.avg_search_time_ms,
            index_build_time_ms: snapshot.build_time.as_secs_f64() * 1000.0,
            cache_size: cache.len(),
            total_searches: cache.total_searches,
            avg_doc_length: snapshot.index.avg_doc_length,
        }
    }

    /// Drop every cached result and reset the search counters. The catalog
    /// and its indexes are untouched.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.lock();
        cache.clear();
        cache.hits = 0;
        cache.total_searches = 0;
        cache.computed_searches = 0;
        cache.avg_search_time_ms = 0.0;
        info!("search cache cleared");
    }

    /// Whether an identical search would currently be answered from cache.
    pub fn is_cached(&self, query: &str, filters: &SearchFilters, limit: usize) -> bool {
        self.cache.lock().contains(&cache_key(query, filters, limit))
    }
}

/// Canonical key: struct fields serialize in declaration order, so equal
/// requests always produce the same string.
fn cache_key(query: &str, filters: &SearchFilters, limit: usize) -> String {
    serde_json::to_string(&CacheKey { query, filters, limit })
        .expect("cache key of strings, numbers and bools serializes")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cache_key_ignores_construction_order() {
        let a = SearchFilters::new().brand("Nike").min_price(10.0);
        let b = SearchFilters::new().min_price(10.0).brand("Nike");
        assert_eq!(cache_key("shoe", &a, 5), cache_key("shoe", &b, 5));
        assert_ne!(cache_key("shoe", &a, 5), cache_key("shoe", &a, 6));
    }

    #[test]
    fn browse_all_on_empty_query() {
        let engine = SearchEngine::default();
        engine
            .load_rows(vec![
                json!({"title": "A", "brand": "x", "price": 1}),
                json!({"title": "B", "brand": "y", "price": 2}),
            ])
            .unwrap();
        let r = engine.search("", &SearchFilters::new(), 10);
        assert_eq!(r.total_results, 2);
        assert_eq!(r.results[0]["id"], json!(0));
        assert_eq!(r.results[0]["relevance_score"], json!(50.0));
    }

    #[test]
    fn whitespace_query_is_ranked_not_browsed() {
        let engine = SearchEngine::default();
        engine
            .load_rows(vec![
                json!({"title": "A", "brand": "x", "price": 1}),
                json!({"title": "B", "brand": "y", "price": 2}),
            ])
            .unwrap();
        assert_eq!(engine.search("   ", &SearchFilters::new(), 10).total_results, 0);
        assert_eq!(engine.search("a", &SearchFilters::new(), 10).total_results, 0);
    }

    #[test]
    fn cache_hit_protects_entry_from_eviction() {
        let engine = SearchEngine::new(EngineConfig { cache_capacity: 2 });
        engine.load_rows(vec![json!({"title": "Red Shoe", "brand": "x", "price": 1})]).unwrap();
        let f = SearchFilters::new();
        engine.search("red", &f, 5);
        engine.search("shoe", &f, 5);
        assert!(engine.search("red", &f, 5).from_cache);
        assert_eq!(engine.stats().cache_size, 2);
        engine.search("red shoe", &f, 5);
        assert!(engine.is_cached("red", &f, 5));
        assert!(!engine.is_cached("shoe", &f, 5));
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let engine = SearchEngine::new(EngineConfig { cache_capacity: 0 });
        engine.load_rows(vec![json!({"title": "Red Shoe", "brand": "x", "price": 1})]).unwrap();
        let f = SearchFilters::new();
        engine.search("red", &f, 5);
        let again = engine.search("red", &f, 5);
        assert!(!again.from_cache);
        assert_eq!(again.total_results, 1);
        assert!(!engine.is_cached("red", &f, 5));
        assert_eq!(engine.stats().cache_size, 0);
    }

    #[test]
    fn search_on_empty_engine() {
        let engine = SearchEngine::default();
        let r = engine.search("anything", &SearchFilters::new(), 10);
        assert!(r.results.is_empty());
        assert_eq!(engine.price_range(), (0.0, 0.0));
        assert!(engine.similar(0, 5).is_empty());
    }

    #[test]
    fn round2_rounds() {
        assert_eq!(round2(12.3456), 12.35);
    }
}
