use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use shopsearch_core::{EngineConfig, SearchEngine, SearchFilters};

const COLORS: [&str; 6] = ["red", "blue", "green", "black", "white", "grey"];
const KINDS: [&str; 5] = ["running shoe", "hiking boot", "rain jacket", "wool sock", "trail pack"];
const BRANDS: [&str; 4] = ["Nike", "Adidas", "Salomon", "Patagonia"];

fn synthetic_catalog(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "title": format!("{} {} model {}", COLORS[i % COLORS.len()], KINDS[i % KINDS.len()], i),
                "brand": BRANDS[i % BRANDS.len()],
                "price": 10.0 + (i % 200) as f64,
                "rating_count": (i * 37) % 5000,
                "product_description": "lightweight breathable everyday gear",
            })
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    // Capacity 0 so every iteration ranks instead of hitting the cache.
    let engine = SearchEngine::new(EngineConfig { cache_capacity: 0 });
    engine.load_rows(synthetic_catalog(10_000)).unwrap();
    let filters = SearchFilters::new();
    c.bench_function("search_10k_two_terms", |b| b.iter(|| engine.search("running shoe", &filters, 20)));
    c.bench_function("similar_10k", |b| b.iter(|| engine.similar(42, 5)));
}

fn bench_load(c: &mut Criterion) {
    let rows = synthetic_catalog(10_000);
    let engine = SearchEngine::default();
    c.bench_function("load_10k", |b| b.iter(|| engine.load_rows(rows.clone()).unwrap()));
}

criterion_group!(benches, bench_search, bench_load);
criterion_main!(benches);
