//! In-memory product search: BM25 relevance blended with exact-match, brand,
//! popularity and price signals, plus filtering, an LRU result cache and
//! item-to-item similarity.

pub mod catalog;
pub mod engine;
pub mod filter;
pub mod index;
pub mod rank;
pub mod retrieve;
pub mod scoring;
pub mod similar;
pub mod source;
pub mod tokenizer;

/// Load-order position of a product in the current catalog.
pub type RowId = u32;

pub use catalog::{Catalog, CatalogError, Product, RowAccessor};
pub use engine::{EngineConfig, EngineStats, SearchEngine, SearchResult};
pub use filter::{SearchFilters, SortBy};
pub use retrieve::{retrieve, Retrieval};
