use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shopsearch_core::retrieve::{retrieve, Retrieval, DEFAULT_MIN_RELEVANCE, DEFAULT_RETRIEVE_LIMIT};
use shopsearch_core::source::read_catalog;
use shopsearch_core::{EngineConfig, EngineStats, SearchEngine, SearchFilters, SearchResult, SortBy};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_LIMIT: usize = 100;

pub struct AppConfig {
    /// Catalog file or directory; `None` starts with an empty catalog.
    pub catalog: Option<PathBuf>,
    pub cache_size: usize,
    pub admin_token: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    pub catalog: Option<PathBuf>,
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub brand: Option<String>,
    pub availability: Option<bool>,
    pub sort_by: Option<String>,
}
fn default_limit() -> usize { 50 }

impl SearchParams {
    fn filters(&self) -> SearchFilters {
        SearchFilters {
            min_price: self.min_price,
            max_price: self.max_price,
            brand: self.brand.clone(),
            availability: self.availability,
            sort_by: self.sort_by.as_deref().map(SortBy::parse).unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_similar_limit")]
    pub limit: usize,
}
fn default_similar_limit() -> usize { 5 }

#[derive(Deserialize)]
pub struct RetrieveParams {
    pub q: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_retrieve_limit")]
    pub limit: usize,
}
fn default_threshold() -> f64 { DEFAULT_MIN_RELEVANCE }
fn default_retrieve_limit() -> usize { DEFAULT_RETRIEVE_LIMIT }

#[derive(Serialize)]
pub struct SimilarHit {
    pub id: u32,
    pub score: f64,
    pub product: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

pub fn build_app(config: AppConfig) -> Result<Router> {
    let engine = SearchEngine::new(EngineConfig { cache_capacity: config.cache_size });
    if let Some(path) = &config.catalog {
        engine.load_rows(read_catalog(path)?)?;
    }
    let app_state = AppState { engine: Arc::new(engine), catalog: config.catalog, admin_token: config.admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/product/:id", get(product_handler))
        .route("/product/:id/similar", get(similar_handler))
        .route("/retrieve", get(retrieve_handler))
        .route("/brands", get(brands_handler))
        .route("/price-range", get(price_range_handler))
        .route("/stats", get(stats_handler))
        .route("/cache/clear", post(clear_cache))
        .route("/catalog/reload", post(reload_catalog))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResult> {
    let limit = params.limit.clamp(1, MAX_LIMIT);
    Json(state.engine.search(&params.q, &params.filters(), limit))
}

pub async fn product_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<serde_json::Map<String, serde_json::Value>>, (StatusCode, String)> {
    state
        .engine
        .product(id)
        .map(|p| Json(p.to_json()))
        .ok_or((StatusCode::NOT_FOUND, format!("no product with id {id}")))
}

pub async fn similar_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Query(params): Query<LimitParams>,
) -> Json<Vec<SimilarHit>> {
    let limit = params.limit.clamp(1, MAX_LIMIT);
    let hits = state
        .engine
        .similar(id, limit)
        .into_iter()
        .filter_map(|(other, score)| {
            let product = state.engine.product(other)?.to_json();
            Some(SimilarHit { id: other, score, product })
        })
        .collect();
    Json(hits)
}

pub async fn retrieve_handler(State(state): State<AppState>, Query(params): Query<RetrieveParams>) -> Json<Retrieval> {
    let limit = params.limit.clamp(1, MAX_LIMIT);
    let outcome = retrieve(&state.engine, &params.q, params.threshold, limit);
    if outcome.needs_fallback() {
        tracing::info!(query = %params.q, "no catalog match above threshold");
    }
    Json(outcome)
}

async fn brands_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.brands())
}

async fn price_range_handler(State(state): State<AppState>) -> Json<PriceRange> {
    let (min, max) = state.engine.price_range();
    Json(PriceRange { min, max })
}

async fn stats_handler(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.stats())
}

// --- Admin endpoints ---
async fn clear_cache(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, (StatusCode, String)> {
    authorize(&state, &headers)?;
    state.engine.clear_cache();
    Ok(StatusCode::NO_CONTENT)
}

async fn reload_catalog(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<EngineStats>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let path = state
        .catalog
        .as_ref()
        .ok_or((StatusCode::BAD_REQUEST, "no catalog path configured".to_string()))?;
    let rows = read_catalog(path).map_err(|e| (StatusCode::BAD_REQUEST, format!("{e:#}")))?;
    state
        .engine
        .load_rows(rows)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(state.engine.stats()))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
