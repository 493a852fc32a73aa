use serde::{Deserialize, Serialize};

use crate::catalog::RowAccessor;
use crate::RowId;

/// Ordering applied after filtering. Unrecognized names fall back to relevance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    PriceLow,
    PriceHigh,
    Reviews,
    #[default]
    #[serde(other)]
    Relevance,
}

impl SortBy {
    pub fn parse(s: &str) -> Self {
        match s {
            "price_low" => SortBy::PriceLow,
            "price_high" => SortBy::PriceHigh,
            "reviews" => SortBy::Reviews,
            _ => SortBy::Relevance,
        }
    }
}

/// Optional, independently combinable constraints on a search. Unset fields
/// are not applied. Field order is fixed, which keeps the serialized form
/// usable as a cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub availability: Option<bool>,
    #[serde(default)]
    pub sort_by: SortBy,
}

impl SearchFilters {
    pub fn new() -> Self { Self::default() }

    pub fn min_price(mut self, v: f64) -> Self { self.min_price = Some(v); self }
    pub fn max_price(mut self, v: f64) -> Self { self.max_price = Some(v); self }
    pub fn brand(mut self, v: impl Into<String>) -> Self { self.brand = Some(v.into()); self }
    pub fn availability(mut self, v: bool) -> Self { self.availability = Some(v); self }
    pub fn sort_by(mut self, v: SortBy) -> Self { self.sort_by = v; self }

    /// Whether row `id` passes every set constraint. Unknown rows never pass.
    pub fn matches<R: RowAccessor + ?Sized>(&self, rows: &R, id: RowId) -> bool {
        let Some(price) = rows.price_of(id) else { return false };
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if let Some(brand) = self.brand.as_deref().filter(|b| !b.is_empty()) {
            if rows.brand_of(id) != Some(brand) {
                return false;
            }
        }
        if let Some(available) = self.availability {
            if rows.availability_of(id) != Some(available) {
                return false;
            }
        }
        true
    }

    /// Keep passing rows, preserving their relative order.
    pub fn apply<R: RowAccessor + ?Sized>(&self, rows: &R, results: Vec<(RowId, f64)>) -> Vec<(RowId, f64)> {
        results.into_iter().filter(|(id, _)| self.matches(rows, *id)).collect()
    }
}

/// Reorder ranked results. Sorts are stable, so rows that compare equal keep
/// their relevance order.
pub fn sort_results<R: RowAccessor + ?Sized>(rows: &R, results: &mut [(RowId, f64)], sort_by: SortBy) {
    let price = |id: RowId| rows.price_of(id).unwrap_or(0.0);
    match sort_by {
        SortBy::Relevance => {}
        SortBy::PriceLow => results.sort_by(|a, b| price(a.0).total_cmp(&price(b.0))),
        SortBy::PriceHigh => results.sort_by(|a, b| price(b.0).total_cmp(&price(a.0))),
        SortBy::Reviews => results.sort_by_key(|r| std::cmp::Reverse(rows.rating_count_of(r.0).unwrap_or(0))),
    }
}
