use std::cmp::Ordering;

use crate::catalog::Catalog;
use crate::scoring::jaccard;
use crate::tokenizer::token_set;
use crate::RowId;

const BRAND_BONUS: f64 = 40.0;
const PRICE_BONUS: f64 = 30.0;
const TEXT_BONUS: f64 = 30.0;

/// Products most like `row_id`, scored on shared brand, price closeness and
/// title/description term overlap. Full scan; the source row is excluded and
/// unknown ids yield nothing.
pub fn find_similar(catalog: &Catalog, row_id: RowId, limit: usize) -> Vec<(RowId, f64)> {
    let Some(base) = catalog.get(row_id) else {
        return Vec::new();
    };
    let base_tokens = token_set(&base.descriptive_text());

    let mut scored: Vec<(RowId, f64)> = catalog
        .iter()
        .filter(|other| other.id != row_id)
        .map(|other| {
            let mut score = 0.0;
            if other.brand == base.brand {
                score += BRAND_BONUS;
            }
            let distance = if base.price > 0.0 {
                (other.price - base.price).abs() / base.price
            } else {
                1.0
            };
            score += (PRICE_BONUS * (1.0 - distance)).max(0.0);
            score += TEXT_BONUS * jaccard(&base_tokens, &token_set(&other.descriptive_text()));
            (other.id, score)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(limit);
    scored
}
