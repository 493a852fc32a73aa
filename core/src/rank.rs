use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::catalog::Catalog;
use crate::index::CatalogIndex;
use crate::scoring::{
    bm25_idf, bm25_tf_weight, brand_match, normalize_score, popularity, price_competitiveness,
    ExactMatcher, NEUTRAL_SCORE,
};
use crate::tokenizer::tokenize;
use crate::RowId;

pub const WEIGHT_RELEVANCE: f64 = 0.40;
pub const WEIGHT_EXACT: f64 = 0.20;
pub const WEIGHT_BRAND: f64 = 0.15;
pub const WEIGHT_POPULARITY: f64 = 0.15;
pub const WEIGHT_PRICE: f64 = 0.10;

/// The five 0–100 sub-scores behind a final score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalScores {
    pub relevance: f64,
    pub exact: f64,
    pub brand: f64,
    pub popularity: f64,
    pub price: f64,
}

impl SignalScores {
    pub fn blended(&self) -> f64 {
        WEIGHT_RELEVANCE * self.relevance
            + WEIGHT_EXACT * self.exact
            + WEIGHT_BRAND * self.brand
            + WEIGHT_POPULARITY * self.popularity
            + WEIGHT_PRICE * self.price
    }
}

/// Scores a query against one catalog snapshot.
pub struct Ranker<'a> {
    catalog: &'a Catalog,
    index: &'a CatalogIndex,
}

impl<'a> Ranker<'a> {
    pub fn new(catalog: &'a Catalog, index: &'a CatalogIndex) -> Self {
        Self { catalog, index }
    }

    /// Raw BM25 score for every row sharing at least one term with the query.
    pub fn bm25_candidates(&self, query_terms: &[String]) -> HashMap<RowId, f64> {
        let mut candidates: HashSet<RowId> = HashSet::new();
        for term in query_terms {
            candidates.extend(self.index.postings(term));
        }

        let total_docs = self.index.num_docs();
        let mut scores = HashMap::with_capacity(candidates.len());
        for doc_id in candidates {
            let tf_map = &self.index.term_freqs[doc_id as usize];
            let doc_len = self.index.doc_lengths[doc_id as usize];
            let mut score = 0.0;
            for term in query_terms {
                let Some(&tf) = tf_map.get(term) else { continue };
                let df = self.index.term_doc_freq.get(term).copied().unwrap_or(0);
                score += bm25_idf(total_docs, df) * bm25_tf_weight(tf, doc_len, self.index.avg_doc_length);
            }
            scores.insert(doc_id, score);
        }
        scores
    }

    /// Sub-scores for one candidate given its raw BM25 score and the range of
    /// raw scores across this query's candidates.
    pub fn signals(
        &self,
        doc_id: RowId,
        matcher: &ExactMatcher,
        query_lower: &str,
        bm25: f64,
        bm25_range: (f64, f64),
    ) -> Option<SignalScores> {
        let product = self.catalog.get(doc_id)?;
        let price = match (self.index.min_price(), self.index.max_price()) {
            (Some(min), Some(max)) => price_competitiveness(product.price, min, max),
            _ => NEUTRAL_SCORE,
        };
        Some(SignalScores {
            relevance: normalize_score(bm25, bm25_range.0, bm25_range.1),
            exact: matcher.score(&product.title, &product.product_description),
            brand: brand_match(query_lower, &product.brand),
            popularity: popularity(product.rating_count, self.index.max_rating_count),
            price,
        })
    }

    /// Ranked `(row id, final score)` pairs, best first. Equal scores are
    /// ordered by ascending row id.
    pub fn rank(&self, query: &str) -> Vec<(RowId, f64)> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let bm25 = self.bm25_candidates(&terms);
        if bm25.is_empty() {
            return Vec::new();
        }

        let (min, max) = bm25
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        let matcher = ExactMatcher::new(query);
        let query_lower = query.to_lowercase();

        let mut ranked: Vec<(RowId, f64)> = bm25
            .into_iter()
            .filter_map(|(doc_id, raw)| {
                self.signals(doc_id, &matcher, &query_lower, raw, (min, max))
                    .map(|s| (doc_id, s.blended()))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shoes() -> (Catalog, CatalogIndex) {
        let catalog = Catalog::from_rows(vec![
            json!({"title": "Red Running Shoe", "brand": "Nike", "price": 60, "rating_count": 100}),
            json!({"title": "Blue Running Shoe", "brand": "Adidas", "price": 80, "rating_count": 10}),
            json!({"title": "Wool Hat", "brand": "Acme", "price": 20}),
        ])
        .unwrap();
        let index = CatalogIndex::build(&catalog);
        (catalog, index)
    }

    #[test]
    fn weights_sum_to_one() {
        let sum = WEIGHT_RELEVANCE + WEIGHT_EXACT + WEIGHT_BRAND + WEIGHT_POPULARITY + WEIGHT_PRICE;
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn candidates_are_union_of_postings() {
        let (catalog, index) = shoes();
        let ranker = Ranker::new(&catalog, &index);
        let c = ranker.bm25_candidates(&["red".to_string(), "hat".to_string()]);
        let mut ids: Vec<_> = c.keys().copied().collect();
        ids.sort();
        assert_eq!(ids, vec![0, 2]);
        assert!(ranker.bm25_candidates(&["boot".to_string()]).is_empty());
        assert!(ranker.bm25_candidates(&[]).is_empty());
    }

    #[test]
    fn bm25_matches_hand_computation() {
        let (catalog, index) = shoes();
        let ranker = Ranker::new(&catalog, &index);
        let scores = ranker.bm25_candidates(&["red".to_string()]);
        // N=3, df=1, doc_len=4, avg=(4+4+3)/3
        let idf = ((3.0 - 1.0 + 0.5) / (1.0 + 0.5) + 1.0f64).ln();
        let avg = 11.0 / 3.0;
        let tfw = 2.5 / (1.0 + 1.5 * (1.0 - 0.75 + 0.75 * 4.0 / avg));
        assert!((scores[&0] - idf * tfw).abs() < 1e-9);
    }

    #[test]
    fn blend_matches_fixture() {
        let (catalog, index) = shoes();
        let ranker = Ranker::new(&catalog, &index);
        let ranked = ranker.rank("nike shoe");
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1]);

        // id 0: bm25 max -> 100, word-boundary miss, starts/contains miss -> 0,
        // brand 100, popularity 100, price (60-20)/(80-20) -> 33.33
        let price0 = 100.0 - 40.0 / 60.0 * 100.0;
        let expected0 = 0.40 * 100.0 + 0.15 * 100.0 + 0.15 * 100.0 + 0.10 * price0;
        assert!((ranked[0].1 - expected0).abs() < 1e-6);

        // id 1: bm25 min -> 0, no brand, popularity ln(11)/ln(101), price 0
        let expected1 = 0.15 * (11f64.ln() / 101f64.ln() * 100.0);
        assert!((ranked[1].1 - expected1).abs() < 1e-6);
    }

    #[test]
    fn single_candidate_gets_neutral_relevance() {
        let (catalog, index) = shoes();
        let ranker = Ranker::new(&catalog, &index);
        let ranked = ranker.rank("wool hat");
        assert_eq!(ranked.len(), 1);
        // relevance 50, exact 100, popularity 0, price 100
        assert!((ranked[0].1 - (0.40 * 50.0 + 0.20 * 100.0 + 0.10 * 100.0)).abs() < 1e-6);
    }

    #[test]
    fn equal_scores_rank_by_row_id() {
        let row = json!({"title": "Plain Mug", "brand": "Acme", "price": 10, "rating_count": 5});
        let catalog = Catalog::from_rows(vec![row.clone(), row.clone(), row]).unwrap();
        let index = CatalogIndex::build(&catalog);
        let ranked = Ranker::new(&catalog, &index).rank("mug");
        assert_eq!(ranked.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(ranked.windows(2).all(|w| w[0].1 == w[1].1));
    }
}
