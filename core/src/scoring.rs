use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

pub const BM25_K1: f64 = 1.5;
pub const BM25_B: f64 = 0.75;

/// Score used when a signal has no spread to normalize against.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Rescale `score` into [0, 100] against the observed range.
pub fn normalize_score(score: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return NEUTRAL_SCORE;
    }
    ((score - min) / (max - min) * 100.0).clamp(0.0, 100.0)
}

/// Smoothed BM25 inverse document frequency.
pub fn bm25_idf(total_docs: usize, doc_freq: u32) -> f64 {
    let n = total_docs as f64;
    let df = doc_freq as f64;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturating, length-normalized term-frequency component of BM25.
pub fn bm25_tf_weight(tf: u32, doc_len: u32, avg_doc_len: f64) -> f64 {
    let tf = tf as f64;
    let len_ratio = if avg_doc_len > 0.0 { doc_len as f64 / avg_doc_len } else { 1.0 };
    tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len_ratio))
}

/// Lower prices score higher.
pub fn price_competitiveness(price: f64, min_price: f64, max_price: f64) -> f64 {
    if max_price == min_price {
        return NEUTRAL_SCORE;
    }
    (100.0 - (price - min_price) / (max_price - min_price) * 100.0).clamp(0.0, 100.0)
}

/// Log-scaled so one heavily reviewed product does not flatten the rest.
pub fn popularity(rating_count: u64, max_rating_count: u64) -> f64 {
    if max_rating_count == 0 {
        return 0.0;
    }
    let score = ((rating_count as f64) + 1.0).ln() / ((max_rating_count as f64) + 1.0).ln() * 100.0;
    score.clamp(0.0, 100.0)
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 { 0.0 } else { intersection as f64 / union as f64 }
}

/// Tiered exact-match detection for one query, compiled once and applied to
/// every candidate.
pub struct ExactMatcher {
    query: String,
    word_boundary: Option<Regex>,
}

impl ExactMatcher {
    pub fn new(query: &str) -> Self {
        let query = query.trim().to_lowercase();
        let word_boundary = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&query)))
            .build()
            .ok();
        Self { query, word_boundary }
    }

    /// 100 exact title, 80 whole-word in title, 60 title prefix, 40 title
    /// substring, 20 description substring, else 0. First tier that holds wins.
    pub fn score(&self, title: &str, description: &str) -> f64 {
        let title = title.to_lowercase();
        if title == self.query {
            100.0
        } else if self.word_boundary.as_ref().is_some_and(|re| re.is_match(&title)) {
            80.0
        } else if title.starts_with(&self.query) {
            60.0
        } else if title.contains(&self.query) {
            40.0
        } else if description.to_lowercase().contains(&self.query) {
            20.0
        } else {
            0.0
        }
    }
}

/// 100 when the brand is named anywhere in the query.
pub fn brand_match(query_lower: &str, brand: &str) -> f64 {
    let brand = brand.to_lowercase();
    if !brand.is_empty() && query_lower.contains(&brand) { 100.0 } else { 0.0 }
}
