use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::tokenizer::tokenize;
use crate::RowId;

/// Indexes and BM25 corpus statistics derived from one catalog load.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    /// term -> row ids containing it, ascending
    pub inverted: HashMap<String, Vec<RowId>>,
    pub term_doc_freq: HashMap<String, u32>,
    /// Per-row term counts over the searchable text.
    pub term_freqs: Vec<HashMap<String, u32>>,
    pub doc_lengths: Vec<u32>,
    pub avg_doc_length: f64,
    pub brand_index: HashMap<String, Vec<RowId>>,
    /// Brands in the order they first appear in the catalog.
    pub brands: Vec<String>,
    /// (row id, price) ascending by price
    pub price_index: Vec<(RowId, f64)>,
    pub max_rating_count: u64,
}

impl CatalogIndex {
    pub fn new() -> Self { Self::default() }

    pub fn build(catalog: &Catalog) -> Self {
        let mut index = Self::new();
        let mut total_len: u64 = 0;

        for product in catalog.iter() {
            let tokens = tokenize(&product.searchable_text());
            total_len += tokens.len() as u64;
            index.doc_lengths.push(tokens.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            // Rows are visited in id order, so every posting list stays sorted.
            for term in tf.keys() {
                index.inverted.entry(term.clone()).or_default().push(product.id);
                *index.term_doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            index.term_freqs.push(tf);

            if !product.brand.is_empty() {
                let bucket = index.brand_index.entry(product.brand.clone()).or_default();
                if bucket.is_empty() {
                    index.brands.push(product.brand.clone());
                }
                bucket.push(product.id);
            }

            index.price_index.push((product.id, product.price));
            index.max_rating_count = index.max_rating_count.max(product.rating_count);
        }

        if !index.doc_lengths.is_empty() {
            index.avg_doc_length = total_len as f64 / index.doc_lengths.len() as f64;
        }
        index.price_index.sort_by(|a, b| a.1.total_cmp(&b.1));
        index
    }

    pub fn num_docs(&self) -> usize { self.doc_lengths.len() }

    pub fn min_price(&self) -> Option<f64> { self.price_index.first().map(|(_, p)| *p) }

    pub fn max_price(&self) -> Option<f64> { self.price_index.last().map(|(_, p)| *p) }

    pub fn postings(&self, term: &str) -> &[RowId] {
        self.inverted.get(term).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Catalog {
        Catalog::from_rows(vec![
            json!({"title": "Trail Shoe", "brand": "Nike", "price": 90, "rating_count": 5}),
            json!({"title": "Road Shoe shoe", "brand": "", "price": 40, "product_description": "light"}),
            json!({"title": "Sock", "brand": "Nike", "price": 5, "rating_count": 12}),
        ])
        .unwrap()
    }

    #[test]
    fn builds_postings_and_df() {
        let index = CatalogIndex::build(&catalog());
        assert_eq!(index.postings("shoe"), &[0, 1]);
        assert_eq!(index.term_doc_freq["shoe"], 2);
        assert_eq!(index.term_freqs[1]["shoe"], 2);
        assert_eq!(index.postings("nike"), &[0, 2]);
        assert!(index.postings("boot").is_empty());
    }

    #[test]
    fn lengths_and_average() {
        let index = CatalogIndex::build(&catalog());
        // "trail shoe nike", "road shoe shoe light", "sock nike"
        assert_eq!(index.doc_lengths, vec![3, 4, 2]);
        assert!((index.avg_doc_length - 3.0).abs() < 1e-9);
    }

    #[test]
    fn brand_and_price_indexes() {
        let index = CatalogIndex::build(&catalog());
        assert_eq!(index.brands, vec!["Nike".to_string()]);
        assert_eq!(index.brand_index["Nike"], vec![0, 2]);
        assert_eq!(index.price_index, vec![(2, 5.0), (1, 40.0), (0, 90.0)]);
        assert_eq!(index.max_rating_count, 12);
    }

    #[test]
    fn empty_catalog() {
        let index = CatalogIndex::build(&Catalog::new());
        assert_eq!(index.avg_doc_length, 0.0);
        assert_eq!(index.min_price(), None);
    }
}
