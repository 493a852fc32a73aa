use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::RowId;

pub const REQUIRED_COLUMNS: [&str; 3] = ["title", "price", "brand"];

lazy_static! {
    static ref SAVINGS: Regex =
        Regex::new(r"(?i)\s+with\s+\d+\s+percent\s+savings.*").expect("valid regex");
    static ref NUMBER: Regex = Regex::new(r"[\d,]+\.?\d*").expect("valid regex");
}

/// Reasons a catalog load is rejected. A rejected load never replaces the
/// catalog that was loaded before it.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("row {row}: missing required column: {column}")]
    MissingColumn { row: usize, column: &'static str },
    #[error("row {row}: invalid {column}: {value}")]
    InvalidValue { row: usize, column: &'static str, value: String },
    #[error("row {row}: expected a JSON object")]
    NotAnObject { row: usize },
    #[error("row {row}: catalog holds at most {max} products", max = u64::from(RowId::MAX) + 1)]
    TooManyRows { row: usize },
}

/// One catalog entry. Fields the ranker does not read are kept in `extra`
/// and handed back verbatim when the record is materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: RowId,
    pub title: String,
    pub brand: String,
    pub price: f64,
    pub product_description: String,
    pub rating_count: u64,
    pub availability: bool,
    pub extra: Map<String, Value>,
}

impl Product {
    /// Text the inverted index and BM25 see.
    pub fn searchable_text(&self) -> String {
        format!("{} {} {}", self.title, self.product_description, self.brand)
    }

    /// Text the similarity finder compares (brand is scored separately).
    pub fn descriptive_text(&self) -> String {
        format!("{} {}", self.title, self.product_description)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        let mut obj = self.extra.clone();
        obj.insert("title".into(), Value::String(self.title.clone()));
        obj.insert("brand".into(), Value::String(self.brand.clone()));
        obj.insert("price".into(), Value::from(self.price));
        obj.insert("product_description".into(), Value::String(self.product_description.clone()));
        obj.insert("rating_count".into(), Value::from(self.rating_count));
        obj.insert("availability".into(), Value::Bool(self.availability));
        obj.insert("id".into(), Value::from(self.id));
        obj
    }
}

/// Read access to the per-row attributes filters and sorts need, so they do
/// not depend on how the catalog is stored.
pub trait RowAccessor {
    fn price_of(&self, id: RowId) -> Option<f64>;
    fn brand_of(&self, id: RowId) -> Option<&str>;
    fn rating_count_of(&self, id: RowId) -> Option<u64>;
    fn availability_of(&self, id: RowId) -> Option<bool>;
}

/// Immutable, row-indexed product table. Row ids are load-order positions.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }

    /// Validate and convert raw rows. Fails on the first row that lacks a
    /// required column or carries an unusable price.
    pub fn from_rows(rows: Vec<Value>) -> Result<Self, CatalogError> {
        let mut products = Vec::with_capacity(rows.len());
        for (row, value) in rows.into_iter().enumerate() {
            let Value::Object(obj) = value else {
                return Err(CatalogError::NotAnObject { row });
            };
            products.push(product_from_object(row, obj)?);
        }
        Ok(Self { products })
    }

    pub fn len(&self) -> usize { self.products.len() }

    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    pub fn get(&self, id: RowId) -> Option<&Product> {
        self.products.get(id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }
}

impl RowAccessor for Catalog {
    fn price_of(&self, id: RowId) -> Option<f64> { self.get(id).map(|p| p.price) }
    fn brand_of(&self, id: RowId) -> Option<&str> { self.get(id).map(|p| p.brand.as_str()) }
    fn rating_count_of(&self, id: RowId) -> Option<u64> { self.get(id).map(|p| p.rating_count) }
    fn availability_of(&self, id: RowId) -> Option<bool> { self.get(id).map(|p| p.availability) }
}

fn product_from_object(row: usize, mut obj: Map<String, Value>) -> Result<Product, CatalogError> {
    for column in REQUIRED_COLUMNS {
        if !obj.contains_key(column) {
            return Err(CatalogError::MissingColumn { row, column });
        }
    }

    let title = match obj.remove("title") {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => return Err(CatalogError::MissingColumn { row, column: "title" }),
        Some(other) => other.to_string(),
    };
    let brand = obj.remove("brand").map(text_or_empty).unwrap_or_default();
    let price_value = obj.remove("price").unwrap_or(Value::Null);
    let price = parse_price(&price_value).ok_or_else(|| CatalogError::InvalidValue {
        row,
        column: "price",
        value: price_value.to_string(),
    })?;
    let product_description = obj.remove("product_description").map(text_or_empty).unwrap_or_default();
    let rating_count = obj.remove("rating_count").and_then(|v| parse_rating_count(&v)).unwrap_or(0);
    let availability = obj.remove("availability").map_or(true, |v| parse_availability(&v));
    // The row id is assigned by load order; a stored id column would only collide with it.
    obj.remove("id");

    Ok(Product {
        id: row_id(row)?,
        title,
        brand,
        price,
        product_description,
        rating_count,
        availability,
        extra: obj,
    })
}

fn row_id(row: usize) -> Result<RowId, CatalogError> {
    RowId::try_from(row).map_err(|_| CatalogError::TooManyRows { row })
}

fn text_or_empty(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Prices arrive either as numbers or as scraped text such as
/// `"$1,234.56 with 10 percent savings"`.
pub fn parse_price(v: &Value) -> Option<f64> {
    let price = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let stripped = SAVINGS.replace(s, "");
            let m = NUMBER.find(&stripped)?;
            m.as_str().replace(',', "").parse::<f64>().ok()?
        }
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Rating counts arrive as numbers or as text such as `"1,234 ratings"`.
pub fn parse_rating_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let m = NUMBER.find(s)?;
            let digits = m.as_str().replace(',', "");
            digits.split('.').next()?.parse().ok()
        }
        _ => None,
    }
}

fn parse_availability(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            !(matches!(s.as_str(), "false" | "no" | "0")
                || s.contains("out of stock")
                || s.contains("unavailable"))
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_optional_columns() {
        let catalog = Catalog::from_rows(vec![json!({"title": "Mug", "brand": "Acme", "price": 4.5})]).unwrap();
        let p = catalog.get(0).unwrap();
        assert_eq!(p.product_description, "");
        assert_eq!(p.rating_count, 0);
        assert!(p.availability);
    }

    #[test]
    fn rejects_missing_brand() {
        let err = Catalog::from_rows(vec![
            json!({"title": "Mug", "brand": "Acme", "price": 4.5}),
            json!({"title": "Cup", "price": 2}),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::MissingColumn { row: 1, column: "brand" }));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn row_ids_past_u32_are_rejected() {
        assert_eq!(row_id(7).unwrap(), 7);
        assert_eq!(row_id(RowId::MAX as usize).unwrap(), RowId::MAX);
        let err = row_id(usize::MAX).unwrap_err();
        assert!(matches!(err, CatalogError::TooManyRows { row } if row == usize::MAX));
        assert!(err.to_string().contains("at most 4294967296 products"));
    }

    #[test]
    fn null_brand_is_empty() {
        let catalog = Catalog::from_rows(vec![json!({"title": "Mug", "brand": null, "price": 1})]).unwrap();
        assert_eq!(catalog.get(0).unwrap().brand, "");
    }

    #[test]
    fn parses_scraped_values() {
        assert_eq!(parse_price(&json!("$1,234.56 with 10 percent savings")), Some(1234.56));
        assert_eq!(parse_price(&json!("$189.00")), Some(189.0));
        assert_eq!(parse_price(&json!(-3)), None);
        assert_eq!(parse_price(&json!("call for price")), None);
        assert_eq!(parse_rating_count(&json!("1,234 ratings")), Some(1234));
        assert!(!parse_availability(&json!("Currently unavailable.")));
        assert!(parse_availability(&json!("In Stock")));
    }

    #[test]
    fn passthrough_fields_survive() {
        let catalog = Catalog::from_rows(vec![
            json!({"title": "Mug", "brand": "Acme", "price": 3, "asin": "B00X", "id": 99}),
        ])
        .unwrap();
        let obj = catalog.get(0).unwrap().to_json();
        assert_eq!(obj["asin"], json!("B00X"));
        assert_eq!(obj["id"], json!(0));
    }
}
