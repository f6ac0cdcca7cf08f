use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Per-symbol like state. `updated_at` is `None` until the record has been
/// persisted by its first like.
///
/// `liked_by` is complete for the in-memory store. The Postgres store keeps
/// likers in their own table and only fills in the fingerprint a
/// `record_like` call was made with, so reads stay constant-size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    pub symbol: String,
    pub likes: i64,
    pub liked_by: HashSet<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StockRecord {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            likes: 0,
            liked_by: HashSet::new(),
            updated_at: None,
        }
    }

    pub fn is_liked_by(&self, fingerprint: &str) -> bool {
        self.liked_by.contains(fingerprint)
    }

    pub fn is_persisted(&self) -> bool {
        self.updated_at.is_some()
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockView {
    pub stock: String,
    pub price: f64,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeStockView {
    pub stock: String,
    pub price: f64,
    pub rel_likes: i64,
}

/// `stockData` payload: an object for one symbol, a two-element array when
/// comparing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockData {
    Single(StockView),
    Pair([RelativeStockView; 2]),
}

impl StockData {
    pub fn compare(first: StockView, second: StockView) -> Self {
        let first_rel = first.likes - second.likes;
        let second_rel = second.likes - first.likes;
        StockData::Pair([
            RelativeStockView {
                stock: first.stock,
                price: first.price,
                rel_likes: first_rel,
            },
            RelativeStockView {
                stock: second.stock,
                price: second.price,
                rel_likes: second_rel,
            },
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPricesResponse {
    #[serde(rename = "stockData")]
    pub stock_data: StockData,
}
