use crate::domain::stock::{normalize_symbol, StockRecord};
use crate::storage::StockStore;
use chrono::Utc;
use dashmap::DashMap;

/// Process-local store. Only symbols that have been liked are kept, matching
/// the Postgres store's write-on-change behavior.
#[derive(Debug, Default)]
pub struct MemoryStockStore {
    records: DashMap<String, StockRecord>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl StockStore for MemoryStockStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_or_create(&self, symbol: &str) -> anyhow::Result<StockRecord> {
        let symbol = normalize_symbol(symbol);
        Ok(self
            .records
            .get(&symbol)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| StockRecord::new(&symbol)))
    }

    async fn record_like(
        &self,
        record: &StockRecord,
        fingerprint: &str,
    ) -> anyhow::Result<(StockRecord, bool)> {
        let symbol = normalize_symbol(&record.symbol);

        // The entry guard holds the shard lock for the whole test-and-insert.
        let mut entry = self
            .records
            .entry(symbol.clone())
            .or_insert_with(|| StockRecord::new(&symbol));

        let applied = entry.liked_by.insert(fingerprint.to_string());
        if applied {
            entry.likes += 1;
            entry.updated_at = Some(Utc::now());
        }

        Ok((entry.value().clone(), applied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn unseen_symbol_starts_at_zero_and_is_not_written() {
        let store = MemoryStockStore::new();
        let r = store.find_or_create("goog").await.unwrap();
        assert_eq!(r.symbol, "GOOG");
        assert_eq!(r.likes, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn same_visitor_likes_once() {
        let store = MemoryStockStore::new();
        let r = store.find_or_create("GOOG").await.unwrap();

        let (r, applied) = store.record_like(&r, "fp-1").await.unwrap();
        assert!(applied);
        assert_eq!(r.likes, 1);

        let (r, applied) = store.record_like(&r, "fp-1").await.unwrap();
        assert!(!applied);
        assert_eq!(r.likes, 1);
        assert!(r.is_liked_by("fp-1"));
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let store = MemoryStockStore::new();
        let r = store.find_or_create("msft").await.unwrap();
        store.record_like(&r, "fp-1").await.unwrap();

        let again = store.find_or_create("MsFt").await.unwrap();
        assert_eq!(again.likes, 1);
        assert!(again.is_persisted());
    }

    #[tokio::test]
    async fn concurrent_likes_from_distinct_visitors_all_count() {
        let store = Arc::new(MemoryStockStore::new());
        let record = store.find_or_create("GOOG").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = Arc::clone(&store);
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                store.record_like(&record, &format!("fp-{i}")).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let r = store.find_or_create("GOOG").await.unwrap();
        assert_eq!(r.likes, 50);
        assert_eq!(r.liked_by.len(), 50);
    }

    #[tokio::test]
    async fn concurrent_likes_from_one_visitor_count_once() {
        let store = Arc::new(MemoryStockStore::new());
        let record = store.find_or_create("GOOG").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = Arc::clone(&store);
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                store.record_like(&record, "fp-same").await
            }));
        }
        let mut applied = 0;
        for h in handles {
            if h.await.unwrap().unwrap().1 {
                applied += 1;
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(store.find_or_create("GOOG").await.unwrap().likes, 1);
    }
}
