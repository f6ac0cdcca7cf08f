use crate::domain::stock::{normalize_symbol, StockData, StockView};
use crate::error::StockPriceError;
use crate::fingerprint::fingerprint;
use crate::quote::QuoteClient;
use crate::storage::StockStore;
use serde_json::Value;
use std::sync::Arc;

/// `like` is truthy only for `"true"`, `"1"`, `1` and `true`.
pub fn parse_like_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true" || s == "1",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSelection {
    Single(String),
    Pair(String, String),
}

impl SymbolSelection {
    pub fn parse(symbols: Vec<String>) -> Result<Self, StockPriceError> {
        let symbols: Vec<String> = symbols.iter().map(|s| normalize_symbol(s)).collect();

        if symbols.iter().any(|s| s.is_empty()) {
            return Err(StockPriceError::MalformedInput(
                "stock symbols must be non-empty".to_string(),
            ));
        }

        let mut it = symbols.into_iter();
        match (it.next(), it.next(), it.next()) {
            (None, _, _) => Err(StockPriceError::MalformedInput(
                "at least one stock symbol is required".to_string(),
            )),
            (Some(a), None, _) => Ok(SymbolSelection::Single(a)),
            (Some(a), Some(b), None) => Ok(SymbolSelection::Pair(a, b)),
            (Some(_), Some(_), Some(_)) => Err(StockPriceError::MalformedInput(
                "at most two stock symbols can be compared".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockPriceRequest {
    pub symbols: SymbolSelection,
    pub like: bool,
    pub client_addr: Option<String>,
}

#[derive(Clone)]
pub struct StockPriceService {
    quotes: Arc<dyn QuoteClient>,
    store: Arc<dyn StockStore>,
}

impl StockPriceService {
    pub fn new(quotes: Arc<dyn QuoteClient>, store: Arc<dyn StockStore>) -> Self {
        Self { quotes, store }
    }

    pub async fn lookup(&self, req: StockPriceRequest) -> Result<StockData, StockPriceError> {
        let visitor = if req.like {
            Some(fingerprint(req.client_addr.as_deref())?)
        } else {
            None
        };
        let visitor = visitor.as_deref();

        match req.symbols {
            SymbolSelection::Single(symbol) => {
                let price = self.price(&symbol).await?;
                let view = self.apply(symbol, price, visitor).await?;
                Ok(StockData::Single(view))
            }
            SymbolSelection::Pair(first, second) => {
                // Every price is resolved before the store is touched, so an
                // upstream failure for either symbol leaves likes unchanged.
                let (first_price, second_price) =
                    tokio::try_join!(self.price(&first), self.price(&second))?;
                let (first, second) = tokio::try_join!(
                    self.apply(first, first_price, visitor),
                    self.apply(second, second_price, visitor),
                )?;
                Ok(StockData::compare(first, second))
            }
        }
    }

    async fn price(&self, symbol: &str) -> Result<f64, StockPriceError> {
        self.quotes.latest_price(symbol).await.map_err(|err| {
            tracing::warn!(
                %symbol,
                provider = self.quotes.provider_name(),
                error = %err,
                "quote lookup failed"
            );
            StockPriceError::from(err)
        })
    }

    async fn apply(
        &self,
        symbol: String,
        price: f64,
        visitor: Option<&str>,
    ) -> Result<StockView, StockPriceError> {
        let mut record = self
            .store
            .find_or_create(&symbol)
            .await
            .map_err(StockPriceError::StorageFailure)?;

        if let Some(fp) = visitor {
            let (updated, applied) = self
                .store
                .record_like(&record, fp)
                .await
                .map_err(StockPriceError::StorageFailure)?;
            tracing::debug!(
                %symbol,
                applied,
                likes = updated.likes,
                backend = self.store.backend_name(),
                "like processed"
            );
            record = updated;
        }

        Ok(StockView {
            stock: symbol,
            price,
            likes: record.likes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stock::RelativeStockView;
    use crate::error::QuoteError;
    use crate::storage::MemoryStockStore;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedQuotes {
        prices: HashMap<&'static str, f64>,
        calls: AtomicUsize,
    }

    impl FixedQuotes {
        fn new(prices: &[(&'static str, f64)]) -> Self {
            Self {
                prices: prices.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl QuoteClient for FixedQuotes {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "DOWN" => Err(QuoteError::UpstreamUnavailable {
                    symbol: symbol.to_string(),
                    detail: "connection refused".to_string(),
                }),
                _ => self
                    .prices
                    .get(symbol)
                    .copied()
                    .ok_or_else(|| QuoteError::InvalidQuoteData {
                        symbol: symbol.to_string(),
                        detail: "latestPrice is missing or not a number".to_string(),
                    }),
            }
        }
    }

    struct Harness {
        service: StockPriceService,
        store: Arc<MemoryStockStore>,
        quotes: Arc<FixedQuotes>,
    }

    fn harness() -> Harness {
        let quotes = Arc::new(FixedQuotes::new(&[("GOOG", 172.5), ("MSFT", 410.25)]));
        let store = Arc::new(MemoryStockStore::new());
        Harness {
            service: StockPriceService::new(quotes.clone(), store.clone()),
            store,
            quotes,
        }
    }

    fn request(symbols: &[&str], like: bool, addr: Option<&str>) -> StockPriceRequest {
        StockPriceRequest {
            symbols: SymbolSelection::parse(symbols.iter().map(|s| s.to_string()).collect())
                .unwrap(),
            like,
            client_addr: addr.map(str::to_string),
        }
    }

    fn single(data: StockData) -> StockView {
        match data {
            StockData::Single(v) => v,
            other => panic!("expected single, got {other:?}"),
        }
    }

    fn pair(data: StockData) -> [RelativeStockView; 2] {
        match data {
            StockData::Pair(p) => p,
            other => panic!("expected pair, got {other:?}"),
        }
    }

    #[test]
    fn like_flag_accepts_only_enumerated_truthy_forms() {
        assert!(parse_like_flag(Some(&json!("true"))));
        assert!(parse_like_flag(Some(&json!("1"))));
        assert!(parse_like_flag(Some(&json!(1))));
        assert!(parse_like_flag(Some(&json!(true))));

        assert!(!parse_like_flag(None));
        assert!(!parse_like_flag(Some(&json!("TRUE"))));
        assert!(!parse_like_flag(Some(&json!("yes"))));
        assert!(!parse_like_flag(Some(&json!(""))));
        assert!(!parse_like_flag(Some(&json!(2))));
        assert!(!parse_like_flag(Some(&json!(1.5))));
        assert!(!parse_like_flag(Some(&json!(false))));
        assert!(!parse_like_flag(Some(&json!(null))));
    }

    #[test]
    fn symbol_selection_accepts_one_or_two() {
        assert_eq!(
            SymbolSelection::parse(vec!["goog".into()]).unwrap(),
            SymbolSelection::Single("GOOG".into())
        );
        assert_eq!(
            SymbolSelection::parse(vec!["goog".into(), " msft".into()]).unwrap(),
            SymbolSelection::Pair("GOOG".into(), "MSFT".into())
        );
    }

    #[test]
    fn symbol_selection_rejects_empty_blank_and_three() {
        for symbols in [
            vec![],
            vec!["  ".to_string()],
            vec!["GOOG".to_string(), "".to_string()],
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
        ] {
            let err = SymbolSelection::parse(symbols).unwrap_err();
            assert!(err.is_client_error(), "unexpected error: {err}");
        }
    }

    #[tokio::test]
    async fn fresh_symbol_reports_zero_likes_and_reads_are_idempotent() {
        let h = harness();
        let first = single(h.service.lookup(request(&["goog"], false, None)).await.unwrap());
        assert_eq!(first.stock, "GOOG");
        assert_eq!(first.price, 172.5);
        assert_eq!(first.likes, 0);

        let second = single(h.service.lookup(request(&["GOOG"], false, None)).await.unwrap());
        assert_eq!(second.likes, first.likes);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn repeated_like_from_same_visitor_counts_once() {
        let h = harness();
        let a = single(
            h.service
                .lookup(request(&["GOOG"], true, Some("10.0.0.1")))
                .await
                .unwrap(),
        );
        assert_eq!(a.likes, 1);

        // Same host seen through the IPv4-mapped IPv6 form.
        let b = single(
            h.service
                .lookup(request(&["GOOG"], true, Some("::ffff:10.0.0.1")))
                .await
                .unwrap(),
        );
        assert_eq!(b.likes, a.likes);
    }

    #[tokio::test]
    async fn likes_from_two_visitors_add_up() {
        let h = harness();
        for addr in ["10.0.0.1", "10.0.0.2"] {
            h.service
                .lookup(request(&["GOOG"], true, Some(addr)))
                .await
                .unwrap();
        }
        let v = single(h.service.lookup(request(&["GOOG"], false, None)).await.unwrap());
        assert_eq!(v.likes, 2);
    }

    #[tokio::test]
    async fn concurrent_likes_from_distinct_visitors_are_not_lost() {
        let h = harness();
        let service = Arc::new(h.service.clone());

        let mut handles = Vec::new();
        for i in 0..25 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                service
                    .lookup(request(&["GOOG"], true, Some(&format!("10.0.1.{i}"))))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let v = single(service.lookup(request(&["GOOG"], false, None)).await.unwrap());
        assert_eq!(v.likes, 25);
    }

    #[tokio::test]
    async fn pair_returns_relative_likes_in_input_order() {
        let h = harness();
        for addr in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            h.service
                .lookup(request(&["MSFT"], true, Some(addr)))
                .await
                .unwrap();
        }
        h.service
            .lookup(request(&["GOOG"], true, Some("10.0.0.1")))
            .await
            .unwrap();

        let [goog, msft] = pair(
            h.service
                .lookup(request(&["goog", "msft"], false, None))
                .await
                .unwrap(),
        );
        assert_eq!(goog.stock, "GOOG");
        assert_eq!(goog.price, 172.5);
        assert_eq!(goog.rel_likes, -2);
        assert_eq!(msft.stock, "MSFT");
        assert_eq!(msft.price, 410.25);
        assert_eq!(msft.rel_likes, 2);

        let [msft, goog] = pair(
            h.service
                .lookup(request(&["MSFT", "GOOG"], false, None))
                .await
                .unwrap(),
        );
        assert_eq!(msft.rel_likes, 2);
        assert_eq!(goog.rel_likes, -2);
    }

    #[tokio::test]
    async fn liking_a_pair_likes_both_and_sums_to_zero() {
        let h = harness();
        let [a, b] = pair(
            h.service
                .lookup(request(&["GOOG", "MSFT"], true, Some("10.0.0.9")))
                .await
                .unwrap(),
        );
        assert_eq!(a.rel_likes + b.rel_likes, 0);
        assert_eq!(h.store.find_or_create("GOOG").await.unwrap().likes, 1);
        assert_eq!(h.store.find_or_create("MSFT").await.unwrap().likes, 1);
    }

    #[tokio::test]
    async fn upstream_failure_aborts_without_mutation() {
        let h = harness();
        let err = h
            .service
            .lookup(request(&["DOWN"], true, Some("10.0.0.1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StockPriceError::UpstreamUnavailable { .. }));

        let err = h
            .service
            .lookup(request(&["GOOG", "DOWN"], true, Some("10.0.0.1")))
            .await
            .unwrap_err();
        assert!(matches!(err, StockPriceError::UpstreamUnavailable { .. }));
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn invalid_quote_fails_whole_pair() {
        let h = harness();
        let err = h
            .service
            .lookup(request(&["GOOG", "ZZZZ"], false, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StockPriceError::InvalidQuoteData { ref symbol, .. } if symbol == "ZZZZ"));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn like_without_client_address_fails_before_any_lookup() {
        let h = harness();
        let err = h
            .service
            .lookup(request(&["GOOG"], true, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StockPriceError::MissingAddress));
        assert_eq!(h.quotes.calls.load(Ordering::SeqCst), 0);
        assert!(h.store.is_empty());
    }
}
