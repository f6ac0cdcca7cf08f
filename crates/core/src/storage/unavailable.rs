use crate::domain::stock::StockRecord;
use crate::storage::StockStore;

/// Stand-in for a configured database that could not be reached at startup.
/// Every operation fails, so requests surface a storage failure instead of
/// counting likes somewhere that will not survive a restart.
#[derive(Debug, Clone)]
pub struct UnavailableStockStore {
    reason: String,
}

impl UnavailableStockStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl StockStore for UnavailableStockStore {
    fn backend_name(&self) -> &'static str {
        "unavailable"
    }

    async fn find_or_create(&self, symbol: &str) -> anyhow::Result<StockRecord> {
        anyhow::bail!("stock store unavailable ({}); cannot read {symbol}", self.reason)
    }

    async fn record_like(
        &self,
        record: &StockRecord,
        _fingerprint: &str,
    ) -> anyhow::Result<(StockRecord, bool)> {
        anyhow::bail!(
            "stock store unavailable ({}); cannot like {}",
            self.reason,
            record.symbol
        )
    }
}
