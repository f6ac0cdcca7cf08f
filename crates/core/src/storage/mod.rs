pub mod memory;
pub mod postgres;
pub mod unavailable;

use crate::domain::stock::StockRecord;
use anyhow::Context;

pub use memory::MemoryStockStore;
pub use postgres::PgStockStore;
pub use unavailable::UnavailableStockStore;

#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Stored record for the (case-insensitive) symbol, or a zero-valued one
    /// that is not written until its first like.
    async fn find_or_create(&self, symbol: &str) -> anyhow::Result<StockRecord>;

    /// Adds `fingerprint` to the record's likers and bumps `likes`, as one
    /// atomic storage operation. Returns the current record and whether the
    /// like was new.
    async fn record_like(
        &self,
        record: &StockRecord,
        fingerprint: &str,
    ) -> anyhow::Result<(StockRecord, bool)>;
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
