use crate::domain::stock::{normalize_symbol, StockRecord};
use crate::storage::StockStore;
use anyhow::Context;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct PgStockStore {
    pool: sqlx::PgPool,
}

impl PgStockStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn load(&self, symbol: &str) -> anyhow::Result<Option<StockRecord>> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "SELECT likes, updated_at FROM stocks WHERE symbol = $1",
        )
        .persistent(false)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select stocks failed (symbol={symbol})"))?;

        Ok(row.map(|(likes, updated_at)| StockRecord {
            likes,
            updated_at: Some(updated_at),
            ..StockRecord::new(symbol)
        }))
    }
}

#[async_trait::async_trait]
impl StockStore for PgStockStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn find_or_create(&self, symbol: &str) -> anyhow::Result<StockRecord> {
        let symbol = normalize_symbol(symbol);
        Ok(self
            .load(&symbol)
            .await?
            .unwrap_or_else(|| StockRecord::new(&symbol)))
    }

    async fn record_like(
        &self,
        record: &StockRecord,
        fingerprint: &str,
    ) -> anyhow::Result<(StockRecord, bool)> {
        let symbol = normalize_symbol(&record.symbol);

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;

        // The primary key on (symbol, fingerprint) serializes concurrent likes
        // from the same visitor; the row update below serializes the counter.
        let res = sqlx::query(
            "INSERT INTO stock_likes (symbol, fingerprint) VALUES ($1, $2) \
             ON CONFLICT (symbol, fingerprint) DO NOTHING",
        )
        .persistent(false)
        .bind(&symbol)
        .bind(fingerprint)
        .execute(&mut *tx)
        .await
        .context("insert stock_likes failed")?;

        let applied = res.rows_affected() == 1;
        let row = if applied {
            let row = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
                "INSERT INTO stocks (symbol, likes) VALUES ($1, 1) \
                 ON CONFLICT (symbol) DO UPDATE \
                   SET likes = stocks.likes + 1, updated_at = now() \
                 RETURNING likes, updated_at",
            )
            .persistent(false)
            .bind(&symbol)
            .fetch_one(&mut *tx)
            .await
            .context("upsert stocks failed")?;
            tx.commit().await.context("commit transaction failed")?;
            row
        } else {
            tx.rollback().await.context("rollback transaction failed")?;
            let current = self
                .load(&symbol)
                .await?
                .with_context(|| format!("stock row missing for existing like (symbol={symbol})"))?;
            (current.likes, current.updated_at.unwrap_or_else(Utc::now))
        };

        let mut current = StockRecord::new(&symbol);
        current.likes = row.0;
        current.updated_at = Some(row.1);
        current.liked_by.insert(fingerprint.to_string());
        Ok((current, applied))
    }
}
