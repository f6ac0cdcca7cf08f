pub mod http;

use crate::error::QuoteError;

pub use http::HttpQuoteClient;

#[async_trait::async_trait]
pub trait QuoteClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Latest traded price for an uppercase ticker symbol.
    async fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError>;
}
