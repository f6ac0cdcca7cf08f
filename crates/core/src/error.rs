use thiserror::Error;

/// Failure of a single price lookup against the quote provider.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("invalid quote data for {symbol}: {detail}")]
    InvalidQuoteData { symbol: String, detail: String },

    #[error("quote provider unavailable for {symbol}: {detail}")]
    UpstreamUnavailable { symbol: String, detail: String },
}

/// Everything that can abort a stock price request. Any of these fails the
/// whole request; there is no partial result.
#[derive(Debug, Error)]
pub enum StockPriceError {
    #[error("invalid quote data for {symbol}: {detail}")]
    InvalidQuoteData { symbol: String, detail: String },

    #[error("quote provider unavailable for {symbol}: {detail}")]
    UpstreamUnavailable { symbol: String, detail: String },

    #[error("storage failure: {0:#}")]
    StorageFailure(anyhow::Error),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("client address is not available")]
    MissingAddress,
}

impl StockPriceError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, StockPriceError::MalformedInput(_))
    }
}

impl From<QuoteError> for StockPriceError {
    fn from(value: QuoteError) -> Self {
        match value {
            QuoteError::InvalidQuoteData { symbol, detail } => {
                StockPriceError::InvalidQuoteData { symbol, detail }
            }
            QuoteError::UpstreamUnavailable { symbol, detail } => {
                StockPriceError::UpstreamUnavailable { symbol, detail }
            }
        }
    }
}
