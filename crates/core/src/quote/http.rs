use crate::config::Settings;
use crate::error::QuoteError;
use crate::quote::QuoteClient;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpQuoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQuoteClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.quote_timeout_secs))
            .build()
            .context("failed to build quote provider http client")?;

        Ok(Self {
            http,
            base_url: settings.quote_provider_base_url.clone(),
            api_key: settings.quote_provider_api_key.clone(),
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}/v1/stock/{}/quote",
            self.base_url.trim_end_matches('/'),
            symbol
        )
    }

    fn headers(&self, symbol: &str) -> Result<HeaderMap, QuoteError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(api_key).map_err(|e| {
                QuoteError::UpstreamUnavailable {
                    symbol: symbol.to_string(),
                    detail: format!("invalid api key header: {e}"),
                }
            })?;
            headers.insert("x-api-key", value);
        }
        Ok(headers)
    }
}

#[async_trait::async_trait]
impl QuoteClient for HttpQuoteClient {
    fn provider_name(&self) -> &'static str {
        "http_json_quote"
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64, QuoteError> {
        let unavailable = |detail: String| QuoteError::UpstreamUnavailable {
            symbol: symbol.to_string(),
            detail,
        };

        let res = self
            .http
            .get(self.url(symbol))
            .headers(self.headers(symbol)?)
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {status}")));
        }

        let text = res
            .text()
            .await
            .map_err(|e| unavailable(format!("failed to read response: {e}")))?;

        let raw = serde_json::from_str::<Value>(&text).map_err(|e| {
            QuoteError::InvalidQuoteData {
                symbol: symbol.to_string(),
                detail: format!("response is not valid JSON: {e}"),
            }
        })?;

        parse_latest_price(symbol, &raw)
    }
}

/// Extracts `latestPrice` from a quote document. The provider answers unknown
/// symbols with a bare JSON string and unpriced ones with `null` or `0`.
pub fn parse_latest_price(symbol: &str, raw: &Value) -> Result<f64, QuoteError> {
    let invalid = |detail: String| QuoteError::InvalidQuoteData {
        symbol: symbol.to_string(),
        detail,
    };

    let obj = match raw {
        Value::Object(o) => o,
        Value::String(s) => return Err(invalid(format!("provider answered {s:?}"))),
        other => return Err(invalid(format!("expected a JSON object, got {other}"))),
    };

    let price = obj
        .get("latestPrice")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid("latestPrice is missing or not a number".to_string()))?;

    if !price.is_finite() || price == 0.0 {
        return Err(invalid(format!("latestPrice is unusable ({price})")));
    }

    Ok(price)
}
