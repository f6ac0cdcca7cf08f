pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod quote;
pub mod service;
pub mod storage;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_QUOTE_PROVIDER_BASE_URL: &str =
        "https://stock-price-checker-proxy.freecodecamp.rocks";
    const DEFAULT_QUOTE_TIMEOUT_SECS: u64 = 10;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub quote_provider_base_url: String,
        pub quote_provider_api_key: Option<String>,
        pub quote_timeout_secs: u64,
        pub trust_proxy: bool,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                sentry_dsn: None,
                quote_provider_base_url: DEFAULT_QUOTE_PROVIDER_BASE_URL.to_string(),
                quote_provider_api_key: None,
                quote_timeout_secs: DEFAULT_QUOTE_TIMEOUT_SECS,
                trust_proxy: false,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: non_empty_var("DATABASE_URL"),
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                quote_provider_base_url: non_empty_var("QUOTE_PROVIDER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_QUOTE_PROVIDER_BASE_URL.to_string()),
                quote_provider_api_key: non_empty_var("QUOTE_PROVIDER_API_KEY"),
                quote_timeout_secs: std::env::var("QUOTE_PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_QUOTE_TIMEOUT_SECS),
                trust_proxy: std::env::var("TRUST_PROXY")
                    .map(|v| matches!(v.trim(), "true" | "1"))
                    .unwrap_or(false),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
