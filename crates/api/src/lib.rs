use axum::{
    extract::{ConnectInfo, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use stockcheck_core::config::Settings;
use stockcheck_core::domain::stock::StockPricesResponse;
use stockcheck_core::error::StockPriceError;
use stockcheck_core::service::{
    parse_like_flag, StockPriceRequest, StockPriceService, SymbolSelection,
};
use stockcheck_core::storage::{MemoryStockStore, PgStockStore, StockStore, UnavailableStockStore};

#[derive(Clone)]
pub struct AppState {
    pub service: StockPriceService,
    pub trust_proxy: bool,
}

/// Postgres when `DATABASE_URL` is set. Without it, likes are kept in process
/// memory. A configured database that cannot be reached or migrated yields a
/// store that fails every request, so likes are never silently diverted.
pub async fn connect_store(settings: &Settings) -> Arc<dyn StockStore> {
    let Ok(db_url) = settings.require_database_url() else {
        tracing::warn!("DATABASE_URL missing; likes are kept in memory only");
        return Arc::new(MemoryStockStore::new());
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return Arc::new(UnavailableStockStore::new("db connect failed"));
        }
    };

    match stockcheck_core::storage::migrate(&pool).await {
        Ok(()) => Arc::new(PgStockStore::new(pool)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            Arc::new(UnavailableStockStore::new("db migrations failed"))
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/stock-prices", get(get_stock_prices))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(StockPriceError);

impl From<StockPriceError> for ApiError {
    fn from(value: StockPriceError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            sentry::capture_error(&self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct StockQuery {
    pub stocks: Vec<String>,
    pub like: Option<String>,
}

impl StockQuery {
    /// Accepts `stock=A&stock=B` as well as the bracketed `stock[]=` and
    /// `stock[0]=` spellings. For `like` the last value wins.
    pub fn parse(raw: Option<&str>) -> Self {
        let mut out = Self::default();
        let Some(raw) = raw else {
            return out;
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            if is_stock_key(&key) {
                out.stocks.push(value.into_owned());
            } else if key == "like" {
                out.like = Some(value.into_owned());
            }
        }
        out
    }
}

fn is_stock_key(key: &str) -> bool {
    match key.strip_prefix("stock") {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .is_some_and(|idx| idx.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

fn client_addr(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<String> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return Some(addr.to_string());
        }
    }
    peer.map(|p| p.ip().to_string())
}

async fn get_stock_prices(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Result<Json<StockPricesResponse>, ApiError> {
    let query = StockQuery::parse(raw.as_deref());
    let like = parse_like_flag(query.like.map(serde_json::Value::String).as_ref());
    let symbols = SymbolSelection::parse(query.stocks)?;

    let req = StockPriceRequest {
        symbols,
        like,
        client_addr: client_addr(&headers, peer.map(|ConnectInfo(addr)| addr), state.trust_proxy),
    };

    let stock_data = state.service.lookup(req).await.map_err(|err| {
        tracing::error!(error = %err, "stock price request failed");
        err
    })?;

    Ok(Json(StockPricesResponse { stock_data }))
}
