//! # HTTP API
//!
//! axum surface over the router and price service: quote, USD price, and
//! health endpoints, with CORS, request tracing and a per-request timeout as
//! middleware. Handlers validate inputs into the short machine codes the
//! error contract promises and map `NoRoute` to 404; everything else the
//! core already handled.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::RouterError;
use crate::price_service::PriceService;
use crate::router::{RouterService, MAX_SLIPPAGE_BPS};
use crate::token_registry::TokenRegistry;
use crate::types::Quote;
use crate::VERSION;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RouterService>,
    pub prices: Arc<PriceService>,
    pub registry: Arc<TokenRegistry>,
    pub request_timeout: Duration,
}

/// Builds the application router with all middleware layers.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/quote", get(get_quote))
        .route("/api/v1/price/{token_address}", get(get_price))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(cors)
        .with_state(state)
}

/// Binds and serves until SIGINT/SIGTERM.
pub async fn serve(state: AppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_app(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, version = VERSION, "starting aggregator API");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}

//================================================================================================//
//                                              DTOS                                             //
//================================================================================================//

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: code,
            message: message.into(),
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    token_in: Option<String>,
    token_out: Option<String>,
    amount_in: Option<String>,
    slippage: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteHopDto {
    dex: String,
    pair: String,
    token_in: String,
    token_out: String,
    fee: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SplitRouteDto {
    dex: String,
    percentage: u64,
    amount_in: String,
    amount_out: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    token_in: String,
    token_out: String,
    amount_in: String,
    amount_out: String,
    min_amount_out: String,
    slippage_bps: u64,
    route: Vec<RouteHopDto>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    split_routes: Vec<SplitRouteDto>,
    /// Basis points, as a decimal string.
    price_impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    price_warning: Option<String>,
    gas_estimate: u64,
    sources: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    token: String,
    symbol: String,
    #[serde(rename = "priceUSD")]
    price_usd: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

impl From<&Quote> for QuoteResponse {
    fn from(quote: &Quote) -> Self {
        let route = quote
            .best_route
            .hops
            .iter()
            .map(|hop| RouteHopDto {
                dex: hop.snapshot.dex.to_string(),
                pair: to_checksum(&hop.snapshot.address, None),
                token_in: to_checksum(&hop.token_in, None),
                token_out: to_checksum(&hop.token_out, None),
                fee: hop.snapshot.fee,
            })
            .collect();

        let split_routes = quote
            .split_legs
            .iter()
            .map(|leg| SplitRouteDto {
                dex: leg
                    .route
                    .hops
                    .first()
                    .map(|hop| hop.snapshot.dex.to_string())
                    .unwrap_or_default(),
                percentage: leg.percentage,
                amount_in: leg.amount_in.to_string(),
                amount_out: leg.amount_out.to_string(),
            })
            .collect();

        let sources = quote
            .sources
            .iter()
            .map(|(dex, amount)| (dex.to_string(), amount.clone()))
            .collect();

        Self {
            token_in: to_checksum(&quote.token_in.address, None),
            token_out: to_checksum(&quote.token_out.address, None),
            amount_in: quote.amount_in.to_string(),
            amount_out: quote.amount_out.to_string(),
            min_amount_out: quote.min_amount_out.to_string(),
            slippage_bps: quote.slippage_bps,
            route,
            split_routes,
            price_impact: quote.price_impact_bps.to_string(),
            price_warning: quote.price_warning.clone(),
            gas_estimate: quote.gas_estimate,
            sources,
        }
    }
}

//================================================================================================//
//                                            HANDLERS                                           //
//================================================================================================//

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}

fn parse_address(raw: &str) -> Option<Address> {
    raw.trim().parse().ok()
}

/// GET /api/v1/quote
async fn get_quote(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let (token_in_raw, token_out_raw, amount_in_raw) =
        match (&params.token_in, &params.token_out, &params.amount_in) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "missing_params",
                    "tokenIn, tokenOut, and amountIn are required",
                ))
            }
        };

    let token_in_addr = parse_address(token_in_raw).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "invalid_token_in",
            "tokenIn is not a valid address",
        )
    })?;
    let token_out_addr = parse_address(token_out_raw).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "invalid_token_out",
            "tokenOut is not a valid address",
        )
    })?;

    let amount_in = U256::from_dec_str(amount_in_raw)
        .ok()
        .filter(|a| !a.is_zero())
        .ok_or_else(|| {
            api_error(
                StatusCode::BAD_REQUEST,
                "invalid_amount",
                "amountIn must be a positive integer",
            )
        })?;

    let slippage_bps = match &params.slippage {
        None => 0,
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|bps| *bps <= MAX_SLIPPAGE_BPS)
            .ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_slippage",
                    "slippage must be 0-10000 basis points",
                )
            })?,
    };

    let token_in = state.registry.resolve(token_in_addr);
    let token_out = state.registry.resolve(token_out_addr);

    // When the timeout layer (or a disconnecting client) drops this handler
    // future, the guard cancels the token and tears down every venue task
    // and chain call still in flight.
    let cancel = CancellationToken::new();
    let _abort_guard = cancel.clone().drop_guard();

    let quote = state
        .router
        .get_smart_quote(&token_in, &token_out, amount_in, slippage_bps, &cancel)
        .await
        .map_err(|e| match e {
            RouterError::NoRoute => {
                api_error(StatusCode::NOT_FOUND, "no_route", e.to_string())
            }
            RouterError::InvalidSlippage(_) => {
                api_error(StatusCode::BAD_REQUEST, "invalid_slippage", e.to_string())
            }
        })?;

    Ok(Json(QuoteResponse::from(&quote)))
}

/// GET /api/v1/price/{token_address}
async fn get_price(
    State(state): State<AppState>,
    Path(token_address): Path<String>,
) -> Result<Json<PriceResponse>, ApiError> {
    let address = parse_address(&token_address).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            "invalid_token",
            "invalid token address",
        )
    })?;

    let token = state.registry.resolve(address);

    // Same teardown contract as the quote handler: dropping the future
    // cancels all in-flight venue work.
    let cancel = CancellationToken::new();
    let _abort_guard = cancel.clone().drop_guard();

    let price = state
        .prices
        .token_price_usd(&token, &cancel)
        .await
        .map_err(|e| api_error(StatusCode::NOT_FOUND, "price_not_found", e.to_string()))?;

    Ok(Json(PriceResponse {
        token: to_checksum(&token.address, None),
        symbol: token.symbol,
        price_usd: format_price_usd(price),
        updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// Renders an 18-decimal fixed-point price with two fractional digits.
fn format_price_usd(price: U256) -> String {
    let digits = price.to_string();
    let padded = if digits.len() < 19 {
        format!("{}{}", "0".repeat(19 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - 18;
    format!("{}.{}", &padded[..split], &padded[split..split + 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parsing_accepts_mixed_case() {
        assert!(parse_address("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").is_some());
        assert!(parse_address("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2").is_some());
        assert!(parse_address("not-an-address").is_none());
        assert!(parse_address("0x1234").is_none());
    }

    #[test]
    fn price_formatting_keeps_two_decimals() {
        // 1.0 exactly.
        assert_eq!(format_price_usd(U256::exp10(18)), "1.00");
        // 1234.5678... truncated, not rounded.
        let price = U256::from_dec_str("1234567890000000000000").unwrap();
        assert_eq!(format_price_usd(price), "1234.56");
        // Sub-dollar prices keep a leading zero.
        let cents = U256::from_dec_str("90000000000000000").unwrap();
        assert_eq!(format_price_usd(cents), "0.09");
        assert_eq!(format_price_usd(U256::zero()), "0.00");
    }

    #[test]
    fn quote_response_maps_the_domain_quote() {
        use crate::types::{DexProtocol, Hop, PoolSnapshot, Route, Token};
        use ethers::types::Address;

        let token = |byte: u8, symbol: &str| Token {
            address: Address::repeat_byte(byte),
            symbol: symbol.to_string(),
            name: String::new(),
            decimals: 18,
        };
        let snapshot = PoolSnapshot {
            address: Address::repeat_byte(0xaa),
            token0: token(1, "A"),
            token1: token(2, "B"),
            reserve0: U256::exp10(22),
            reserve1: U256::exp10(22),
            weight0: None,
            weight1: None,
            dex: DexProtocol::Sushiswap,
            fee: 30,
            updated_at: 0,
        };
        let route = Route {
            hops: vec![Hop {
                snapshot,
                token_in: Address::repeat_byte(1),
                token_out: Address::repeat_byte(2),
            }],
            token_in: token(1, "A"),
            token_out: token(2, "B"),
            amount_in: U256::exp10(18),
            amount_out: U256::from(997u64),
            gas_estimate: 121_000,
        };
        let mut sources = BTreeMap::new();
        sources.insert(DexProtocol::Sushiswap, "997".to_string());
        let quote = Quote {
            token_in: token(1, "A"),
            token_out: token(2, "B"),
            amount_in: U256::exp10(18),
            amount_out: U256::from(997u64),
            best_route: route,
            split_legs: Vec::new(),
            price_impact_bps: 12,
            min_amount_out: U256::from(992u64),
            slippage_bps: 50,
            gas_estimate: 121_000,
            sources,
            price_warning: None,
        };

        let dto = QuoteResponse::from(&quote);
        assert_eq!(dto.amount_out, "997");
        assert_eq!(dto.min_amount_out, "992");
        assert_eq!(dto.price_impact, "12");
        assert_eq!(dto.route.len(), 1);
        assert_eq!(dto.route[0].dex, "sushiswap");
        assert_eq!(dto.route[0].fee, 30);
        assert_eq!(dto.sources.get("sushiswap").unwrap(), "997");
        assert!(dto.split_routes.is_empty());
    }
}
