// Axum HTTP surface for the fee pipeline.
//
// Each read endpoint runs the whole acquisition → transformation → bundling
// chain under one outer time budget; exceeding it fails the request instead
// of partially completing. Responses carry shared-cache directives so CDN
// layers can serve and revalidate without hitting the pipeline.

use crate::errors::FeeError;
use crate::fee_service::FeeService;
use crate::filters::FilterSpec;
use crate::metrics;
use crate::protocols::{Category, ProtocolListing, ProtocolMetric};
use crate::settings::{Api, Settings};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;

/// Global shutdown notifier
static SHUTDOWN_NOTIFY: Lazy<Arc<Notify>> = Lazy::new(|| Arc::new(Notify::new()));

/// Trigger server shutdown
pub fn shutdown() {
    SHUTDOWN_NOTIFY.notify_one();
}

pub struct ApiState {
    pub service: FeeService,
    pub api: Api,
}

/// Start the API server. Blocks until shutdown.
pub async fn start_server(settings: Settings) -> Result<()> {
    let state = Arc::new(ApiState {
        service: FeeService::new(&settings),
        api: settings.api.clone(),
    });

    serve(state).await
}

pub async fn serve(state: Arc<ApiState>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.api.host, state.api.port)
        .parse()
        .context("Invalid bind address")?;

    let app = build_app(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("✅ API listening on http://{}", addr);

    let shutdown_signal = async {
        SHUTDOWN_NOTIFY.notified().await;
        info!("Received shutdown signal, stopping API server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("✅ API server stopped gracefully");
    Ok(())
}

fn build_app(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/v1/fees", get(fees_handler))
        .route("/api/v1/fees/:id", get(fee_by_id_handler))
        .route("/api/v1/protocols", get(protocols_handler))
        .route("/api/v1/fees-by-day", get(fees_by_day_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn cache_control(s_maxage: u64, stale_while_revalidate: u64) -> String {
    format!(
        "max-age=0, s-maxage={}, stale-while-revalidate={}",
        s_maxage, stale_while_revalidate
    )
}

#[derive(Debug, Default, Deserialize)]
struct FeesQuery {
    /// Comma-separated canonical category identifiers (e.g. "dex,lending")
    categories: Option<String>,
    /// Comma-separated chain identifiers (e.g. "ethereum,polygon")
    chains: Option<String>,
}

impl FeesQuery {
    fn filter_spec(&self) -> FilterSpec {
        let categories = self
            .categories
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|value| {
                let value = value.trim();
                if value.is_empty() {
                    return None;
                }
                let parsed = Category::parse(value);
                if parsed.is_none() {
                    warn!("Ignoring unknown category filter value '{}'", value);
                }
                parsed
            })
            .collect();

        let chains = self
            .chains
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();

        FilterSpec { categories, chains }
    }
}

#[derive(Serialize)]
struct FeesResponse {
    success: bool,
    protocols: Vec<ProtocolMetric>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[derive(Serialize)]
struct ListingResponse {
    success: bool,
    protocols: Vec<ProtocolListing>,
}

fn error_response(error: FeeError) -> Response {
    let status = match &error {
        FeeError::RequestTimeout(_) => {
            metrics::increment_request_timeout();
            StatusCode::GATEWAY_TIMEOUT
        }
        FeeError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
    };
    error!("Request failed: {}", error);
    (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
        .into_response()
}

async fn fees_handler(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<FeesQuery>,
) -> Response {
    let started = Instant::now();
    let budget = Duration::from_millis(state.api.timeout_ms);
    let spec = query.filter_spec();

    let result = tokio::time::timeout(budget, state.service.filtered_protocol_fees(&spec)).await;
    metrics::record_request_duration("fees", started.elapsed());

    let response = match result {
        Err(_) => return error_response(FeeError::RequestTimeout(state.api.timeout_ms)),
        Ok(Err(error)) => return error_response(error),
        Ok(Ok((protocols, tags))) => FeesResponse {
            success: true,
            protocols,
            tags,
        },
    };

    (
        StatusCode::OK,
        [(
            header::CACHE_CONTROL,
            cache_control(
                state.api.fees_s_maxage_seconds,
                state.api.fees_stale_while_revalidate_seconds,
            ),
        )],
        Json(response),
    )
        .into_response()
}

async fn fee_by_id_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Response {
    let started = Instant::now();
    let budget = Duration::from_millis(state.api.timeout_ms);

    let result = tokio::time::timeout(budget, state.service.protocol_by_id(&id)).await;
    metrics::record_request_duration("fee_by_id", started.elapsed());

    let protocol = match result {
        Err(_) => return error_response(FeeError::RequestTimeout(state.api.timeout_ms)),
        Ok(Err(error)) => return error_response(error),
        Ok(Ok(None)) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "success": false, "error": format!("Unknown protocol '{}'", id) })),
            )
                .into_response()
        }
        Ok(Ok(Some(protocol))) => protocol,
    };

    (
        StatusCode::OK,
        [(
            header::CACHE_CONTROL,
            cache_control(
                state.api.fees_s_maxage_seconds,
                state.api.fees_stale_while_revalidate_seconds,
            ),
        )],
        Json(json!({ "success": true, "protocol": protocol })),
    )
        .into_response()
}

async fn protocols_handler(State(state): State<Arc<ApiState>>) -> Response {
    let started = Instant::now();
    let budget = Duration::from_millis(state.api.timeout_ms);

    let result = tokio::time::timeout(budget, state.service.protocol_listing()).await;
    metrics::record_request_duration("protocols", started.elapsed());

    let protocols = match result {
        Err(_) => return error_response(FeeError::RequestTimeout(state.api.timeout_ms)),
        Ok(Err(error)) => return error_response(error),
        Ok(Ok(protocols)) => protocols,
    };

    (
        StatusCode::OK,
        [(
            header::CACHE_CONTROL,
            cache_control(
                state.api.listing_s_maxage_seconds,
                state.api.listing_stale_while_revalidate_seconds,
            ),
        )],
        Json(ListingResponse {
            success: true,
            protocols,
        }),
    )
        .into_response()
}

/// The upstream source exposes aggregate windows only, so per-protocol daily
/// history cannot be served. Kept as a permanent notice for old clients.
async fn fees_by_day_handler() -> Response {
    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, cache_control(600, 300))],
        Json(json!({
            "success": false,
            "message": "Historical per-day fee data is no longer available. Please use /api/v1/fees for current fee data.",
            "availableEndpoints": [
                "/api/v1/fees - Current fee data for all protocols",
                "/api/v1/protocols - List of available protocols",
            ],
        })),
    )
        .into_response()
}
