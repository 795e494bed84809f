//! Thin HTTP transport over [`pricing_core::PricingCore`]. Demonstrates how
//! an embedding service wires the library up; not part of the library
//! itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricing_core::config::PricingConfig;
use pricing_core::coordinator::PricingCore;
use pricing_core::error::PricingError;
use pricing_core::fallback::NoHistoricalSource;
use pricing_core::types::PricingRequest;
use pricing_core::upstream::{UpstreamQuote, UpstreamSource};

/// Calls a live pricing data source over HTTP. The response body is
/// expected to be `{"baseFare": <decimal>}`.
struct HttpUpstreamSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UpstreamQuoteBody {
    #[serde(rename = "baseFare")]
    base_fare: Decimal,
}

#[async_trait]
impl UpstreamSource for HttpUpstreamSource {
    async fn fetch(&self, request: &PricingRequest) -> Result<UpstreamQuote, PricingError> {
        let url = format!("{}/quote", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| PricingError::UpstreamUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PricingError::UpstreamUnavailable(format!(
                "upstream returned {}",
                resp.status()
            )));
        }

        let body: UpstreamQuoteBody = resp
            .json()
            .await
            .map_err(|e| PricingError::UpstreamUnavailable(e.to_string()))?;
        Ok(UpstreamQuote { base_fare: body.base_fare })
    }
}

type AppCore = Arc<PricingCore<HttpUpstreamSource, NoHistoricalSource>>;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = PricingConfig::from_env();
    let upstream_base_url =
        std::env::var("PRICING_UPSTREAM_URL").unwrap_or_else(|_| "http://localhost:4000".to_string());

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("failed to build HTTP client")?;

    let source = HttpUpstreamSource { client: http_client, base_url: upstream_base_url };
    let core: AppCore = Arc::new(PricingCore::new(source, config));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/price", post(price_handler))
        .route("/metrics", get(metrics_handler))
        .route("/admin/cache/clear", post(clear_cache_handler))
        .route("/admin/circuit/:upstream", get(circuit_state_handler))
        .layer(tower::ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(core);

    let addr = std::env::var("PRICING_SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "pricing server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pricing_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn health_check() -> &'static str {
    "ok"
}

async fn price_handler(
    State(core): State<AppCore>,
    Json(mut request): Json<PricingRequest>,
) -> impl IntoResponse {
    if request.request_id.is_empty() {
        request.request_id = uuid::Uuid::new_v4().to_string();
    }
    match core.price(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(err @ PricingError::InvalidRequest(_)) => {
            (axum::http::StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err @ PricingError::RateLimited) => {
            (axum::http::StatusCode::TOO_MANY_REQUESTS, err.to_string()).into_response()
        }
        Err(err) => {
            warn!(error = %err, "unexpected error escaped the fallback ladder");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn metrics_handler(State(core): State<AppCore>) -> impl IntoResponse {
    let snapshot = core.get_metrics();
    Json(serde_json::json!({
        "totalRequests": snapshot.total_requests,
        "cacheHits": snapshot.cache_hits,
        "cacheMisses": snapshot.cache_misses,
        "liveCalls": snapshot.live_calls,
        "fallbackCalls": snapshot.fallback_calls,
        "errorCounts": snapshot.error_counts,
        "latencyBucketsMs": snapshot.end_to_end_latency_ms,
    }))
}

async fn clear_cache_handler(State(core): State<AppCore>) -> impl IntoResponse {
    core.clear_cache();
    axum::http::StatusCode::NO_CONTENT
}

async fn circuit_state_handler(
    State(core): State<AppCore>,
    Path(upstream): Path<String>,
) -> impl IntoResponse {
    match core.get_circuit_state(&upstream) {
        Some(snapshot) => Json(serde_json::json!({
            "state": format!("{:?}", snapshot.state),
            "consecutiveFailures": snapshot.consecutive_failures,
        }))
        .into_response(),
        None => axum::http::StatusCode::NOT_FOUND.into_response(),
    }
}
