//! HTTP surface: the metrics endpoint and its router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tower_http::compression::CompressionLayer;
use tracing::error;

use crate::access_log::access_log;

const OPENMETRICS_CONTENT_TYPE: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub(crate) type SharedRegistry = Arc<Registry>;

/// Builds the exporter router serving `registry` at `telemetry_path`.
pub(crate) fn router(registry: SharedRegistry, telemetry_path: &str) -> Router {
    Router::new()
        .route(telemetry_path, get(handle_metrics))
        .fallback(handle_not_found)
        .with_state(registry)
        .layer(middleware::from_fn_with_state(
            Arc::<str>::from(telemetry_path),
            access_log,
        ))
        .layer(CompressionLayer::new())
}

/// Encodes the registry; each encode runs a fresh scrape.
///
/// Scrape failures surface as `up 0` in the body, never as an error status.
pub(crate) async fn handle_metrics(
    State(registry): State<SharedRegistry>,
) -> Result<Response, StatusCode> {
    // The collector spawns and waits on `ipcs`; keep it off the async workers.
    let body = tokio::task::spawn_blocking(move || {
        let mut buf = String::new();
        encode(&mut buf, &registry).map(|()| buf)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "scrape panicked in spawn_blocking");
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!(error = %e, "failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], Body::from(body)).into_response())
}

async fn handle_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 page not found\n")
}
