//! Per-request access logging middleware.
//!
//! Prometheus scrapes the telemetry path on a fixed interval, so successful
//! scrapes log at debug. Anything else (unknown paths, wrong methods, failed
//! encodes) is logged at info, or at warn for server errors.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Level, debug, info, warn};

pub(crate) async fn access_log(
    State(telemetry_path): State<Arc<str>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "-".to_owned());
    let started = Instant::now();

    let response = next.run(req).await;

    let latency_ms = started.elapsed().as_millis() as u64;
    let status = response.status();
    let level = access_level(&path, &telemetry_path, status);
    if level == Level::DEBUG {
        debug!(client, latency_ms, "scrape served");
    } else if level == Level::WARN {
        warn!(client, status = status.as_u16(), latency_ms, "{method} {path}");
    } else {
        info!(client, status = status.as_u16(), latency_ms, "{method} {path}");
    }

    response
}

/// Level a request is logged at.
fn access_level(path: &str, telemetry_path: &str, status: StatusCode) -> Level {
    if status.is_server_error() {
        Level::WARN
    } else if path == telemetry_path && status.is_success() {
        Level::DEBUG
    } else {
        Level::INFO
    }
}
