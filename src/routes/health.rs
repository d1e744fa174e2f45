//! Health check endpoints
//!
//! Liveness probe plus version info for deployment verification. The IdP has
//! no readiness distinction: if the process is up it can take traffic, and
//! registry reachability surfaces per request as an authentication failure.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub mode: String,
    pub node_id: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub built_at: &'static str,
}

/// GET /health, /healthz
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: if state.args.dev_mode {
            "development".into()
        } else {
            "production".into()
        },
        node_id: state.args.node_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    json_response(StatusCode::OK, &body)
}

/// GET /version
pub fn version_info() -> Response<Full<Bytes>> {
    let body = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        commit_full: env!("GIT_COMMIT_FULL"),
        built_at: env!("BUILD_TIMESTAMP"),
    };

    json_response(StatusCode::OK, &body)
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(json)))
        .unwrap()
}
