//! Health check endpoints
//!
//! - /health, /healthz - Liveness (is the service running?)
//! - /ready, /readyz - Readiness (can the document store be reached?)
//! - /version - build information

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use tracing::warn;

use super::response::json_response;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    pub store: StoreHealth,
    pub checkout_enabled: bool,
    pub uploads_enabled: bool,
    pub admin_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    /// "mongodb" or "memory"
    pub kind: &'static str,
    pub reachable: bool,
    /// Posts currently held by the live feed mirror
    pub mirrored_posts: usize,
    pub mirror_stalled: bool,
}

async fn build_health_response(state: &AppState) -> HealthResponse {
    let ping = state.store.ping().await;
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode { "development" } else { "production" },
        store: StoreHealth {
            kind: state.store.kind(),
            reachable: ping.is_ok(),
            mirrored_posts: state.posts.len(),
            mirror_stalled: state.posts.is_stalled(),
        },
        checkout_enabled: state.checkout.is_configured(),
        uploads_enabled: state.uploader.is_configured(),
        admin_enabled: state.admin.is_enabled(),
        error: ping.err().map(|e| {
            warn!(error = %e, "Document store ping failed");
            e.public_message()
        }),
    }
}

/// Liveness: 200 whenever the process is serving.
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &build_health_response(state).await)
}

/// Readiness: 503 until the document store answers.
pub async fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = build_health_response(state).await;
    let status = if response.store.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &response)
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "storefront",
    };
    json_response(StatusCode::OK, &response)
}
