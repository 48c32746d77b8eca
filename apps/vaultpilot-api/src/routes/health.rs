use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use vaultpilot_common::time::iso_now;

use crate::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn router() -> Router<AppState> {
    // axum answers HEAD on GET routes with an empty body.
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/status", get(status))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServerInfo {
    pub message: String,
    pub version: String,
    pub status: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Live WebSocket connections.
    pub connections: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses((status = 200, description = "Server info", body = ServerInfo)),
)]
pub async fn root() -> Json<ServerInfo> {
    let endpoints = [
        ("health", "/health"),
        ("status", "/status"),
        ("obsidian_status", "/api/obsidian/status"),
        ("agents", "/api/obsidian/agents"),
        ("websocket", "/ws"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(ServerInfo {
        message: "VaultPilot API".to_string(),
        version: VERSION.to_string(),
        status: "running".to_string(),
        endpoints,
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse)),
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: iso_now(),
        connections: state.gateway.registry().count(None),
    })
}

/// Liveness check. Also answers `HEAD`.
#[utoipa::path(
    get,
    path = "/status",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = StatusResponse)),
)]
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
    })
}
