//! Dashboard endpoints consumed by the Obsidian plugin.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;
use vaultpilot_common::id::{is_prefixed, prefix};
use vaultpilot_common::time::iso_now;
use vaultpilot_common::ApiResponse;

use crate::agents::Agent;
use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/obsidian/status", get(get_status))
        .route("/api/obsidian/agents", get(list_agents))
        .route("/api/obsidian/agents/{agent_id}", get(get_agent))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentCounts {
    pub active: usize,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObsidianStatus {
    pub connection: String,
    pub websocket_connections: usize,
    /// Vaults with at least one live connection, sorted.
    pub active_vaults: Vec<String>,
    pub agents: AgentCounts,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// GET /api/obsidian/status
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/obsidian/status",
    tag = "Obsidian",
    responses(
        (status = 200, description = "Gateway status, wrapped in the success envelope", body = ObsidianStatus),
    ),
)]
pub async fn get_status(State(state): State<AppState>) -> Json<ApiResponse<ObsidianStatus>> {
    let registry = state.gateway.registry();
    let mut active_vaults: Vec<String> = registry.channels().into_iter().collect();
    active_vaults.sort();

    let agents = state.agents.list_agents().await;
    let status = ObsidianStatus {
        connection: "connected".to_string(),
        websocket_connections: registry.count(None),
        active_vaults,
        agents: AgentCounts {
            active: agents.iter().filter(|a| a.active).count(),
            total: agents.len(),
        },
        timestamp: iso_now(),
    };
    Json(ApiResponse::ok(status))
}

// ---------------------------------------------------------------------------
// GET /api/obsidian/agents
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/obsidian/agents",
    tag = "Obsidian",
    responses(
        (status = 200, description = "Known agents, wrapped in the success envelope", body = Vec<Agent>),
    ),
)]
pub async fn list_agents(State(state): State<AppState>) -> Json<ApiResponse<Vec<Agent>>> {
    let agents = state.agents.list_agents().await;
    let message = format!("{} agents available", agents.len());
    Json(ApiResponse::ok(agents).with_message(message))
}

// ---------------------------------------------------------------------------
// GET /api/obsidian/agents/{agent_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/obsidian/agents/{agent_id}",
    tag = "Obsidian",
    params(("agent_id" = String, Path, description = "Agent ID")),
    responses(
        (status = 200, description = "Agent, wrapped in the success envelope", body = Agent),
        (status = 400, description = "Malformed agent ID", body = ApiErrorBody),
        (status = 404, description = "Agent not found", body = ApiErrorBody),
    ),
)]
pub async fn get_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<ApiResponse<Agent>>, ApiError> {
    if !is_prefixed(&agent_id, prefix::AGENT) {
        return Err(ApiError::bad_request("Invalid agent ID"));
    }
    let agent = state
        .agents
        .get_agent(&agent_id)
        .await
        .ok_or_else(|| ApiError::not_found("Agent not found"))?;
    Ok(Json(ApiResponse::ok(agent)))
}
