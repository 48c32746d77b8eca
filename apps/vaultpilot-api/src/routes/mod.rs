pub mod health;
pub mod obsidian;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(obsidian::router())
        .merge(crate::gateway::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::root,
        health::health,
        health::status,
        // Obsidian
        obsidian::get_status,
        obsidian::list_agents,
        obsidian::get_agent,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Agents
            crate::agents::Agent,
            // Route response types
            health::ServerInfo,
            health::HealthResponse,
            health::StatusResponse,
            obsidian::ObsidianStatus,
            obsidian::AgentCounts,
        )
    ),
    tags(
        (name = "Health", description = "Health and liveness"),
        (name = "Obsidian", description = "Obsidian plugin dashboard"),
    )
)]
pub struct ApiDoc;
