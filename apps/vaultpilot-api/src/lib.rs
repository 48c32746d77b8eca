pub mod agents;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;

use std::sync::Arc;

use agents::{AgentRegistry, InMemoryAgentRegistry};
use config::Config;
use gateway::heartbeat::HeartbeatSettings;
use gateway::Gateway;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub agents: Arc<dyn AgentRegistry>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// Build state with the default agent catalogue.
    pub fn new(config: Config) -> Self {
        Self::with_agents(config, Arc::new(InMemoryAgentRegistry::with_defaults()))
    }

    pub fn with_agents(config: Config, agents: Arc<dyn AgentRegistry>) -> Self {
        let gateway = Gateway::new(agents.clone(), HeartbeatSettings::from(&config));
        Self {
            config: Arc::new(config),
            agents,
            gateway: Arc::new(gateway),
        }
    }
}
