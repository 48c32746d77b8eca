//! Agent registry consumed by the gateway handshake and the agents routes.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use utoipa::ToSchema;
use vaultpilot_common::id::{prefix, prefixed_ulid};

/// An AI agent known to the backend.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub active: bool,
}

impl Agent {
    pub fn new(name: &str, description: &str, capabilities: &[&str]) -> Self {
        Self {
            id: prefixed_ulid(prefix::AGENT),
            name: name.to_string(),
            description: description.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            active: true,
        }
    }
}

/// Source of agent definitions.
///
/// Backed by an in-memory list today; a remote EvoAgentX client can
/// implement the same trait.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    async fn list_agents(&self) -> Vec<Agent>;

    async fn get_agent(&self, id: &str) -> Option<Agent> {
        self.list_agents().await.into_iter().find(|a| a.id == id)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

pub struct InMemoryAgentRegistry {
    agents: RwLock<Vec<Agent>>,
}

impl InMemoryAgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents: RwLock::new(agents),
        }
    }

    /// Registry seeded with the built-in VaultPilot agents.
    pub fn with_defaults() -> Self {
        Self::new(default_agents())
    }

    pub fn insert(&self, agent: Agent) {
        self.agents.write().push(agent);
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn list_agents(&self) -> Vec<Agent> {
        self.agents.read().clone()
    }
}

fn default_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "VaultPilot Copilot",
            "Intelligent writing assistant and knowledge management copilot",
            &[
                "auto_completion",
                "writing_assistance",
                "note_linking",
                "content_analysis",
                "knowledge_synthesis",
            ],
        ),
        Agent::new(
            "Research Assistant",
            "Specialized agent for research tasks, literature review, and analysis",
            &[
                "research_synthesis",
                "literature_review",
                "source_analysis",
                "fact_checking",
                "citation_management",
            ],
        ),
        Agent::new(
            "Organization Expert",
            "Vault organization and structure optimization specialist",
            &[
                "vault_analysis",
                "structure_optimization",
                "template_creation",
                "workflow_design",
                "productivity_improvement",
            ],
        ),
        Agent::new(
            "Creative Writing Assistant",
            "Specialized agent for creative writing, storytelling, and narrative development",
            &[
                "creative_writing",
                "story_development",
                "character_creation",
                "plot_assistance",
                "style_improvement",
            ],
        ),
    ]
}
