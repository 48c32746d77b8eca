//! Notification helpers for the AI side: workflow progress and chat
//! responses pushed to every client of a vault.

use vaultpilot_common::time::iso_now;

use super::router::MessageRouter;

impl MessageRouter {
    pub async fn notify_workflow_started(&self, vault_id: &str, workflow_id: &str, goal: &str) -> usize {
        self.send_workflow_progress(
            vault_id,
            serde_json::json!({
                "workflow_id": workflow_id,
                "step": "Starting workflow execution",
                "progress": 0.0,
                "status": "running",
                "goal": goal,
            }),
        )
        .await
    }

    /// `progress` is clamped to `0.0..=1.0`.
    pub async fn notify_workflow_step(
        &self,
        vault_id: &str,
        workflow_id: &str,
        step: &str,
        progress: f64,
    ) -> usize {
        self.send_workflow_progress(
            vault_id,
            serde_json::json!({
                "workflow_id": workflow_id,
                "step": step,
                "progress": progress.clamp(0.0, 1.0),
                "status": "running",
            }),
        )
        .await
    }

    pub async fn notify_workflow_completed(&self, vault_id: &str, workflow_id: &str, result: &str) -> usize {
        self.send_workflow_progress(
            vault_id,
            serde_json::json!({
                "workflow_id": workflow_id,
                "step": "Workflow completed successfully",
                "progress": 1.0,
                "status": "completed",
                "result": result,
            }),
        )
        .await
    }

    pub async fn notify_chat_response(
        &self,
        vault_id: &str,
        conversation_id: &str,
        response: &str,
        agent: &str,
    ) -> usize {
        self.send_chat_update(
            vault_id,
            serde_json::json!({
                "conversation_id": conversation_id,
                "response": response,
                "agent": agent,
                "timestamp": iso_now(),
            }),
        )
        .await
    }
}
