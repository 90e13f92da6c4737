//! Agent dispatch as a trait object so the orchestrator's control flow is
//! testable without a real LLM backend. Production wiring supplies a real
//! collaborator (an HTTP client against a model provider, a CLI subprocess
//! wrapper); the crate's own tests use [`DeterministicExecutor`].

use async_trait::async_trait;
use loki_contracts::Agent;
use loki_retrieval::RetrievedItem;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AgentExecutionResult {
    pub content: String,
    pub files_modified: Vec<String>,
    pub rationale: String,
    pub confidence: f64,
    pub quality_score: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("agent {agent_id} failed: {message}")]
    Failed { agent_id: String, message: String },
    #[error("agent {agent_id} timed out after {timeout_seconds}s")]
    TimedOut { agent_id: String, timeout_seconds: f64 },
}

/// One call to an agent: given its identity, the task goal, and retrieved
/// context, produce a result or fail. Implementations own whatever
/// transport (LLM API, subprocess, RPC) actually does the work.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, goal: &str, context: &[RetrievedItem]) -> Result<AgentExecutionResult, ExecutorError>;
}

/// A deterministic stand-in used by the orchestrator's own test suite:
/// quality/confidence derived from the goal's length so tests can assert
/// on predictable outcomes without a real model in the loop.
pub struct DeterministicExecutor;

#[async_trait]
impl AgentExecutor for DeterministicExecutor {
    async fn execute(&self, agent: &Agent, goal: &str, _context: &[RetrievedItem]) -> Result<AgentExecutionResult, ExecutorError> {
        if goal.trim().is_empty() {
            return Err(ExecutorError::Failed { agent_id: agent.id.clone(), message: "empty goal".to_string() });
        }
        let quality = (0.5 + (goal.len() % 5) as f64 / 10.0).min(1.0);
        Ok(AgentExecutionResult {
            content: format!("{} completed: {}", agent.agent_type, goal),
            files_modified: Vec::new(),
            rationale: format!("deterministic stub response from {}", agent.agent_type),
            confidence: quality,
            quality_score: quality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::AgentStatus;
    use std::collections::HashMap;

    fn agent(agent_type: &str) -> Agent {
        Agent { id: format!("{agent_type}-1"), agent_type: agent_type.to_string(), role: "worker".to_string(), priority: 1, capabilities: HashMap::new(), status: AgentStatus::Idle }
    }

    #[tokio::test]
    async fn empty_goal_fails() {
        let executor = DeterministicExecutor;
        let result = executor.execute(&agent("eng-backend"), "", &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn nonempty_goal_succeeds() {
        let executor = DeterministicExecutor;
        let result = executor.execute(&agent("eng-backend"), "implement the thing", &[]).await.unwrap();
        assert!(result.quality_score > 0.0);
    }
}
