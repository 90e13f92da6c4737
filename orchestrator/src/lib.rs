//! The autonomous Reason -> Act -> Review -> Verify orchestration loop.
//!
//! Wires together memory, retrieval, classification, composition, council,
//! BFT consensus, the adjuster, and checklist verification into a single
//! long-running process that pulls tasks from a durable queue, dispatches
//! them to an agent, and drives them to completion or escalation.

pub mod config;
pub mod control;
pub mod dashboard;
pub mod error;
pub mod events;
pub mod executor;
pub mod queue;
pub mod rarv;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use executor::{AgentExecutionResult, AgentExecutor, DeterministicExecutor, ExecutorError};
pub use rarv::Orchestrator;
