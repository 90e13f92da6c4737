//! The Reason -> Act -> Review -> Verify loop: pulls a task, asks memory
//! for context, dispatches to the owning agent, runs it past the council
//! and BFT consensus, and periodically consults the adjuster and the
//! checklist verifier.

use crate::config::OrchestratorConfig;
use crate::control;
use crate::dashboard::{self, DashboardState, SharedDashboardState};
use crate::events::{EventSink, EventType};
use crate::executor::{AgentExecutor, ExecutorError};
use crate::queue::TaskQueue;
use loki_bft::{Bft, BftConfig};
use loki_contracts::{Agent, AgentStatus, Classification, Episode, Outcome, TaskItem, TaskStatus, VoteChoice};
use loki_council::Council;
use loki_performance::PerformanceTracker;
use loki_retrieval::candidates::VectorContext;
use loki_retrieval::{RetrievalContext, RetrievedItem};
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{OrchestratorError, OrchestratorResult};

const SYCOPHANCY_TO_EVIDENCE_SEVERITY: f64 = 0.7;

fn agent_from_composed(composed: &loki_composer::ComposedAgent) -> Agent {
    Agent {
        id: composed.agent_type.clone(),
        agent_type: composed.agent_type.clone(),
        role: composed.role.clone(),
        priority: composed.priority,
        capabilities: HashMap::new(),
        status: AgentStatus::Idle,
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    memory: loki_memory::MemoryStore,
    performance: PerformanceTracker,
    council: Council,
    bft: Bft,
    queue: TaskQueue,
    events: EventSink,
    dashboard_state: SharedDashboardState,
    executor: Arc<dyn AgentExecutor>,
    team: Vec<Agent>,
    classification: Classification,
    completed_iterations: u64,
    approvals: u64,
    reviews_run: u64,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, prd_text: &str, executor: Box<dyn AgentExecutor>) -> OrchestratorResult<(Self, tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>, tokio::sync::watch::Sender<bool>)> {
        std::fs::create_dir_all(&config.loki_dir).map_err(|source| OrchestratorError::Io { path: config.loki_dir.display().to_string(), source })?;

        let memory = loki_memory::MemoryStore::new(config.loki_dir.join("memory"))?;
        let performance = PerformanceTracker::new(config.loki_dir.join("agent-performance.json"))?;
        let council = Council::new(&config.loki_dir)?;
        let bft = Bft::new(&config.loki_dir, BftConfig::default(), config.bft_secret_key.as_bytes().to_vec())?;
        let queue = TaskQueue::new(&config.loki_dir)?;
        let (events, events_handle) = EventSink::spawn(crate::events::events_file(&config.loki_dir));

        let classification = loki_classifier::classify(prd_text);
        let composition = loki_composer::compose(&classification, &[], Some(&performance));
        let team: Vec<Agent> = composition.agents.iter().map(agent_from_composed).collect();

        let dashboard_state: SharedDashboardState = Arc::new(RwLock::new(DashboardState {
            phase: "initialized".to_string(),
            complexity: Some(classification.tier),
            agents: team.iter().map(|a| a.agent_type.clone()).collect(),
            ..Default::default()
        }));

        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        let dashboard_handle = dashboard::spawn(
            dashboard::dashboard_path(&config.loki_dir),
            dashboard_state.clone(),
            Duration::from_millis(config.dashboard_interval_ms),
            stop_rx,
        );

        let orchestrator = Self {
            config,
            memory,
            performance,
            council,
            bft,
            queue,
            events,
            dashboard_state,
            executor: Arc::from(executor),
            team,
            classification,
            completed_iterations: 0,
            approvals: 0,
            reviews_run: 0,
        };
        Ok((orchestrator, events_handle, dashboard_handle, stop_tx))
    }

    pub fn enqueue_task(&self, task: &TaskItem) -> OrchestratorResult<()> {
        self.queue.enqueue(task)
    }

    /// Runs the RARV loop until a stop file appears or `max_iterations`
    /// completed iterations have elapsed. `shutdown` is signalled on return
    /// so the dashboard writer flushes a final snapshot and exits.
    pub async fn run(&mut self, shutdown: tokio::sync::watch::Sender<bool>) -> OrchestratorResult<()> {
        self.events.emit(EventType::SessionStart, json!({"tier": self.classification.tier.as_str(), "agents": self.team.len()})).await;

        loop {
            if control::is_stop_requested(&self.config.loki_dir) {
                self.events.emit(EventType::SessionStop, json!({"iteration": self.completed_iterations})).await;
                break;
            }

            if control::is_paused(&self.config.loki_dir) {
                self.events.emit(EventType::SessionPause, json!({})).await;
                tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                continue;
            }

            if let Some(max) = self.config.max_iterations {
                if self.completed_iterations >= max {
                    break;
                }
            }

            match self.queue.pop_next_pending()? {
                None => {
                    tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                    continue;
                }
                Some(task) => {
                    self.run_task(task).await?;
                    self.completed_iterations += 1;
                }
            }

            if self.completed_iterations % self.config.adjust_every.max(1) == 0 {
                self.maybe_adjust().await?;
            }
            if self.completed_iterations % self.config.checklist_every.max(1) == 0 {
                self.maybe_verify_checklist().await?;
            }

            self.refresh_dashboard()?;
        }

        let _ = shutdown.send(true);
        Ok(())
    }

    async fn run_task(&mut self, mut task: TaskItem) -> OrchestratorResult<()> {
        self.events.emit(EventType::TaskStarted, json!({"task_id": task.id, "title": task.title})).await;

        let ctx = RetrievalContext {
            goal: task.title.clone(),
            action_type: task.payload.action.clone(),
            phase: task.task_type.clone(),
            files: Vec::new(),
        };
        let mut vectors = VectorContext::default();
        let items = loki_retrieval::retrieve_task_aware(&self.memory, &ctx, self.config.retrieval_top_k, Some(self.config.retrieval_token_budget), &mut vectors)?;

        let owning_agent = self.team.first().cloned().unwrap_or_else(|| Agent {
            id: "eng-general".to_string(),
            agent_type: "eng-general".to_string(),
            role: "general".to_string(),
            priority: 1,
            capabilities: HashMap::new(),
            status: AgentStatus::Idle,
        });

        let started_at = Instant::now();
        let exec_result = self.dispatch_with_retry(&owning_agent, task.title.clone(), items).await;

        let elapsed = started_at.elapsed().as_secs_f64();

        let result = match exec_result {
            Ok(result) => result,
            Err(e) => {
                self.queue.transition(&mut task, TaskStatus::Failed)?;
                self.events.emit(EventType::TaskFailed, json!({"task_id": task.id, "reason": executor_error_message(&e)})).await;
                return Ok(());
            }
        };

        let reviewer_agents: Vec<&Agent> = self.team.iter().filter(|a| a.id != owning_agent.id).collect();
        let votes: Vec<loki_contracts::CouncilVote> = reviewer_agents
            .iter()
            .map(|reviewer| derive_reviewer_vote(reviewer, &result))
            .collect();
        let all_ids: Vec<String> = self.team.iter().map(|a| a.id.clone()).collect();

        self.reviews_run += 1;
        let decision = self.council.decide_with_bft(&self.bft, &all_ids, &votes)?;

        for fault in &decision.faults_detected {
            self.events.emit(EventType::FaultDetected, json!({"agent_id": fault.agent_id, "kind": format!("{:?}", fault.kind), "severity": fault.severity})).await;
        }

        match decision.verdict {
            VoteChoice::Approve if !decision.inconclusive => {
                self.approvals += 1;
                let outcome = self.bft.run_consensus(&task.id, json!("approve"), &all_ids, Some(&owning_agent.id), None)?;

                if outcome.consensus_reached {
                    self.queue.transition(&mut task, TaskStatus::Completed)?;

                    let now = chrono::Utc::now();
                    let mut episode = Episode {
                        id: String::new(),
                        timestamp: now,
                        actor: owning_agent.id.clone(),
                        phase: task.task_type.clone(),
                        goal: task.title.clone(),
                        actions: vec![result.content.clone()],
                        errors: Vec::new(),
                        outcome: Outcome::Success,
                        tokens_used: 0,
                        files_read: Vec::new(),
                        files_modified: result.files_modified.clone(),
                        importance: result.quality_score.clamp(0.0, 1.0),
                        access_count: 0,
                        last_accessed: now,
                    };
                    self.memory.save_episode(&mut episode)?;

                    for id in &outcome.participating_agents {
                        self.bft.update_reputation(id, true, None)?;
                    }
                    self.performance.record_task_completion(&owning_agent.agent_type, result.quality_score, elapsed);
                    self.performance.save()?;

                    self.events.emit(EventType::ConsensusReached, json!({"task_id": task.id})).await;
                    self.events.emit(EventType::TaskCompleted, json!({"task_id": task.id, "quality": result.quality_score})).await;
                } else {
                    self.queue.transition(&mut task, TaskStatus::Review)?;
                    self.events.emit(EventType::ConsensusFailed, json!({"task_id": task.id})).await;
                }
            }
            _ => {
                let severity = votes.iter().flat_map(|v| v.issues.iter()).map(|issue| issue.severity).fold(0.0_f64, f64::max);
                let next = if severity >= SYCOPHANCY_TO_EVIDENCE_SEVERITY || decision.inconclusive {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Review
                };
                self.queue.transition(&mut task, next)?;
                self.events.emit(EventType::TaskFailed, json!({"task_id": task.id, "verdict": format!("{:?}", decision.verdict), "rationale": decision.rationale})).await;
            }
        }

        Ok(())
    }

    /// Wraps the agent dispatch call in a short retry-with-backoff so a
    /// transient failure (a flaky subprocess, a dropped connection) doesn't
    /// sink the whole task on the first attempt.
    async fn dispatch_with_retry(&self, agent: &Agent, goal: String, items: Vec<RetrievedItem>) -> Result<crate::executor::AgentExecutionResult, ExecutorError> {
        let retry_config = loki_resilience::RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            use_exponential_backoff: true,
            use_jitter: true,
        };
        let executor = self.executor.clone();
        let agent_id = agent.id.clone();
        let agent = agent.clone();

        loki_resilience::retry(
            move || -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<crate::executor::AgentExecutionResult, ExecutorError>> + Send>> {
                let executor = executor.clone();
                let agent = agent.clone();
                let goal = goal.clone();
                let items = items.clone();
                Box::pin(async move { executor.execute(&agent, &goal, &items).await })
            },
            retry_config,
        )
        .await
        .map_err(|e| ExecutorError::Failed { agent_id, message: e.to_string() })
    }

    async fn maybe_adjust(&mut self) -> OrchestratorResult<()> {
        let counts = self.queue.counts()?;
        let total_reviewed = self.reviews_run.max(1) as f64;
        let signals = loki_adjuster::QualitySignals {
            gate_pass_rate: if counts.completed + counts.failed > 0 { counts.completed as f64 / (counts.completed + counts.failed) as f64 } else { 1.0 },
            test_coverage: 1.0,
            review_pass_rate: self.approvals as f64 / total_reviewed,
            iteration_count: self.completed_iterations as u32,
            failed_gates: Vec::new(),
        };

        let plan = loki_adjuster::evaluate_adjustment(&self.team, &signals);
        if plan.action == loki_adjuster::AdjustmentAction::None {
            return Ok(());
        }

        for change in &plan.agents_to_add {
            if !self.team.iter().any(|a| a.agent_type == change.agent_type) {
                self.team.push(Agent {
                    id: change.agent_type.clone(),
                    agent_type: change.agent_type.clone(),
                    role: change.agent_type.clone(),
                    priority: 2,
                    capabilities: HashMap::new(),
                    status: AgentStatus::Idle,
                });
                self.events.emit(EventType::AgentAdded, json!({"agent_type": change.agent_type, "reason": change.reason})).await;
            }
        }
        for change in &plan.agents_to_remove {
            if let Some(pos) = self.team.iter().position(|a| a.agent_type == change.agent_type) {
                self.team.remove(pos);
                self.events.emit(EventType::AgentRemoved, json!({"agent_type": change.agent_type, "reason": change.reason})).await;
            }
        }

        Ok(())
    }

    async fn maybe_verify_checklist(&mut self) -> OrchestratorResult<()> {
        let checklist_path = self.config.project_dir.join(".loki").join("checklist.json");
        if !checklist_path.is_file() {
            return Ok(());
        }

        let verifier = loki_checklist::Verifier::new(&checklist_path, &self.config.project_dir);
        let results = verifier.verify().await?;

        self.events.emit(EventType::ChecklistVerified, json!({"total": results.summary.total, "verified": results.summary.verified, "failing": results.summary.failing, "pending": results.summary.pending})).await;

        if results.summary.total > 0 && results.summary.failing == 0 && results.summary.pending == 0 {
            self.events.emit(EventType::SessionComplete, json!({"iteration": self.completed_iterations})).await;
        }

        Ok(())
    }

    fn refresh_dashboard(&self) -> OrchestratorResult<()> {
        let counts = self.queue.counts()?;
        let mut state = self.dashboard_state.write();
        state.phase = "running".to_string();
        state.iteration = self.completed_iterations;
        state.complexity = Some(self.classification.tier);
        state.agents = self.team.iter().map(|a| a.agent_type.clone()).collect();
        state.tasks = counts;
        Ok(())
    }
}

fn executor_error_message(error: &ExecutorError) -> String {
    match error {
        ExecutorError::Failed { message, .. } => message.clone(),
        ExecutorError::TimedOut { timeout_seconds, .. } => format!("timed out after {timeout_seconds}s"),
    }
}

/// Derives a reviewer's vote deterministically from the owning agent's own
/// self-reported quality: a real deployment replaces this with an
/// independent review call, but the council/BFT machinery downstream
/// doesn't care how a vote was produced.
fn derive_reviewer_vote(reviewer: &Agent, result: &crate::executor::AgentExecutionResult) -> loki_contracts::CouncilVote {
    const APPROVAL_FLOOR: f64 = 0.6;
    let verdict = if result.quality_score >= APPROVAL_FLOOR { VoteChoice::Approve } else { VoteChoice::Reject };
    let issues = if result.quality_score < APPROVAL_FLOOR {
        vec![loki_contracts::VoteIssue { severity: 1.0 - result.quality_score, description: format!("quality score {:.2} below approval floor", result.quality_score) }]
    } else {
        Vec::new()
    };
    loki_contracts::CouncilVote {
        reviewer_id: reviewer.id.clone(),
        verdict,
        confidence: result.confidence,
        reasoning: result.rationale.clone(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DeterministicExecutor;
    use loki_contracts::TaskPayload;

    fn sample_task(id: &str) -> TaskItem {
        let now = chrono::Utc::now();
        TaskItem {
            id: id.to_string(),
            task_type: "implementation".to_string(),
            title: "implement the login flow end to end".to_string(),
            payload: TaskPayload { action: "write_code".to_string(), priority: 1, description: "login flow".to_string() },
            status: TaskStatus::Pending,
            position: 0,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn single_task_runs_to_completion_or_review() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = OrchestratorConfig::default();
        config.loki_dir = dir.path().join(".loki");
        config.project_dir = dir.path().to_path_buf();
        config.max_iterations = Some(1);
        config.poll_interval_ms = 10;

        let (mut orchestrator, events_handle, _dashboard_handle, shutdown) = Orchestrator::new(config, "Build a simple login form.", Box::new(DeterministicExecutor)).unwrap();
        orchestrator.enqueue_task(&sample_task("t1")).unwrap();

        orchestrator.run(shutdown).await.unwrap();
        drop(orchestrator);
        let _ = events_handle.await;
    }
}
