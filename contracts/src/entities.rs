use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Clamp a float into `[lo, hi]`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Outcome of a completed episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

/// A single recorded interaction: what an agent tried, what happened, and
/// how it ended. Immutable except for `importance`, `access_count` and
/// `last_accessed`, which the retrieval and decay paths update in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub phase: String,
    pub goal: String,
    pub actions: Vec<String>,
    pub errors: Vec<String>,
    pub outcome: Outcome,
    pub tokens_used: u64,
    pub files_read: Vec<String>,
    pub files_modified: Vec<String>,
    pub importance: f64,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

/// A generalised approach abstracted from one or more episodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub pattern: String,
    pub category: String,
    pub correct_approach: String,
    pub incorrect_approach: String,
    pub confidence: f64,
    pub source_episodes: Vec<String>,
    pub usage_count: u64,
    pub last_used: DateTime<Utc>,
    pub importance: f64,
}

/// A reusable, ordered procedure with known failure modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub prerequisites: Vec<String>,
    pub steps: Vec<String>,
    pub known_errors: Vec<KnownError>,
    pub exit_criteria: Vec<String>,
    pub importance: f64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownError {
    pub error: String,
    pub fix: String,
}

/// A documented way of failing, kept so future attempts can be steered away
/// from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntiPattern {
    pub id: String,
    pub what_fails: String,
    pub why: String,
    pub prevention: String,
    pub importance: f64,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Review,
    Completed,
    Failed,
}

impl TaskStatus {
    /// True if `next` is a legal transition from `self` per the core's
    /// status invariant (pending -> in_progress -> {review, failed};
    /// review -> {completed, pending}; completed/failed are terminal).
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Review)
                | (InProgress, Failed)
                | (Review, Completed)
                | (Review, Pending)
                | (Review, Failed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPayload {
    pub action: String,
    pub priority: u8,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: String,
    pub task_type: String,
    pub title: String,
    pub payload: TaskPayload,
    pub status: TaskStatus,
    pub position: u32,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Busy,
    Waiting,
    Excluded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub agent_type: String,
    pub role: String,
    pub priority: u8,
    pub capabilities: HashMap<String, f64>,
    pub status: AgentStatus,
}

/// Complexity tier assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Simple,
    Standard,
    Complex,
    Enterprise,
}

impl Tier {
    pub fn recommended_agent_count(self) -> u32 {
        match self {
            Tier::Simple => 3,
            Tier::Standard => 6,
            Tier::Complex => 8,
            Tier::Enterprise => 12,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Simple => "simple",
            Tier::Standard => "standard",
            Tier::Complex => "complex",
            Tier::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "simple" => Some(Tier::Simple),
            "standard" => Some(Tier::Standard),
            "complex" => Some(Tier::Complex),
            "enterprise" => Some(Tier::Enterprise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub tier: Tier,
    pub confidence: f64,
    pub features: HashMap<String, u32>,
    pub agent_count: u32,
    pub override_applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    InconsistentVote,
    Timeout,
    InvalidMessage,
    ConflictingResult,
    Equivocation,
    Malformed,
    Sycophantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaultRecord {
    pub id: String,
    pub agent_id: String,
    pub kind: FaultKind,
    pub severity: f64,
    pub description: String,
    pub evidence: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reputation {
    pub agent_id: String,
    pub score: f64,
    pub total_interactions: u64,
    pub successful_interactions: u64,
    pub faults: Vec<FaultRecord>,
    pub last_updated: DateTime<Utc>,
    pub is_excluded: bool,
    pub exclusion_reason: Option<String>,
}

impl Reputation {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            score: 1.0,
            total_interactions: 0,
            successful_interactions: 0,
            faults: Vec::new(),
            last_updated: Utc::now(),
            is_excluded: false,
            exclusion_reason: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusPhase {
    PrePrepare,
    Prepare,
    Commit,
    Reply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub id: String,
    pub proposal_id: String,
    pub phase: ConsensusPhase,
    pub primary_id: String,
    pub value: serde_json::Value,
    pub prepare_votes: HashMap<String, String>,
    pub commit_votes: HashMap<String, String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub timeout_seconds: f64,
    pub result: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Approve,
    Reject,
    Abstain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteIssue {
    pub severity: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilVote {
    pub reviewer_id: String,
    pub verdict: VoteChoice,
    pub confidence: f64,
    pub reasoning: String,
    pub issues: Vec<VoteIssue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_agent_counts_match_spec() {
        assert_eq!(Tier::Simple.recommended_agent_count(), 3);
        assert_eq!(Tier::Standard.recommended_agent_count(), 6);
        assert_eq!(Tier::Complex.recommended_agent_count(), 8);
        assert_eq!(Tier::Enterprise.recommended_agent_count(), 12);
    }

    #[test]
    fn task_status_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Review.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(1.5, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-0.5, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.4, 0.0, 1.0), 0.4);
    }
}
