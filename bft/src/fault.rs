//! Fault detection: vote-history tracking for inconsistency, equivocation,
//! conflicting-result and timeout fault construction.

use crate::config::BftConfig;
use loki_contracts::{FaultKind, FaultRecord};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

fn fault_id() -> String {
    format!("fault-{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// SHA-256 of the value's canonical JSON text, truncated to 16 hex chars —
/// enough to compare equality cheaply without storing full results.
pub fn hash_value(value: &serde_json::Value) -> String {
    let text = serde_json::to_string(value).unwrap_or_default();
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Per-agent vote history: `(proposal_id, vote)` pairs, ring-bounded to
/// twice the consistency window before trimming.
#[derive(Default)]
pub struct VoteHistory {
    by_agent: RwLock<HashMap<String, VecDeque<(String, String)>>>,
}

impl VoteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `vote` against the agent's recent votes on `proposal_id`; if
    /// consistent, records it. Returns a fault on the first conflict found
    /// and does not record the inconsistent vote.
    pub fn check_and_record(&self, config: &BftConfig, agent_id: &str, proposal_id: &str, vote: &str) -> Option<FaultRecord> {
        let mut guard = self.by_agent.write();
        let history = guard.entry(agent_id.to_string()).or_default();

        let window = config.vote_consistency_window.min(history.len());
        for (past_proposal, past_vote) in history.iter().rev().take(window) {
            if past_proposal == proposal_id && past_vote != vote {
                return Some(FaultRecord {
                    id: fault_id(),
                    agent_id: agent_id.to_string(),
                    kind: FaultKind::InconsistentVote,
                    severity: config.inconsistency_penalty,
                    description: format!("agent voted '{vote}' after previously voting '{past_vote}' on same proposal"),
                    evidence: [
                        ("proposal_id".to_string(), serde_json::json!(proposal_id)),
                        ("original_vote".to_string(), serde_json::json!(past_vote)),
                        ("new_vote".to_string(), serde_json::json!(vote)),
                    ]
                    .into_iter()
                    .collect(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }

        history.push_back((proposal_id.to_string(), vote.to_string()));
        let cap = config.vote_consistency_window * 2;
        while history.len() > cap {
            history.pop_front();
        }
        None
    }
}

/// Detects an agent sending messages with more than one distinct hash to
/// different recipients.
pub fn detect_equivocation(config: &BftConfig, agent_id: &str, messages: &[(String, String)]) -> Option<FaultRecord> {
    if messages.len() < 2 {
        return None;
    }
    let hashes: std::collections::HashSet<&str> = messages.iter().map(|(_, hash)| hash.as_str()).collect();
    if hashes.len() <= 1 {
        return None;
    }
    Some(FaultRecord {
        id: fault_id(),
        agent_id: agent_id.to_string(),
        kind: FaultKind::Equivocation,
        severity: config.equivocation_penalty,
        description: "agent sent different messages to different recipients".to_string(),
        evidence: [
            ("message_hashes".to_string(), serde_json::json!(hashes.into_iter().collect::<Vec<_>>())),
            ("recipients".to_string(), serde_json::json!(messages.iter().map(|(r, _)| r.clone()).collect::<Vec<_>>())),
        ]
        .into_iter()
        .collect(),
        timestamp: chrono::Utc::now(),
    })
}

/// Detects an agent's reported result hashing differently from the
/// consensus result.
pub fn detect_result_conflict(config: &BftConfig, agent_id: &str, agent_result: &serde_json::Value, consensus_result: &serde_json::Value, proposal_id: &str) -> Option<FaultRecord> {
    let agent_hash = hash_value(agent_result);
    let consensus_hash = hash_value(consensus_result);
    if agent_hash == consensus_hash {
        return None;
    }
    Some(FaultRecord {
        id: fault_id(),
        agent_id: agent_id.to_string(),
        kind: FaultKind::ConflictingResult,
        severity: config.inconsistency_penalty,
        description: "agent's result differs from consensus".to_string(),
        evidence: [
            ("proposal_id".to_string(), serde_json::json!(proposal_id)),
            ("agent_result_hash".to_string(), serde_json::json!(agent_hash)),
            ("consensus_result_hash".to_string(), serde_json::json!(consensus_hash)),
        ]
        .into_iter()
        .collect(),
        timestamp: chrono::Utc::now(),
    })
}

/// Builds a `Timeout` fault for an agent that missed a round deadline.
pub fn timeout_fault(config: &BftConfig, agent_id: &str, proposal_id: &str, timeout_seconds: f64) -> FaultRecord {
    FaultRecord {
        id: fault_id(),
        agent_id: agent_id.to_string(),
        kind: FaultKind::Timeout,
        severity: config.timeout_penalty,
        description: format!("agent did not respond within {timeout_seconds}s deadline"),
        evidence: [
            ("proposal_id".to_string(), serde_json::json!(proposal_id)),
            ("timeout_seconds".to_string(), serde_json::json!(timeout_seconds)),
        ]
        .into_iter()
        .collect(),
        timestamp: chrono::Utc::now(),
    }
}
