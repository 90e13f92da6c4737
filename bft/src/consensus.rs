//! PBFT-lite consensus: PrePrepare (implicit broadcast) → Prepare → Commit
//! → Reply, with quorum `q = 2f+1` for `f = ⌊(n-1)/3⌋` eligible agents.

use crate::config::BftConfig;
use crate::error::BftResult;
use crate::fault::{hash_value, VoteHistory};
use crate::reputation::ReputationStore;
use dashmap::DashMap;
use loki_contracts::{ConsensusPhase, ConsensusRound, FaultRecord};
use serde::Serialize;
use std::collections::HashMap;

const MIN_ELIGIBLE_AGENTS: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusOutcome {
    pub success: bool,
    pub value: serde_json::Value,
    pub consensus_reached: bool,
    pub participating_agents: Vec<String>,
    pub excluded_agents: Vec<String>,
    pub faults_detected: Vec<FaultRecord>,
    pub rounds_completed: u32,
    pub duration_ms: i64,
    pub metadata: HashMap<String, serde_json::Value>,
}

fn fault_tolerance(n: usize) -> usize {
    (n.saturating_sub(1)) / 3
}

fn quorum(n: usize) -> usize {
    (2 * n + 1) / 3
}

/// Runs one round of consensus on `value` among `participants`, rejecting
/// non-eligible participants up front. The primary is the highest-
/// reputation eligible agent unless `primary_id` names an eligible one.
#[allow(clippy::too_many_arguments)]
pub fn run_consensus(
    config: &BftConfig,
    reputations: &ReputationStore,
    vote_history: &VoteHistory,
    active_rounds: &DashMap<String, ConsensusRound>,
    proposal_id: &str,
    value: serde_json::Value,
    participants: &[String],
    primary_id: Option<&str>,
    timeout_seconds: Option<f64>,
) -> BftResult<ConsensusOutcome> {
    let start = chrono::Utc::now();
    let timeout = timeout_seconds.unwrap_or(config.consensus_timeout_seconds);

    let eligible = reputations.eligible(config, participants);
    let excluded: Vec<String> = participants.iter().filter(|p| !eligible.contains(p)).cloned().collect();

    if eligible.len() < MIN_ELIGIBLE_AGENTS {
        return Ok(ConsensusOutcome {
            success: false,
            value,
            consensus_reached: false,
            participating_agents: eligible,
            excluded_agents: excluded,
            faults_detected: vec![],
            rounds_completed: 0,
            duration_ms: 0,
            metadata: [("error".to_string(), serde_json::json!("insufficient eligible agents for BFT (need >= 4)"))].into_iter().collect(),
        });
    }

    let n = eligible.len();
    let f = fault_tolerance(n);
    let q = quorum(n);

    let primary_id = match primary_id.filter(|id| eligible.iter().any(|e| e == id)) {
        Some(id) => id.to_string(),
        None => eligible
            .iter()
            .max_by(|a, b| reputations.get(a).score.partial_cmp(&reputations.get(b).score).unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .expect("eligible is non-empty"),
    };

    let round_id = format!("round-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let mut round = ConsensusRound {
        id: round_id.clone(),
        proposal_id: proposal_id.to_string(),
        phase: ConsensusPhase::PrePrepare,
        primary_id,
        value: value.clone(),
        prepare_votes: HashMap::new(),
        commit_votes: HashMap::new(),
        completed_at: None,
        timeout_seconds: timeout,
        result: None,
    };
    active_rounds.insert(round_id.clone(), round.clone());

    let mut faults_detected = Vec::new();
    let value_hash = hash_value(&value);

    round.phase = ConsensusPhase::Prepare;
    for agent_id in &eligible {
        if let Some(fault) = vote_history.check_and_record(config, agent_id, proposal_id, &value_hash) {
            faults_detected.push(fault.clone());
            reputations.update(config, agent_id, false, Some(fault))?;
            continue;
        }
        round.prepare_votes.insert(agent_id.clone(), value_hash.clone());
        reputations.update(config, agent_id, true, None)?;
    }

    if round.prepare_votes.len() < q {
        active_rounds.remove(&round_id);
        return Ok(ConsensusOutcome {
            success: false,
            value,
            consensus_reached: false,
            participating_agents: round.prepare_votes.keys().cloned().collect(),
            excluded_agents: excluded,
            faults_detected,
            rounds_completed: 1,
            duration_ms: (chrono::Utc::now() - start).num_milliseconds(),
            metadata: [
                ("phase_reached".to_string(), serde_json::json!("prepare")),
                ("prepare_votes".to_string(), serde_json::json!(round.prepare_votes.len())),
                ("quorum_needed".to_string(), serde_json::json!(q)),
            ]
            .into_iter()
            .collect(),
        });
    }

    round.phase = ConsensusPhase::Commit;
    for agent_id in round.prepare_votes.keys().cloned().collect::<Vec<_>>() {
        round.commit_votes.insert(agent_id, value_hash.clone());
    }

    if round.commit_votes.len() < q {
        active_rounds.remove(&round_id);
        return Ok(ConsensusOutcome {
            success: false,
            value,
            consensus_reached: false,
            participating_agents: round.commit_votes.keys().cloned().collect(),
            excluded_agents: excluded,
            faults_detected,
            rounds_completed: 1,
            duration_ms: (chrono::Utc::now() - start).num_milliseconds(),
            metadata: [
                ("phase_reached".to_string(), serde_json::json!("commit")),
                ("commit_votes".to_string(), serde_json::json!(round.commit_votes.len())),
                ("quorum_needed".to_string(), serde_json::json!(q)),
            ]
            .into_iter()
            .collect(),
        });
    }

    round.phase = ConsensusPhase::Reply;
    round.result = Some(true);
    round.completed_at = Some(chrono::Utc::now());
    active_rounds.remove(&round_id);

    Ok(ConsensusOutcome {
        success: true,
        participating_agents: round.commit_votes.keys().cloned().collect(),
        excluded_agents: excluded,
        faults_detected,
        rounds_completed: 1,
        duration_ms: (chrono::Utc::now() - start).num_milliseconds(),
        metadata: [
            ("total_agents".to_string(), serde_json::json!(n)),
            ("fault_tolerance".to_string(), serde_json::json!(f)),
            ("quorum".to_string(), serde_json::json!(q)),
            ("prepare_votes".to_string(), serde_json::json!(round.prepare_votes.len())),
            ("commit_votes".to_string(), serde_json::json!(round.commit_votes.len())),
        ]
        .into_iter()
        .collect(),
        consensus_reached: true,
        value,
    })
}

/// A round active past its deadline is timed out: missing voters (eligible
/// participants who never cast a prepare vote) each get a `Timeout` fault.
pub fn record_timeouts(config: &BftConfig, reputations: &ReputationStore, round: &ConsensusRound, eligible: &[String]) -> BftResult<Vec<FaultRecord>> {
    let mut faults = Vec::new();
    for agent_id in eligible {
        if !round.prepare_votes.contains_key(agent_id) {
            let fault = crate::fault::timeout_fault(config, agent_id, &round.proposal_id, round.timeout_seconds);
            reputations.update(config, agent_id, false, Some(fault.clone()))?;
            faults.push(fault);
        }
    }
    Ok(faults)
}

pub fn is_timed_out(round: &ConsensusRound, created_at: chrono::DateTime<chrono::Utc>) -> bool {
    let elapsed = (chrono::Utc::now() - created_at).num_milliseconds() as f64 / 1000.0;
    elapsed > round.timeout_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &std::path::Path) -> ReputationStore {
        ReputationStore::new(dir.join("rep.json")).unwrap()
    }

    #[test]
    fn fewer_than_four_eligible_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let reps = store(dir.path());
        let config = BftConfig::default();
        let history = VoteHistory::new();
        let active = DashMap::new();
        let participants = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let outcome = run_consensus(&config, &reps, &history, &active, "prop-1", serde_json::json!("x"), &participants, None, None).unwrap();
        assert!(!outcome.success);
        assert!(!outcome.consensus_reached);
    }

    #[test]
    fn four_eligible_agents_reach_consensus() {
        let dir = tempfile::tempdir().unwrap();
        let reps = store(dir.path());
        let config = BftConfig::default();
        let history = VoteHistory::new();
        let active = DashMap::new();
        let participants: Vec<String> = (0..4).map(|i| format!("agent-{i}")).collect();
        let outcome = run_consensus(&config, &reps, &history, &active, "prop-1", serde_json::json!("typescript"), &participants, None, None).unwrap();
        assert!(outcome.success);
        assert!(outcome.consensus_reached);
        assert_eq!(outcome.value, serde_json::json!("typescript"));
        assert_eq!(outcome.participating_agents.len(), 4);
    }

    #[test]
    fn excluded_participant_is_reported_separately() {
        let dir = tempfile::tempdir().unwrap();
        let reps = store(dir.path());
        let config = BftConfig::default();
        let history = VoteHistory::new();
        let active = DashMap::new();

        reps.update(&config, "bad-agent", false, Some(crate::fault::timeout_fault(&config, "bad-agent", "prior", 30.0))).unwrap();
        for _ in 0..2 {
            reps.update(&config, "bad-agent", false, Some(crate::fault::timeout_fault(&config, "bad-agent", "prior", 30.0))).unwrap();
        }

        let mut participants: Vec<String> = (0..4).map(|i| format!("agent-{i}")).collect();
        participants.push("bad-agent".to_string());
        let outcome = run_consensus(&config, &reps, &history, &active, "prop-2", serde_json::json!("v"), &participants, None, None).unwrap();
        assert!(outcome.excluded_agents.contains(&"bad-agent".to_string()));
        assert!(!outcome.participating_agents.contains(&"bad-agent".to_string()));
    }
}
