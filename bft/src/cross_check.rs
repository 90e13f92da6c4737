//! Majority-result verification across independently reporting agents.

use crate::config::BftConfig;
use crate::error::BftResult;
use crate::fault::{detect_result_conflict, hash_value};
use crate::reputation::ReputationStore;
use loki_contracts::FaultRecord;
use std::collections::HashMap;

/// Groups `agent_results` by content hash, picks the majority value as
/// consensus, records a `ConflictingResult` fault (and reputation penalty)
/// against every agent outside that majority, and rewards the majority.
pub fn verify_result(config: &BftConfig, reputations: &ReputationStore, proposal_id: &str, agent_results: &HashMap<String, serde_json::Value>) -> BftResult<(Option<serde_json::Value>, Vec<FaultRecord>)> {
    if agent_results.is_empty() {
        return Ok((None, vec![]));
    }

    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    let mut values: HashMap<String, serde_json::Value> = HashMap::new();
    for (agent_id, result) in agent_results {
        let hash = hash_value(result);
        groups.entry(hash.clone()).or_default().push(agent_id.clone());
        values.entry(hash).or_insert_with(|| result.clone());
    }

    let majority_hash = groups.iter().max_by_key(|(_, agents)| agents.len()).map(|(hash, _)| hash.clone()).expect("agent_results is non-empty");
    let consensus_result = values.get(&majority_hash).cloned().expect("majority hash present in values");

    let mut faults = Vec::new();
    for (hash, agents) in &groups {
        if hash == &majority_hash {
            continue;
        }
        for agent_id in agents {
            if let Some(fault) = detect_result_conflict(config, agent_id, &values[hash], &consensus_result, proposal_id) {
                reputations.update(config, agent_id, false, Some(fault.clone()))?;
                faults.push(fault);
            }
        }
    }
    for agent_id in &groups[&majority_hash] {
        reputations.update(config, agent_id, true, None)?;
    }

    Ok((Some(consensus_result), faults))
}

/// Runs [`verify_result`] and additionally reports whether the agreement
/// ratio (agents matching consensus / total) clears `min_agreement`.
pub fn cross_check_results(config: &BftConfig, reputations: &ReputationStore, proposal_id: &str, results: &[(String, serde_json::Value)], min_agreement: f64) -> BftResult<(bool, Option<serde_json::Value>, Vec<FaultRecord>)> {
    if results.is_empty() {
        return Ok((false, None, vec![]));
    }

    let agent_results: HashMap<String, serde_json::Value> = results.iter().cloned().collect();
    let (consensus_result, faults) = verify_result(config, reputations, proposal_id, &agent_results)?;

    let consensus_hash = consensus_result.as_ref().map(hash_value);
    let agreement_count = results.iter().filter(|(_, r)| Some(hash_value(r)) == consensus_hash).count();
    let agreement_ratio = agreement_count as f64 / results.len() as f64;

    if agreement_ratio >= min_agreement {
        Ok((true, consensus_result, faults))
    } else {
        Ok((false, None, faults))
    }
}

pub const DEFAULT_MIN_AGREEMENT: f64 = 0.67;
