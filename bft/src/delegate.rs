//! BFT-aware delegation: scores eligible, idle candidates by reputation and
//! required-capability match, returning the best plus up to two fallbacks.

use crate::config::BftConfig;
use crate::reputation::ReputationStore;
use loki_contracts::{Agent, AgentStatus};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct DelegationOutcome {
    pub delegate_id: Option<String>,
    pub delegate_score: Option<f64>,
    pub candidates_evaluated: usize,
    pub eligible_candidates: usize,
    pub fallbacks: Vec<String>,
}

fn capability_score(agent: &Agent, required_capabilities: &[String]) -> f64 {
    if required_capabilities.is_empty() {
        return 0.5;
    }
    let (sum, matched) = required_capabilities.iter().fold((0.0, 0u32), |(sum, matched), cap_name| match agent.capabilities.get(cap_name) {
        Some(proficiency) => (sum + proficiency, matched + 1),
        None => (sum, matched),
    });
    if matched > 0 {
        sum / matched as f64
    } else {
        0.5
    }
}

/// `0.6 * reputation + 0.4 * capability_score`, restricted to agents that
/// are neither excluded, below `min_reputation`, nor busy.
pub fn bft_delegate(config: &BftConfig, reputations: &ReputationStore, required_capabilities: &[String], candidates: &[Agent], min_reputation: Option<f64>) -> DelegationOutcome {
    let min_rep = min_reputation.unwrap_or(config.min_reputation_for_consensus);

    let mut scored: Vec<(String, f64)> = candidates
        .iter()
        .filter_map(|agent| {
            let rep = reputations.get(&agent.id);
            if rep.is_excluded || rep.score < min_rep {
                return None;
            }
            if !matches!(agent.status, AgentStatus::Idle | AgentStatus::Waiting) {
                return None;
            }
            let combined = rep.score * 0.6 + capability_score(agent, required_capabilities) * 0.4;
            Some((agent.id.clone(), combined))
        })
        .collect();

    if scored.is_empty() {
        return DelegationOutcome { delegate_id: None, delegate_score: None, candidates_evaluated: candidates.len(), eligible_candidates: 0, fallbacks: vec![] };
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (delegate_id, delegate_score) = scored[0].clone();
    let fallbacks = scored[1..].iter().take(2).map(|(id, _)| id.clone()).collect();

    DelegationOutcome { delegate_id: Some(delegate_id), delegate_score: Some(delegate_score), candidates_evaluated: candidates.len(), eligible_candidates: scored.len(), fallbacks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn agent(id: &str, status: AgentStatus, capabilities: &[(&str, f64)]) -> Agent {
        Agent { id: id.into(), agent_type: "eng-backend".into(), role: "engineer".into(), priority: 1, capabilities: capabilities.iter().map(|(k, v)| (k.to_string(), *v)).collect(), status }
    }

    #[test]
    fn prefers_higher_combined_score() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        let candidates = vec![agent("strong", AgentStatus::Idle, &[("rust", 0.9)]), agent("weak", AgentStatus::Idle, &[("rust", 0.3)])];
        let outcome = bft_delegate(&config, &reps, &["rust".to_string()], &candidates, None);
        assert_eq!(outcome.delegate_id, Some("strong".to_string()));
        assert_eq!(outcome.fallbacks, vec!["weak".to_string()]);
    }

    #[test]
    fn busy_agents_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        let candidates = vec![agent("busy", AgentStatus::Busy, &[])];
        let outcome = bft_delegate(&config, &reps, &[], &candidates, None);
        assert_eq!(outcome.delegate_id, None);
    }

    #[test]
    fn no_capability_match_defaults_to_neutral_score() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        let candidates = vec![agent("only", AgentStatus::Idle, &[])];
        let outcome = bft_delegate(&config, &reps, &["go".to_string()], &candidates, None);
        assert_eq!(outcome.delegate_id, Some("only".to_string()));
        assert!((outcome.delegate_score.unwrap() - (1.0 * 0.6 + 0.5 * 0.4)).abs() < 1e-9);
    }
}
