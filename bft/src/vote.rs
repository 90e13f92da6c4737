//! Raw reputation-weighted voting, separate from the council's calibration-
//! weighted aggregation — used when the orchestrator asks the BFT layer to
//! ratify a verdict directly across participating agents.

use crate::config::BftConfig;
use crate::error::BftResult;
use crate::fault::VoteHistory;
use crate::reputation::ReputationStore;
use loki_contracts::{FaultRecord, VoteChoice};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Vote {
    pub voter_id: String,
    pub choice: VoteChoice,
    pub confidence: f64,
}

fn choice_str(choice: VoteChoice) -> &'static str {
    match choice {
        VoteChoice::Approve => "approve",
        VoteChoice::Reject => "reject",
        VoteChoice::Abstain => "abstain",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VoteOutcome {
    pub winner: VoteChoice,
    pub vote_weights: HashMap<String, f64>,
    pub total_weight: f64,
    pub eligible_voters: usize,
    pub excluded_voters: Vec<String>,
    pub weighted_by_reputation: bool,
    pub faults_detected: Vec<FaultRecord>,
}

/// Tallies `votes` into a winning [`VoteChoice`], weighting each by
/// `confidence * reputation_score` (or just confidence when unweighted),
/// after dropping excluded/low-reputation voters and any vote that
/// contradicts the voter's own earlier vote on `proposal_id`.
pub fn bft_vote(config: &BftConfig, reputations: &ReputationStore, vote_history: &VoteHistory, proposal_id: &str, votes: &[Vote], weighted_by_reputation: bool) -> BftResult<VoteOutcome> {
    if votes.is_empty() {
        return Ok(VoteOutcome { winner: VoteChoice::Abstain, vote_weights: HashMap::new(), total_weight: 0.0, eligible_voters: 0, excluded_voters: vec![], weighted_by_reputation, faults_detected: vec![] });
    }

    let mut eligible_votes = Vec::new();
    let mut excluded_voters = Vec::new();
    let mut faults_detected = Vec::new();

    for vote in votes {
        let rep = reputations.get(&vote.voter_id);
        if rep.is_excluded || rep.score < config.min_reputation_for_consensus {
            excluded_voters.push(vote.voter_id.clone());
            continue;
        }
        if let Some(fault) = vote_history.check_and_record(config, &vote.voter_id, proposal_id, choice_str(vote.choice)) {
            reputations.update(config, &vote.voter_id, false, Some(fault.clone()))?;
            faults_detected.push(fault);
            excluded_voters.push(vote.voter_id.clone());
            continue;
        }
        eligible_votes.push((vote.clone(), rep));
    }

    if eligible_votes.is_empty() {
        return Ok(VoteOutcome { winner: VoteChoice::Abstain, vote_weights: HashMap::new(), total_weight: 0.0, eligible_voters: 0, excluded_voters, weighted_by_reputation, faults_detected });
    }

    let order = [VoteChoice::Approve, VoteChoice::Reject, VoteChoice::Abstain];
    let mut weights: HashMap<&'static str, f64> = order.iter().map(|c| (choice_str(*c), 0.0)).collect();

    for (vote, rep) in &eligible_votes {
        let weight = if weighted_by_reputation { vote.confidence * rep.score } else { vote.confidence };
        *weights.get_mut(choice_str(vote.choice)).expect("all choices pre-seeded") += weight;
    }

    for (vote, _) in &eligible_votes {
        reputations.update(config, &vote.voter_id, true, None)?;
    }

    let total_weight: f64 = weights.values().sum();
    let winner = if total_weight == 0.0 {
        VoteChoice::Abstain
    } else {
        // fold instead of Iterator::max_by: max_by keeps the *last* maximum on
        // a tie, but ties must favour whichever choice is reached first
        // (Approve, then Reject, then Abstain).
        let mut best = order[0];
        let mut best_weight = weights[choice_str(best)];
        for choice in &order[1..] {
            let w = weights[choice_str(*choice)];
            if w > best_weight {
                best = *choice;
                best_weight = w;
            }
        }
        best
    };

    Ok(VoteOutcome {
        winner,
        vote_weights: weights.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        total_weight,
        eligible_voters: eligible_votes.len(),
        excluded_voters,
        weighted_by_reputation,
        faults_detected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_votes_abstains() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let history = VoteHistory::new();
        let config = BftConfig::default();
        let outcome = bft_vote(&config, &reps, &history, "prop-1", &[], true).unwrap();
        assert_eq!(outcome.winner, VoteChoice::Abstain);
    }

    #[test]
    fn reputation_weighted_majority_wins() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let history = VoteHistory::new();
        let config = BftConfig::default();
        let votes = vec![
            Vote { voter_id: "a".into(), choice: VoteChoice::Approve, confidence: 0.9 },
            Vote { voter_id: "b".into(), choice: VoteChoice::Approve, confidence: 0.8 },
            Vote { voter_id: "c".into(), choice: VoteChoice::Reject, confidence: 0.95 },
        ];
        let outcome = bft_vote(&config, &reps, &history, "prop-1", &votes, true).unwrap();
        assert_eq!(outcome.winner, VoteChoice::Approve);
        assert_eq!(outcome.eligible_voters, 3);
    }

    #[test]
    fn inconsistent_vote_excludes_voter() {
        let dir = tempfile::tempdir().unwrap();
        let reps = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let history = VoteHistory::new();
        let config = BftConfig::default();
        history.check_and_record(&config, "a", "prop-1", "approve");
        let votes = vec![Vote { voter_id: "a".into(), choice: VoteChoice::Reject, confidence: 0.9 }];
        let outcome = bft_vote(&config, &reps, &history, "prop-1", &votes, true).unwrap();
        assert_eq!(outcome.eligible_voters, 0);
        assert!(outcome.excluded_voters.contains(&"a".to_string()));
    }
}
