//! Calibration-weighted vote aggregation with sycophancy detection, run
//! after C7 eligibility filtering has already excluded untrustworthy
//! reviewers.

use crate::calibration::CalibrationTracker;
use crate::sycophancy::{classify_sycophancy, detect_sycophancy, SycophancyClass};
use loki_contracts::{CouncilVote, FaultKind, FaultRecord, VoteChoice};
use std::collections::HashMap;

/// Penalty recorded against a reviewer whose vote contributed to a
/// sycophantic round — not a BFT exclusion trigger on its own, just a
/// signal the orchestrator can feed back into reputation if it chooses.
pub const SYCOPHANCY_FAULT_SEVERITY: f64 = 0.3;

#[derive(Debug, Clone, serde::Serialize)]
pub struct CouncilDecision {
    pub verdict: VoteChoice,
    pub sycophancy_score: f64,
    pub sycophancy_classification: &'static str,
    pub rationale: String,
    pub vote_weights: HashMap<String, f64>,
    pub excluded_reviewers: Vec<String>,
    pub inconclusive: bool,
    pub faults_detected: Vec<FaultRecord>,
}

fn choice_str(choice: VoteChoice) -> &'static str {
    match choice {
        VoteChoice::Approve => "approve",
        VoteChoice::Reject => "reject",
        VoteChoice::Abstain => "abstain",
    }
}

fn fault_id() -> String {
    format!("fault-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Aggregates `votes` into a single verdict. Votes from reviewers not in
/// `eligible_reviewer_ids` (the BFT eligibility snapshot) are dropped
/// before tallying. Weight = `confidence * calibration_weight(reviewer)`.
/// When the round's sycophancy classification reaches `moderate` or
/// above, every agreeing reviewer is faulted and the round is marked
/// inconclusive rather than trusted outright.
pub fn decide(calibration: &CalibrationTracker, eligible_reviewer_ids: &[String], votes: &[CouncilVote]) -> CouncilDecision {
    let eligible_set: std::collections::HashSet<&String> = eligible_reviewer_ids.iter().collect();
    let mut excluded_reviewers = Vec::new();
    let mut eligible_votes = Vec::new();

    for vote in votes {
        if eligible_set.contains(&vote.reviewer_id) {
            eligible_votes.push(vote);
        } else {
            excluded_reviewers.push(vote.reviewer_id.clone());
        }
    }

    let sycophancy_score = detect_sycophancy(&eligible_votes.iter().map(|v| (*v).clone()).collect::<Vec<_>>());
    let classification = classify_sycophancy(sycophancy_score);

    if eligible_votes.is_empty() {
        return CouncilDecision {
            verdict: VoteChoice::Abstain,
            sycophancy_score,
            sycophancy_classification: classification.as_str(),
            rationale: "no eligible reviewers cast a vote".to_string(),
            vote_weights: HashMap::new(),
            excluded_reviewers,
            inconclusive: true,
            faults_detected: vec![],
        };
    }

    let order = [VoteChoice::Approve, VoteChoice::Reject, VoteChoice::Abstain];
    let mut weights: HashMap<&'static str, f64> = order.iter().map(|c| (choice_str(*c), 0.0)).collect();
    let mut per_reviewer_weight = HashMap::new();

    for vote in &eligible_votes {
        let calibration_weight = calibration.get_weighted_vote(&vote.reviewer_id);
        let weight = vote.confidence * calibration_weight;
        *weights.get_mut(choice_str(vote.verdict)).expect("all choices pre-seeded") += weight;
        per_reviewer_weight.insert(vote.reviewer_id.clone(), weight);
    }

    let mut best = order[0];
    let mut best_weight = weights[choice_str(best)];
    let mut tied = false;
    for choice in &order[1..] {
        let w = weights[choice_str(*choice)];
        if w > best_weight {
            best = *choice;
            best_weight = w;
            tied = false;
        } else if w == best_weight {
            tied = true;
        }
    }
    let verdict = if tied { VoteChoice::Abstain } else { best };

    let mut faults_detected = Vec::new();
    let inconclusive = classification.is_concerning();
    if inconclusive {
        for vote in &eligible_votes {
            if vote.verdict == verdict {
                faults_detected.push(FaultRecord {
                    id: fault_id(),
                    agent_id: vote.reviewer_id.clone(),
                    kind: FaultKind::Sycophantic,
                    severity: SYCOPHANCY_FAULT_SEVERITY,
                    description: format!("reviewer agreed with the round's majority verdict during a {} sycophancy round", classification.as_str()),
                    evidence: [("sycophancy_score".to_string(), serde_json::json!(sycophancy_score))].into_iter().collect(),
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    let rationale = if inconclusive {
        format!(
            "{} reviewers tallied a {:?} verdict, but the round scored {:.2} on sycophancy ({}); marking inconclusive pending a devil's-advocate re-review",
            eligible_votes.len(),
            verdict,
            sycophancy_score,
            classification.as_str()
        )
    } else {
        format!("{} reviewers tallied a {:?} verdict (sycophancy {:.2}, {})", eligible_votes.len(), verdict, sycophancy_score, classification.as_str())
    };

    CouncilDecision {
        verdict,
        sycophancy_score,
        sycophancy_classification: classification.as_str(),
        rationale,
        vote_weights: per_reviewer_weight,
        excluded_reviewers,
        inconclusive,
        faults_detected,
    }
}
