//! Council review: calibration-weighted vote aggregation over a BFT
//! eligibility snapshot, with sycophancy (rubber-stamping) detection.
//!
//! ```ignore
//! let council = Council::new(".loki")?;
//! let eligible = bft.get_eligible_agents(&reviewer_ids);
//! let decision = council.decide(&eligible, &votes)?;
//! println!("{:?}: {}", decision.verdict, decision.rationale);
//! ```

pub mod aggregate;
pub mod calibration;
pub mod error;
pub mod sycophancy;

pub use aggregate::CouncilDecision;
pub use calibration::{CalibrationTracker, ReviewerStats, RoundVoteInput};
pub use error::{CouncilError, CouncilResult};
pub use sycophancy::{classify_sycophancy, generate_sycophancy_report, SycophancyClass};

use loki_contracts::{CouncilVote, VoteChoice};
use std::path::{Path, PathBuf};

/// Top-level facade: owns the calibration ledger and runs decisions
/// against a caller-supplied BFT eligibility snapshot.
pub struct Council {
    council_dir: PathBuf,
    calibration: CalibrationTracker,
    iteration: std::sync::atomic::AtomicU64,
}

impl Council {
    pub fn new(loki_dir: impl AsRef<Path>) -> CouncilResult<Self> {
        let council_dir = loki_dir.as_ref().join("council");
        Ok(Self { calibration: CalibrationTracker::new(council_dir.join("calibration.json"))?, council_dir, iteration: std::sync::atomic::AtomicU64::new(0) })
    }

    /// Aggregates `votes` (already restricted to `eligible_reviewer_ids`
    /// by the caller's BFT snapshot) into a verdict, then records the
    /// round for future calibration weighting.
    pub fn decide(&self, eligible_reviewer_ids: &[String], votes: &[CouncilVote]) -> CouncilResult<CouncilDecision> {
        let decision = aggregate::decide(&self.calibration, eligible_reviewer_ids, votes);
        let iteration = self.iteration.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let round_votes: Vec<RoundVoteInput> = votes.iter().map(|v| RoundVoteInput { reviewer_id: v.reviewer_id.clone(), verdict: v.verdict }).collect();
        self.calibration.record_round(iteration, &round_votes, decision.verdict, None)?;
        Ok(decision)
    }

    /// Convenience wrapper over [`Council::decide`] that takes the
    /// eligibility snapshot directly from a [`loki_bft::Bft`] instance
    /// rather than requiring the caller to call `get_eligible_agents`
    /// itself — the council never mutates reputation, only reads it.
    pub fn decide_with_bft(&self, bft: &loki_bft::Bft, reviewer_ids: &[String], votes: &[CouncilVote]) -> CouncilResult<CouncilDecision> {
        let eligible = bft.get_eligible_agents(reviewer_ids);
        self.decide(&eligible, votes)
    }

    /// Feeds back the actual outcome of a past round (e.g. did the
    /// approved change hold up) so reviewer accuracy counters catch up.
    pub fn record_ground_truth(&self, iteration: u64, ground_truth: VoteChoice) -> CouncilResult<()> {
        self.calibration.update_ground_truth(iteration, ground_truth)
    }

    pub fn reviewer_stats(&self, reviewer_id: &str) -> Option<ReviewerStats> {
        self.calibration.get_reviewer_stats(reviewer_id)
    }

    pub fn all_reviewer_stats(&self) -> std::collections::HashMap<String, ReviewerStats> {
        self.calibration.get_all_stats()
    }

    pub fn council_dir(&self) -> &Path {
        &self.council_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::CouncilVote;

    #[test]
    fn decide_persists_calibration_and_advances_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let council = Council::new(dir.path()).unwrap();
        let votes = vec![
            CouncilVote { reviewer_id: "a".into(), verdict: VoteChoice::Approve, confidence: 0.9, reasoning: "the cache eviction policy matches the ticket".into(), issues: vec![] },
            CouncilVote { reviewer_id: "b".into(), verdict: VoteChoice::Approve, confidence: 0.8, reasoning: "tests cover the new branch adequately".into(), issues: vec![] },
        ];
        let eligible = vec!["a".to_string(), "b".to_string()];
        let decision = council.decide(&eligible, &votes).unwrap();
        assert_eq!(decision.verdict, VoteChoice::Approve);

        let stats = council.reviewer_stats("a").unwrap();
        assert_eq!(stats.total_reviews, 1);
    }

    #[test]
    fn decide_with_bft_drops_excluded_reviewers() {
        let dir = tempfile::tempdir().unwrap();
        let council = Council::new(dir.path()).unwrap();
        let bft = loki_bft::Bft::new(dir.path(), loki_bft::BftConfig::default(), vec![]).unwrap();
        bft.update_reputation("excluded", false, None).unwrap();
        for _ in 0..5 {
            bft.update_reputation("excluded", false, Some(loki_bft::fault::timeout_fault(&loki_bft::BftConfig::default(), "excluded", "prior", 30.0))).unwrap();
        }

        let votes = vec![
            CouncilVote { reviewer_id: "ok".into(), verdict: VoteChoice::Approve, confidence: 0.9, reasoning: "the retry budget change is sound".into(), issues: vec![] },
            CouncilVote { reviewer_id: "excluded".into(), verdict: VoteChoice::Reject, confidence: 1.0, reasoning: "no".into(), issues: vec![] },
        ];
        let decision = council.decide_with_bft(&bft, &["ok".to_string(), "excluded".to_string()], &votes).unwrap();
        assert_eq!(decision.verdict, VoteChoice::Approve);
        assert_eq!(decision.excluded_reviewers, vec!["excluded".to_string()]);
    }
}
