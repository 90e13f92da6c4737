//! Tracks reviewer accuracy across review rounds, weighting future votes by
//! an exponential moving average of agreement with the final verdict.

use crate::error::{CouncilError, CouncilResult};
use chrono::{DateTime, Utc};
use loki_contracts::VoteChoice;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

const LEARNING_RATE: f64 = 0.1;
const MIN_REVIEWS_FOR_CALIBRATION: u64 = 5;
const DEFAULT_CALIBRATION_SCORE: f64 = 0.5;
const MAX_ROUNDS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerStats {
    pub total_reviews: u64,
    pub agreements_with_final: u64,
    pub disagreements_with_final: u64,
    pub correct_predictions: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub calibration_score: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl ReviewerStats {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_reviews: 0,
            agreements_with_final: 0,
            disagreements_with_final: 0,
            correct_predictions: 0,
            false_positives: 0,
            false_negatives: 0,
            calibration_score: DEFAULT_CALIBRATION_SCORE,
            first_seen: now,
            last_seen: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoundVote {
    reviewer_id: String,
    verdict: VoteChoice,
    agreed_with_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoundEntry {
    iteration: u64,
    timestamp: DateTime<Utc>,
    final_decision: VoteChoice,
    ground_truth: Option<VoteChoice>,
    votes: Vec<RoundVote>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CalibrationData {
    reviewers: HashMap<String, ReviewerStats>,
    rounds: VecDeque<RoundEntry>,
}

/// One vote cast in a round, as seen by the calibration tracker.
pub struct RoundVoteInput {
    pub reviewer_id: String,
    pub verdict: VoteChoice,
}

/// Persistent, JSON-backed ledger of reviewer calibration history.
pub struct CalibrationTracker {
    path: PathBuf,
    data: RwLock<CalibrationData>,
}

impl CalibrationTracker {
    pub fn new(path: impl Into<PathBuf>) -> CouncilResult<Self> {
        let tracker = Self { path: path.into(), data: RwLock::new(CalibrationData::default()) };
        tracker.load()?;
        Ok(tracker)
    }

    fn load(&self) -> CouncilResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Ok(()),
        };
        match serde_json::from_str::<CalibrationData>(&raw) {
            Ok(parsed) => *self.data.write() = parsed,
            Err(source) => tracing::warn!(path = %self.path.display(), error = %source, "corrupt calibration store, starting fresh"),
        }
        Ok(())
    }

    fn save(&self) -> CouncilResult<()> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| CouncilError::Io { path: parent.display().to_string(), source })?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|source| CouncilError::Io { path: parent.display().to_string(), source })?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &*self.data.read())?;
        tmp.persist(&self.path).map_err(|e| CouncilError::Io { path: self.path.display().to_string(), source: e.error })?;
        Ok(())
    }

    /// Records one review round: each reviewer's calibration score moves
    /// toward 1.0 (agreed) or 0.0 (disagreed) via an EMA with `alpha=0.1`.
    pub fn record_round(&self, iteration: u64, votes: &[RoundVoteInput], final_decision: VoteChoice, ground_truth: Option<VoteChoice>) -> CouncilResult<()> {
        let now = Utc::now();
        let mut data = self.data.write();

        let mut round_votes = Vec::with_capacity(votes.len());
        for vote in votes {
            let reviewer = data.reviewers.entry(vote.reviewer_id.clone()).or_insert_with(|| ReviewerStats::new(now));
            reviewer.total_reviews += 1;
            reviewer.last_seen = now;

            let agreed = vote.verdict == final_decision;
            if agreed {
                reviewer.agreements_with_final += 1;
            } else {
                reviewer.disagreements_with_final += 1;
            }

            let match_score = if agreed { 1.0 } else { 0.0 };
            reviewer.calibration_score = (1.0 - LEARNING_RATE) * reviewer.calibration_score + LEARNING_RATE * match_score;

            round_votes.push(RoundVote { reviewer_id: vote.reviewer_id.clone(), verdict: vote.verdict, agreed_with_final: agreed });
        }

        data.rounds.push_back(RoundEntry { iteration, timestamp: now, final_decision, ground_truth, votes: round_votes });
        while data.rounds.len() > MAX_ROUNDS {
            data.rounds.pop_front();
        }
        drop(data);
        self.save()
    }

    /// Updates a past round with the actual outcome, adjusting reviewer
    /// correct/false-positive/false-negative counts against it.
    pub fn update_ground_truth(&self, iteration: u64, ground_truth: VoteChoice) -> CouncilResult<()> {
        let mut data = self.data.write();
        let round = data.rounds.iter_mut().rev().find(|r| r.iteration == iteration);
        let Some(round) = round else { return Ok(()) };
        round.ground_truth = Some(ground_truth);

        for vote in round.votes.clone() {
            if let Some(reviewer) = data.reviewers.get_mut(&vote.reviewer_id) {
                if vote.verdict == ground_truth {
                    reviewer.correct_predictions += 1;
                } else if vote.verdict == VoteChoice::Approve && ground_truth == VoteChoice::Reject {
                    reviewer.false_positives += 1;
                } else if vote.verdict == VoteChoice::Reject && ground_truth == VoteChoice::Approve {
                    reviewer.false_negatives += 1;
                }
            }
        }
        drop(data);
        self.save()
    }

    pub fn get_reviewer_stats(&self, reviewer_id: &str) -> Option<ReviewerStats> {
        self.data.read().reviewers.get(reviewer_id).cloned()
    }

    pub fn get_all_stats(&self) -> HashMap<String, ReviewerStats> {
        self.data.read().reviewers.clone()
    }

    /// New reviewers (fewer than 5 prior reviews) get the neutral weight
    /// 1.0; established reviewers get their calibration EMA.
    pub fn get_weighted_vote(&self, reviewer_id: &str) -> f64 {
        match self.get_reviewer_stats(reviewer_id) {
            Some(stats) if stats.total_reviews >= MIN_REVIEWS_FOR_CALIBRATION => stats.calibration_score,
            _ => 1.0,
        }
    }
}
