//! Detects rubber-stamped review rounds: votes that agree suspiciously
//! often, phrase their reasoning nearly identically, and raise the same
//! kind and number of issues.

use loki_contracts::CouncilVote;
use std::collections::HashSet;

const UNANIMITY_WEIGHT: f64 = 0.3;
const SIMILARITY_WEIGHT: f64 = 0.3;
const SEVERITY_UNIFORMITY_WEIGHT: f64 = 0.2;
const ISSUE_COUNT_WEIGHT: f64 = 0.2;
const ALL_ZERO_ISSUES_SCORE: f64 = 0.15;

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase().split(|c: char| !c.is_alphanumeric() && c != '_').filter(|w| !w.is_empty()).map(str::to_string).collect()
}

/// Scores how likely `votes` are sycophantic rather than independently
/// reasoned: 0.0 is fully independent, 1.0 is rubber-stamped. Always 0.0
/// for fewer than two votes.
pub fn detect_sycophancy(votes: &[CouncilVote]) -> f64 {
    if votes.len() < 2 {
        return 0.0;
    }

    let mut total = 0.0;

    // Signal 1: verdict unanimity.
    let mut verdict_counts: std::collections::HashMap<&'static str, usize> = std::collections::HashMap::new();
    for vote in votes {
        *verdict_counts.entry(verdict_label(vote.verdict)).or_insert(0) += 1;
    }
    let most_common = verdict_counts.values().copied().max().unwrap_or(0);
    total += (most_common as f64 / votes.len() as f64) * UNANIMITY_WEIGHT;

    // Signal 2: Jaccard similarity of reasoning word sets.
    let reasonings: Vec<HashSet<String>> = votes.iter().map(|v| words(&v.reasoning)).collect();
    if reasonings.iter().all(|r| !r.is_empty()) {
        let mut similarities = Vec::new();
        for i in 0..reasonings.len() {
            for j in (i + 1)..reasonings.len() {
                let intersection = reasonings[i].intersection(&reasonings[j]).count();
                let union = reasonings[i].union(&reasonings[j]).count();
                if union > 0 {
                    similarities.push(intersection as f64 / union as f64);
                }
            }
        }
        let avg_similarity = if similarities.is_empty() { 0.0 } else { similarities.iter().sum::<f64>() / similarities.len() as f64 };
        total += avg_similarity * SIMILARITY_WEIGHT;
    }

    // Signal 3: issue severity uniformity. loki_contracts represents
    // severity as a continuous score rather than a label, so reviewers
    // are considered "in agreement" when their issues round to the same
    // tenth — close enough to catch copy-pasted severities without
    // requiring bit-for-bit equal floats.
    let severities: Vec<i64> = votes.iter().flat_map(|v| v.issues.iter().map(|issue| (issue.severity * 10.0).round() as i64)).collect();
    if !severities.is_empty() {
        let mut counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
        for s in &severities {
            *counts.entry(*s).or_insert(0) += 1;
        }
        let most_common_sev = counts.values().copied().max().unwrap_or(0);
        total += (most_common_sev as f64 / severities.len() as f64) * SEVERITY_UNIFORMITY_WEIGHT;
    }

    // Signal 4: issue count similarity.
    let issue_counts: Vec<usize> = votes.iter().map(|v| v.issues.len()).collect();
    let max_count = issue_counts.iter().copied().max().unwrap_or(0);
    if max_count > 0 {
        let min_count = issue_counts.iter().copied().min().unwrap_or(0);
        let avg_count = issue_counts.iter().sum::<usize>() as f64 / issue_counts.len() as f64;
        let count_range = (max_count - min_count) as f64;
        let uniformity = 1.0 - (count_range / avg_count.max(1.0));
        total += uniformity.max(0.0) * ISSUE_COUNT_WEIGHT;
    } else {
        total += ALL_ZERO_ISSUES_SCORE;
    }

    total.clamp(0.0, 1.0)
}

fn verdict_label(choice: loki_contracts::VoteChoice) -> &'static str {
    match choice {
        loki_contracts::VoteChoice::Approve => "approve",
        loki_contracts::VoteChoice::Reject => "reject",
        loki_contracts::VoteChoice::Abstain => "abstain",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SycophancyClass {
    Independent,
    Mild,
    Moderate,
    Severe,
}

impl SycophancyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SycophancyClass::Independent => "independent",
            SycophancyClass::Mild => "mild",
            SycophancyClass::Moderate => "moderate",
            SycophancyClass::Severe => "severe",
        }
    }

    pub fn is_concerning(&self) -> bool {
        matches!(self, SycophancyClass::Moderate | SycophancyClass::Severe)
    }
}

pub fn classify_sycophancy(score: f64) -> SycophancyClass {
    if score < 0.3 {
        SycophancyClass::Independent
    } else if score < 0.5 {
        SycophancyClass::Mild
    } else if score < 0.7 {
        SycophancyClass::Moderate
    } else {
        SycophancyClass::Severe
    }
}

/// A multi-line human-readable sycophancy analysis, mirroring a terminal
/// report: score/classification, per-reviewer verdicts and issue counts,
/// and a recommendation when the classification is concerning.
pub fn generate_sycophancy_report(votes: &[CouncilVote], score: f64) -> String {
    let classification = classify_sycophancy(score);
    let mut lines = vec!["Sycophancy Analysis Report".to_string(), "=".repeat(30), format!("Score: {score:.2} ({})", classification.as_str()), format!("Reviewers: {}", votes.len())];

    let verdicts: Vec<&str> = votes.iter().map(|v| verdict_label(v.verdict)).collect();
    lines.push(format!("Verdicts: {}", verdicts.join(", ")));

    let issue_counts: Vec<String> = votes.iter().map(|v| v.issues.len().to_string()).collect();
    lines.push(format!("Issue counts: {}", issue_counts.join(", ")));

    if classification.is_concerning() {
        lines.push(String::new());
        lines.push("WARNING: High sycophancy score detected.".to_string());
        lines.push("Recommendation: add a devil's advocate reviewer or require re-review with stricter independence.".to_string());
    }

    lines.join("\n")
}
