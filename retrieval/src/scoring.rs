use crate::item::{Candidate, RetrievedItem, Source};
use crate::task_type::{strategy_weights, TaskType};
use chrono::Utc;

const RECENCY_BOOST_FACTOR: f64 = 0.1;
const RECENCY_WINDOW_DAYS: i64 = 30;

fn weight_for(source: Source, weights: (f64, f64, f64, f64)) -> f64 {
    let (episodic, semantic, skills, anti_patterns) = weights;
    match source {
        Source::Episodic => episodic,
        Source::Semantic => semantic,
        Source::Skills => skills,
        Source::AntiPatterns => anti_patterns,
    }
}

/// `base_relevance * task_weight * (0.7 + 0.3*importance) * confidence`.
fn score_result(candidate: &Candidate, task_type: TaskType) -> f64 {
    let weight = weight_for(candidate.source, strategy_weights(task_type));
    let importance_factor = 0.7 + 0.3 * candidate.payload.importance();
    candidate.base_relevance * weight * importance_factor * candidate.payload.confidence()
}

/// Scores every candidate for `task_type`, sorts descending, and truncates
/// to `top_k`.
pub fn merge_results(candidates: Vec<Candidate>, task_type: TaskType, top_k: usize) -> Vec<RetrievedItem> {
    let mut items: Vec<RetrievedItem> = candidates
        .into_iter()
        .map(|candidate| {
            let weighted_score = score_result(&candidate, task_type);
            RetrievedItem {
                source: candidate.source,
                payload: candidate.payload,
                base_relevance: candidate.base_relevance,
                weighted_score,
                namespace: None,
            }
        })
        .collect();
    items.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal));
    items.truncate(top_k);
    items
}

/// Linearly boosts items younger than 30 days: `score *= 1 +
/// factor*(1 - age_days/30)`, multiplicatively, then re-sorts. Items at or
/// past the window get no boost, never a penalty.
pub fn apply_recency_boost(mut items: Vec<RetrievedItem>) -> Vec<RetrievedItem> {
    let now = Utc::now();
    for item in &mut items {
        let age_days = (now - item.payload.timestamp()).num_days();
        if age_days < RECENCY_WINDOW_DAYS {
            let age_days = age_days.max(0) as f64;
            let boost = RECENCY_BOOST_FACTOR * (1.0 - age_days / RECENCY_WINDOW_DAYS as f64);
            item.weighted_score *= 1.0 + boost;
        }
    }
    items.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal));
    items
}
