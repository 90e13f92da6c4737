//! Three-layer progressive disclosure: a cheap topic index first, one-line
//! summaries next, full items last — each layer only entered if there's
//! enough budget left to make it worthwhile.

use crate::item::{Candidate, Payload, Source};
use crate::scoring::merge_results;
use crate::task_type::{strategy_weights, TaskType};
use crate::token_economics::{estimate_memory_tokens, get_context_efficiency, optimize_context, ContextEfficiency};
use serde::Serialize;

const LAYER1_SHARE: f64 = 0.2;
const LAYER2_SHARE: f64 = 0.4;

#[derive(Debug, Clone, Serialize)]
pub struct TopicEntry {
    pub source: Source,
    pub id: String,
    pub label: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicSummary {
    pub source: Source,
    pub id: String,
    pub topic: String,
    pub fields: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Layers {
    pub topics: Vec<TopicEntry>,
    pub summaries: Vec<TopicSummary>,
    pub full_items: Vec<crate::item::RetrievedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressiveResult {
    pub layers: Layers,
    pub layers_used: Vec<&'static str>,
    pub efficiency: ContextEfficiency,
}

fn label_for(payload: &Payload) -> String {
    match payload {
        Payload::Episode(e) => e.goal.clone(),
        Payload::Pattern(p) => p.pattern.clone(),
        Payload::Skill(s) => s.name.clone(),
        Payload::AntiPattern(a) => a.what_fails.clone(),
    }
}

fn word_overlap(query: &str, text: &str) -> f64 {
    let query_words: std::collections::HashSet<&str> = query.to_lowercase().split_whitespace().collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let hits = query_words.iter().filter(|w| text.contains(*w)).count();
    hits as f64 / query_words.len() as f64
}

fn topic_relevance(query: &str, candidate: &Candidate, task_type: TaskType) -> f64 {
    let (episodic, semantic, skills, anti_patterns) = strategy_weights(task_type);
    let type_weight = match candidate.source {
        Source::Episodic => episodic,
        Source::Semantic => semantic,
        Source::Skills => skills,
        Source::AntiPatterns => anti_patterns,
    };
    let overlap = word_overlap(query, &label_for(&candidate.payload)) * 0.3;
    let recency_bonus = 0.1;
    overlap + type_weight.max(0.1) + recency_bonus
}

/// Filters candidates to those with positive relevance, sorted descending.
fn filter_relevant_topics(query: &str, candidates: &[Candidate], task_type: TaskType) -> Vec<TopicEntry> {
    let mut topics: Vec<TopicEntry> = candidates
        .iter()
        .map(|c| TopicEntry {
            source: c.source,
            id: c.payload.id().to_string(),
            label: label_for(&c.payload),
            relevance: topic_relevance(query, c, task_type),
        })
        .filter(|t| t.relevance > 0.0)
        .collect();
    topics.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(std::cmp::Ordering::Equal));
    topics
}

fn summarize(candidates: &[Candidate], top: &[TopicEntry], per_source_limit: usize) -> Vec<TopicSummary> {
    let mut counts: std::collections::HashMap<Source, usize> = std::collections::HashMap::new();
    let mut summaries = Vec::new();
    for topic in top {
        let count = counts.entry(topic.source).or_insert(0);
        if *count >= per_source_limit {
            continue;
        }
        let Some(candidate) = candidates.iter().find(|c| c.payload.id() == topic.id) else { continue };
        let mut fields = std::collections::HashMap::new();
        match &candidate.payload {
            Payload::Episode(e) => {
                fields.insert("goal".to_string(), e.goal.clone());
                fields.insert("outcome".to_string(), format!("{:?}", e.outcome));
            }
            Payload::Pattern(p) => {
                fields.insert("pattern".to_string(), p.pattern.clone());
                fields.insert("category".to_string(), p.category.clone());
            }
            Payload::Skill(s) => {
                fields.insert("name".to_string(), s.name.clone());
                fields.insert("description".to_string(), s.description.clone());
            }
            Payload::AntiPattern(a) => {
                fields.insert("what_fails".to_string(), a.what_fails.clone());
                fields.insert("why".to_string(), a.why.clone());
            }
        }
        summaries.push(TopicSummary { source: topic.source, id: topic.id.clone(), topic: topic.label.clone(), fields });
        *count += 1;
    }
    summaries
}

fn estimate_topic_tokens(topics: &[TopicEntry]) -> u64 {
    topics.iter().map(|t| ((t.label.len() as f64 / 4.0).ceil() as u64).max(1)).sum()
}

fn estimate_summary_tokens(summaries: &[TopicSummary]) -> u64 {
    summaries
        .iter()
        .map(|s| {
            let chars: usize = s.fields.values().map(|v| v.len()).sum();
            ((chars as f64 / 4.0).ceil() as u64).max(1)
        })
        .sum()
}

/// Runs the three-layer disclosure over `candidates` within `budget` tokens.
pub fn retrieve_progressive(query: &str, candidates: Vec<Candidate>, task_type: TaskType, budget: u64, top_k: usize) -> ProgressiveResult {
    let mut layers_used = Vec::new();
    let layer1_budget = (budget as f64 * LAYER1_SHARE) as u64;
    let layer2_budget = (budget as f64 * LAYER2_SHARE) as u64;

    let all_topics = filter_relevant_topics(query, &candidates, task_type);
    let top_topics: Vec<TopicEntry> = all_topics.into_iter().take(10).collect();
    let layer1_tokens = estimate_topic_tokens(&top_topics);

    let mut budget_remaining = budget;
    let mut layers = Layers::default();

    if layer1_tokens <= layer1_budget {
        layers.topics = top_topics.clone();
        budget_remaining = budget_remaining.saturating_sub(layer1_tokens);
        layers_used.push("topics");
    }

    if (budget_remaining as f64) > (layer2_budget as f64 * 0.5) {
        let summaries = summarize(&candidates, &layers.topics, 5);
        let summary_tokens = estimate_summary_tokens(&summaries);
        if summary_tokens <= budget_remaining {
            budget_remaining = budget_remaining.saturating_sub(summary_tokens);
            layers.summaries = summaries;
            layers_used.push("summaries");
        }
    }

    if budget_remaining > 100 {
        let scored = merge_results(candidates, task_type, top_k.max(10));
        let full = optimize_context(scored, budget_remaining);
        if !full.is_empty() {
            layers.full_items = full;
            layers_used.push("full_items");
        }
    }

    // Topics/summaries are cheap metadata, not scored items; efficiency's
    // item_counts intentionally reflects only the full-detail layer, which
    // is where the token budget is actually spent.
    let efficiency = get_context_efficiency(&layers.full_items, budget);

    ProgressiveResult { layers, layers_used, efficiency }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use loki_contracts::{Episode, Outcome};

    fn candidate(goal: &str) -> Candidate {
        Candidate {
            source: Source::Episodic,
            base_relevance: 0.8,
            payload: Payload::Episode(Episode {
                id: format!("e-{goal}"),
                timestamp: Utc::now(),
                actor: "a".into(),
                phase: "implementation".into(),
                goal: goal.into(),
                actions: vec![],
                errors: vec![],
                outcome: Outcome::Success,
                tokens_used: 0,
                files_read: vec![],
                files_modified: vec![],
                importance: 0.6,
                access_count: 0,
                last_accessed: Utc::now(),
            }),
        }
    }

    #[test]
    fn small_budget_never_reaches_full_items() {
        let candidates = vec![candidate("fix the retry backoff"), candidate("wire up the retry executor")];
        let result = retrieve_progressive("retry", candidates, TaskType::Implementation, 5, 10);
        assert!(!result.layers_used.contains(&"full_items"));
    }

    #[test]
    fn generous_budget_reaches_full_items() {
        let candidates = vec![candidate("fix the retry backoff"), candidate("wire up the retry executor")];
        let result = retrieve_progressive("retry", candidates, TaskType::Implementation, 5000, 10);
        assert!(result.layers_used.contains(&"full_items"));
        assert!(!result.layers.full_items.is_empty());
    }
}
