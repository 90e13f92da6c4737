//! Rough token accounting for budget-constrained retrieval. There is no
//! original implementation of this piece to port — it's designed fresh from
//! the character-length heuristic the budget algorithm calls for, kept
//! consistent across entity kinds so the knapsack in `progressive` can
//! compare candidates from different collections on equal footing.

use crate::item::{Payload, RetrievedItem};
use loki_memory::MemoryStore;
use serde::Serialize;
use std::collections::HashMap;

const CHARS_PER_TOKEN: f64 = 4.0;

fn chars_for(payload: &Payload) -> usize {
    match payload {
        Payload::Episode(e) => {
            e.goal.len()
                + e.phase.len()
                + e.actor.len()
                + e.actions.iter().map(|a| a.len()).sum::<usize>()
                + e.errors.iter().map(|s| s.len()).sum::<usize>()
                + e.files_read.iter().map(|s| s.len()).sum::<usize>()
                + e.files_modified.iter().map(|s| s.len()).sum::<usize>()
        }
        Payload::Pattern(p) => p.pattern.len() + p.category.len() + p.correct_approach.len() + p.incorrect_approach.len(),
        Payload::Skill(s) => {
            s.name.len()
                + s.description.len()
                + s.steps.iter().map(|st| st.len()).sum::<usize>()
                + s.prerequisites.iter().map(|p| p.len()).sum::<usize>()
                + s.exit_criteria.iter().map(|c| c.len()).sum::<usize>()
        }
        Payload::AntiPattern(a) => a.what_fails.len() + a.why.len() + a.prevention.len(),
    }
}

/// A rough, kind-agnostic token count: total text length over four
/// characters-per-token, rounded up, floored at one token.
pub fn estimate_memory_tokens(payload: &Payload) -> u64 {
    let chars = chars_for(payload) as f64;
    ((chars / CHARS_PER_TOKEN).ceil() as u64).max(1)
}

/// Greedily selects items by descending `(importance*score)/tokens`,
/// keeping the running total within `budget`. Ties keep the caller's
/// original relative order (a stable sort).
pub fn optimize_context(mut items: Vec<RetrievedItem>, budget: u64) -> Vec<RetrievedItem> {
    items.sort_by(|a, b| {
        let density = |item: &RetrievedItem| {
            let tokens = estimate_memory_tokens(&item.payload).max(1) as f64;
            (item.payload.importance() * item.weighted_score) / tokens
        };
        density(b).partial_cmp(&density(a)).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept = Vec::new();
    let mut used = 0u64;
    for item in items {
        let tokens = estimate_memory_tokens(&item.payload);
        if used + tokens > budget {
            continue;
        }
        used += tokens;
        kept.push(item);
    }
    kept
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextEfficiency {
    pub tokens_used: u64,
    pub tokens_available: u64,
    pub utilization: f64,
    pub item_counts: HashMap<String, usize>,
}

/// Reports the fraction of `tokens_available` actually spent on `items`,
/// plus a per-collection item count.
pub fn get_context_efficiency(items: &[RetrievedItem], tokens_available: u64) -> ContextEfficiency {
    let tokens_used: u64 = items.iter().map(|item| estimate_memory_tokens(&item.payload)).sum();
    let mut item_counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        *item_counts.entry(item.source.as_str_key().to_string()).or_insert(0) += 1;
    }
    let utilization = if tokens_available == 0 { 0.0 } else { tokens_used as f64 / tokens_available as f64 };
    ContextEfficiency { tokens_used, tokens_available, utilization, item_counts }
}

/// Total estimated tokens across every entity in every collection of the
/// given store's current namespace — the denominator progressive
/// disclosure is trying to avoid paying in full.
pub fn estimate_full_load_tokens(store: &MemoryStore) -> loki_memory::MemoryResult<u64> {
    let mut total = 0u64;
    for episode in store.all_episodes(None, usize::MAX)? {
        total += estimate_memory_tokens(&Payload::Episode(episode));
    }
    for pattern in store.all_patterns(None)? {
        total += estimate_memory_tokens(&Payload::Pattern(pattern));
    }
    for skill in store.all_skills()? {
        total += estimate_memory_tokens(&Payload::Skill(skill));
    }
    for anti in store.all_anti_patterns()? {
        total += estimate_memory_tokens(&Payload::AntiPattern(anti));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Source;
    use chrono::Utc;
    use loki_contracts::{Episode, Outcome};

    fn item(goal: &str, importance: f64, weighted_score: f64) -> RetrievedItem {
        RetrievedItem {
            source: Source::Episodic,
            base_relevance: weighted_score,
            weighted_score,
            namespace: None,
            payload: Payload::Episode(Episode {
                id: format!("e-{}", goal.len()),
                timestamp: Utc::now(),
                actor: "a".into(),
                phase: "p".into(),
                goal: goal.into(),
                actions: vec![],
                errors: vec![],
                outcome: Outcome::Success,
                tokens_used: 0,
                files_read: vec![],
                files_modified: vec![],
                importance,
                access_count: 0,
                last_accessed: Utc::now(),
            }),
        }
    }

    #[test]
    fn optimize_context_never_exceeds_budget() {
        let items = vec![item(&"x".repeat(400), 0.9, 1.0), item(&"y".repeat(400), 0.8, 0.9), item("short", 0.5, 0.5)];
        let budget = 150;
        let kept = optimize_context(items, budget);
        let used: u64 = kept.iter().map(|i| estimate_memory_tokens(&i.payload)).sum();
        assert!(used <= budget);
    }

    #[test]
    fn optimize_context_prefers_denser_items() {
        let items = vec![item(&"z".repeat(4000), 0.9, 1.0), item("short", 0.9, 1.0)];
        let kept = optimize_context(items, 10);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].payload.id(), "e-5");
        // the short item is denser per token, so it alone should fit.
    }

    #[test]
    fn efficiency_reports_utilization_and_counts() {
        let items = vec![item("goal one", 0.5, 0.5), item("goal two", 0.5, 0.5)];
        let tokens_used: u64 = items.iter().map(|i| estimate_memory_tokens(&i.payload)).sum();
        let efficiency = get_context_efficiency(&items, tokens_used * 2);
        assert_eq!(efficiency.item_counts["episodic"], 2);
        assert!(efficiency.utilization <= 1.0);
    }
}
