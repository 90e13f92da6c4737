//! Cross-namespace and inheritance-aware retrieval: each namespace is
//! searched independently, then non-local results are discounted and
//! merged back in.

use crate::item::RetrievedItem;
use loki_contracts::Namespace;
use std::collections::HashSet;

const CROSS_NAMESPACE_DISCOUNT: f64 = 0.9;

/// Applies the 0.9-per-hop discount to items not from `current`, tags each
/// item with its namespace, then re-sorts by the discounted score.
pub fn merge_namespaces(mut per_namespace: Vec<(Namespace, Vec<RetrievedItem>)>, current: &Namespace) -> Vec<RetrievedItem> {
    let mut merged = Vec::new();
    for (namespace, mut items) in per_namespace.drain(..) {
        let is_current = &namespace == current;
        for item in &mut items {
            if !is_current {
                item.weighted_score *= CROSS_NAMESPACE_DISCOUNT;
            }
            item.namespace = Some(namespace.as_str().to_string());
        }
        merged.extend(items);
    }
    merged.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

/// The inheritance chain to walk when no namespace-manager parent-link
/// registry is available: the current namespace, then `global`, matching
/// the fallback the original falls back to when its own registry import
/// fails.
pub fn default_inheritance_chain(current: &Namespace) -> Vec<Namespace> {
    if current.is_default() || current == &Namespace::global() {
        vec![current.clone()]
    } else {
        vec![current.clone(), Namespace::global()]
    }
}

/// Merges a namespace's own results with its ancestor chain's results,
/// discounting each hop away from `current` by `0.9^hop`, and deduplicating
/// by entity id in favour of the closer namespace's copy.
pub fn merge_with_inheritance(chain_results: Vec<(Namespace, Vec<RetrievedItem>)>, current: &Namespace) -> Vec<RetrievedItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    for (hop, (namespace, mut items)) in chain_results.into_iter().enumerate() {
        let is_current = &namespace == current;
        let discount = CROSS_NAMESPACE_DISCOUNT.powi(hop as i32);
        for item in &mut items {
            if !seen.insert(item.id().to_string()) {
                continue;
            }
            if !is_current {
                item.weighted_score *= discount;
            }
            item.namespace = Some(namespace.as_str().to_string());
            merged.push(item.clone());
        }
    }
    merged.sort_by(|a, b| b.weighted_score.partial_cmp(&a.weighted_score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Payload, Source};
    use chrono::Utc;
    use loki_contracts::{Episode, Outcome};

    fn item(id: &str, score: f64) -> RetrievedItem {
        RetrievedItem {
            source: Source::Episodic,
            base_relevance: score,
            weighted_score: score,
            namespace: None,
            payload: Payload::Episode(Episode {
                id: id.into(),
                timestamp: Utc::now(),
                actor: "a".into(),
                phase: "p".into(),
                goal: "g".into(),
                actions: vec![],
                errors: vec![],
                outcome: Outcome::Success,
                tokens_used: 0,
                files_read: vec![],
                files_modified: vec![],
                importance: 0.5,
                access_count: 0,
                last_accessed: Utc::now(),
            }),
        }
    }

    #[test]
    fn non_current_namespace_items_are_discounted() {
        let current = Namespace::new("team-a").unwrap();
        let other = Namespace::new("team-b").unwrap();
        let merged = merge_namespaces(vec![(current.clone(), vec![item("x", 1.0)]), (other, vec![item("y", 1.0)])], &current);
        let x = merged.iter().find(|i| i.id() == "x").unwrap();
        let y = merged.iter().find(|i| i.id() == "y").unwrap();
        assert_eq!(x.weighted_score, 1.0);
        assert!((y.weighted_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn default_chain_falls_back_to_global() {
        let current = Namespace::new("team-a").unwrap();
        let chain = default_inheritance_chain(&current);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1], Namespace::global());
    }

    #[test]
    fn inheritance_merge_prefers_closer_copy() {
        let current = Namespace::new("team-a").unwrap();
        let global = Namespace::global();
        let merged = merge_with_inheritance(vec![(current.clone(), vec![item("dup", 0.5)]), (global, vec![item("dup", 0.9)])], &current);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].weighted_score, 0.5);
    }
}
