//! Task-aware, budget-constrained retrieval over [`loki_memory::MemoryStore`].
//!
//! Scoring lives in [`scoring`], progressive disclosure in [`progressive`],
//! namespace fan-out in [`namespace`], and token accounting in
//! [`token_economics`] — the last of which has no original module to port
//! from; see `DESIGN.md` for that gap.

pub mod candidates;
pub mod error;
pub mod item;
pub mod keyword_search;
pub mod namespace;
pub mod progressive;
pub mod scoring;
pub mod task_type;
pub mod token_economics;

pub use error::{RetrievalError, RetrievalResult};
pub use item::{Candidate, Payload, RetrievedItem, Source};
pub use progressive::ProgressiveResult;
pub use task_type::{detect_task_type, TaskType};
pub use token_economics::ContextEfficiency;

use candidates::VectorContext;
use loki_contracts::Namespace;
use loki_memory::MemoryStore;

const RETRIEVAL_BOOST: f64 = 0.05;

/// The task-shaped context a retrieval call is made with. Mirrors what an
/// agent knows about its own task at the moment it asks for memory.
#[derive(Debug, Clone, Default)]
pub struct RetrievalContext {
    pub goal: String,
    pub action_type: String,
    pub phase: String,
    pub files: Vec<String>,
}

impl RetrievalContext {
    /// Joins goal, phase, action and up to the first three files into one
    /// query string for keyword/topic scoring.
    pub fn as_query(&self) -> String {
        let mut parts = vec![self.goal.clone()];
        if !self.phase.is_empty() {
            parts.push(format!("phase: {}", self.phase));
        }
        if !self.action_type.is_empty() {
            parts.push(format!("action: {}", self.action_type));
        }
        if !self.files.is_empty() {
            let sample: Vec<&str> = self.files.iter().take(3).map(|s| s.as_str()).collect();
            parts.push(format!("files: {}", sample.join(", ")));
        }
        parts.join(" ")
    }

    pub fn task_type(&self) -> TaskType {
        task_type::detect_task_type(&self.goal, &self.action_type, &self.phase)
    }
}

/// A task-aware retrieval call's full result: the items plus accounting
/// metadata.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetedResult {
    pub items: Vec<RetrievedItem>,
    pub efficiency: ContextEfficiency,
    pub task_type: TaskType,
}

/// Gathers every collection's candidates for `ctx`, skipping collections
/// whose task-type weight is zero.
fn gather_all(store: &MemoryStore, ctx: &RetrievalContext, top_k: usize, vectors: &mut VectorContext) -> RetrievalResult<Vec<Candidate>> {
    let query = ctx.as_query();
    let task_type = ctx.task_type();
    let (w_episodic, w_semantic, w_skills, w_anti) = task_type::strategy_weights(task_type);
    let recall = (top_k.max(1) * 2).max(1);

    let mut out = Vec::new();
    if w_episodic > 0.0 {
        out.extend(candidates::from_episodic(store, &query, recall, vectors)?);
    }
    if w_semantic > 0.0 {
        out.extend(candidates::from_semantic(store, &query, recall, vectors)?);
    }
    if w_skills > 0.0 {
        out.extend(candidates::from_skills(store, &query, recall, vectors)?);
    }
    if w_anti > 0.0 {
        out.extend(candidates::from_anti_patterns(store, &query, recall, vectors)?);
    }
    Ok(out)
}

/// Applies the retrieval boost to whichever items came back, best-effort —
/// a boost failure for one item never aborts the rest.
fn boost_top_items(store: &MemoryStore, items: &[RetrievedItem]) {
    for item in items {
        let _ = match item.payload {
            Payload::Episode(_) => store.boost_episode_on_retrieval(item.id(), RETRIEVAL_BOOST).map(|_| ()),
            Payload::Pattern(_) => store.boost_pattern_on_retrieval(item.id(), RETRIEVAL_BOOST).map(|_| ()),
            Payload::Skill(_) => store.boost_skill_on_retrieval(item.id(), RETRIEVAL_BOOST).map(|_| ()),
            Payload::AntiPattern(_) => Ok(()),
        };
    }
}

/// `RetrieveTaskAware`: scores every relevant collection for `ctx`, applies
/// recency boost, optionally fits a token budget, and boosts the returned
/// items' importance for having been retrieved.
pub fn retrieve_task_aware(
    store: &MemoryStore,
    ctx: &RetrievalContext,
    top_k: usize,
    token_budget: Option<u64>,
    vectors: &mut VectorContext,
) -> RetrievalResult<Vec<RetrievedItem>> {
    let task_type = ctx.task_type();
    tracing::debug!(namespace = %store.namespace(), ?task_type, top_k, "retrieving task-aware items");
    let candidates = gather_all(store, ctx, top_k, vectors)?;
    let merged = scoring::merge_results(candidates, task_type, top_k.max(1) * 2);
    let mut boosted = scoring::apply_recency_boost(merged);

    if let Some(budget) = token_budget {
        boosted = token_economics::optimize_context(boosted, budget);
    }
    boosted.truncate(top_k);

    boost_top_items(store, &boosted);
    Ok(boosted)
}

/// `RetrieveWithBudget`: either runs the standard scored retrieval and
/// reports efficiency against `budget`, or — when `progressive` is set —
/// runs the three-layer disclosure instead.
pub fn retrieve_with_budget(
    store: &MemoryStore,
    ctx: &RetrievalContext,
    budget: u64,
    top_k: usize,
    progressive: bool,
    vectors: &mut VectorContext,
) -> RetrievalResult<BudgetedResult> {
    let task_type = ctx.task_type();
    if progressive {
        let candidates = gather_all(store, ctx, top_k, vectors)?;
        let result = progressive::retrieve_progressive(&ctx.as_query(), candidates, task_type, budget, top_k);
        Ok(BudgetedResult { items: result.layers.full_items, efficiency: result.efficiency, task_type })
    } else {
        let items = retrieve_task_aware(store, ctx, top_k, Some(budget), vectors)?;
        let efficiency = token_economics::get_context_efficiency(&items, budget);
        Ok(BudgetedResult { items, efficiency, task_type })
    }
}

/// `RetrieveCrossNamespace`: runs task-aware retrieval independently per
/// namespace, discounts non-current namespaces by 0.9, and truncates to
/// `top_k * namespaces.len()`.
pub fn retrieve_cross_namespace(
    root: &std::path::Path,
    current: &Namespace,
    namespaces: &[Namespace],
    ctx: &RetrievalContext,
    top_k: usize,
    budget: Option<u64>,
    vectors: &mut VectorContext,
) -> RetrievalResult<Vec<RetrievedItem>> {
    let mut per_namespace = Vec::new();
    for ns in namespaces {
        let store = MemoryStore::new(root)?.with_namespace(ns.clone())?;
        let items = retrieve_task_aware(&store, ctx, top_k, None, vectors)?;
        per_namespace.push((ns.clone(), items));
    }

    let mut merged = namespace::merge_namespaces(per_namespace, current);
    if let Some(budget) = budget {
        merged = token_economics::optimize_context(merged, budget);
    }
    merged.truncate(top_k * namespaces.len().max(1));
    Ok(merged)
}

/// `RetrieveWithInheritance`: walks the namespace's inheritance chain
/// (current, then `global` unless `include_global` is false), merging
/// ancestor results in with a 0.9-per-hop discount and deduplicating by id
/// in favour of the closer namespace.
pub fn retrieve_with_inheritance(
    root: &std::path::Path,
    current: &Namespace,
    include_global: bool,
    ctx: &RetrievalContext,
    top_k: usize,
    vectors: &mut VectorContext,
) -> RetrievalResult<Vec<RetrievedItem>> {
    let mut chain = namespace::default_inheritance_chain(current);
    if !include_global {
        chain.retain(|ns| ns != &Namespace::global());
    }

    let mut chain_results = Vec::new();
    for ns in &chain {
        let store = MemoryStore::new(root)?.with_namespace(ns.clone())?;
        let items = retrieve_task_aware(&store, ctx, top_k, None, vectors)?;
        chain_results.push((ns.clone(), items));
    }

    let mut merged = namespace::merge_with_inheritance(chain_results, current);
    merged.truncate(top_k);
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::{Episode, Outcome, Pattern};

    fn sample_episode(goal: &str) -> Episode {
        Episode {
            id: String::new(),
            timestamp: chrono::Utc::now(),
            actor: "eng-backend".into(),
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
            last_accessed: chrono::Utc::now(),
        }
    }

    fn sample_pattern(text: &str) -> Pattern {
        Pattern {
            id: String::new(),
            pattern: text.into(),
            category: "resilience".into(),
            correct_approach: "use backoff".into(),
            incorrect_approach: "busy loop".into(),
            confidence: 0.8,
            source_episodes: vec![],
            usage_count: 0,
            last_used: chrono::Utc::now(),
            importance: 0.5,
        }
    }

    #[test]
    fn task_aware_retrieval_ranks_relevant_items_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut relevant = sample_episode("implement the retry executor with backoff");
        let mut irrelevant = sample_episode("update the onboarding docs");
        store.save_episode(&mut relevant).unwrap();
        store.save_episode(&mut irrelevant).unwrap();
        let mut pattern = sample_pattern("retry transient errors with backoff");
        store.save_pattern(&mut pattern).unwrap();

        let ctx = RetrievalContext { goal: "implement retry backoff".into(), action_type: "write_file".into(), phase: "implementation".into(), files: vec![] };
        let items = retrieve_task_aware(&store, &ctx, 5, None, &mut VectorContext::default()).unwrap();
        assert!(!items.is_empty());
        assert!(items[0].weighted_score >= items.last().unwrap().weighted_score);
    }

    #[test]
    fn budget_never_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        for i in 0..10 {
            let mut episode = sample_episode(&format!("implement feature {i} with a long descriptive goal text"));
            store.save_episode(&mut episode).unwrap();
        }
        let ctx = RetrievalContext { goal: "implement feature".into(), ..Default::default() };
        let budget = 50;
        let result = retrieve_with_budget(&store, &ctx, budget, 10, false, &mut VectorContext::default()).unwrap();
        assert!(result.efficiency.tokens_used <= budget);
    }

    #[test]
    fn cross_namespace_discounts_other_namespaces() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let team_a = Namespace::new("team-a").unwrap();
        let team_b = Namespace::new("team-b").unwrap();

        let store_a = MemoryStore::new(root).unwrap().with_namespace(team_a.clone()).unwrap();
        let mut ep_a = sample_episode("implement the retry backoff in team a");
        store_a.save_episode(&mut ep_a).unwrap();

        let store_b = MemoryStore::new(root).unwrap().with_namespace(team_b.clone()).unwrap();
        let mut ep_b = sample_episode("implement the retry backoff in team b");
        store_b.save_episode(&mut ep_b).unwrap();

        let ctx = RetrievalContext { goal: "implement retry backoff".into(), ..Default::default() };
        let items = retrieve_cross_namespace(root, &team_a, &[team_a.clone(), team_b.clone()], &ctx, 5, None, &mut VectorContext::default()).unwrap();
        assert_eq!(items.len(), 2);
        let a_item = items.iter().find(|i| i.namespace.as_deref() == Some("team-a")).unwrap();
        let b_item = items.iter().find(|i| i.namespace.as_deref() == Some("team-b")).unwrap();
        assert!(a_item.weighted_score >= b_item.weighted_score);
    }
}
