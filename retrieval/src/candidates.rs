//! Gathers scored candidates from each of the four collections, preferring
//! vector similarity when a query embedding and index are supplied and
//! falling back to keyword overlap otherwise.

use crate::item::{Candidate, Payload, Source};
use crate::keyword_search;
use loki_memory::MemoryStore;
use loki_vector_index::{VectorIndex, VectorIndexResult};

/// Per-collection vector indices, all optional — a caller with embeddings
/// for only some collections still gets keyword fallback for the rest.
/// `search` lazily rebuilds a normalized cache, hence `&mut`.
#[derive(Default)]
pub struct VectorContext<'a> {
    pub query_embedding: Option<&'a [f32]>,
    pub episodic: Option<&'a mut VectorIndex>,
    pub semantic: Option<&'a mut VectorIndex>,
    pub skills: Option<&'a mut VectorIndex>,
    pub anti_patterns: Option<&'a mut VectorIndex>,
}

fn similarity_scores(index: &mut VectorIndex, query_embedding: &[f32], limit: usize) -> VectorIndexResult<std::collections::HashMap<String, f64>> {
    Ok(index
        .search(query_embedding, limit, None)?
        .into_iter()
        .map(|hit| (hit.id, hit.score as f64))
        .collect())
}

pub fn from_episodic(store: &MemoryStore, query: &str, limit: usize, vectors: &mut VectorContext) -> crate::error::RetrievalResult<Vec<Candidate>> {
    let episodes = store.all_episodes(None, limit.max(1) * 3)?;
    let sim = match (vectors.query_embedding, vectors.episodic.as_deref_mut()) {
        (Some(q), Some(idx)) => Some(similarity_scores(idx, q, limit.max(1) * 3)?),
        _ => None,
    };
    Ok(episodes
        .into_iter()
        .map(|episode| {
            let base_relevance = sim
                .as_ref()
                .and_then(|m| m.get(&episode.id).copied())
                .unwrap_or_else(|| keyword_search::episodic_score(query, &episode));
            Candidate { source: Source::Episodic, base_relevance, payload: Payload::Episode(episode) }
        })
        .collect())
}

pub fn from_semantic(store: &MemoryStore, query: &str, limit: usize, vectors: &mut VectorContext) -> crate::error::RetrievalResult<Vec<Candidate>> {
    let patterns = store.all_patterns(None)?;
    let sim = match (vectors.query_embedding, vectors.semantic.as_deref_mut()) {
        (Some(q), Some(idx)) => Some(similarity_scores(idx, q, limit.max(1) * 3)?),
        _ => None,
    };
    Ok(patterns
        .into_iter()
        .map(|pattern| {
            let base_relevance = sim
                .as_ref()
                .and_then(|m| m.get(&pattern.id).copied())
                .unwrap_or_else(|| keyword_search::semantic_score(query, &pattern));
            Candidate { source: Source::Semantic, base_relevance, payload: Payload::Pattern(pattern) }
        })
        .collect())
}

pub fn from_skills(store: &MemoryStore, query: &str, limit: usize, vectors: &mut VectorContext) -> crate::error::RetrievalResult<Vec<Candidate>> {
    let skills = store.all_skills()?;
    let sim = match (vectors.query_embedding, vectors.skills.as_deref_mut()) {
        (Some(q), Some(idx)) => Some(similarity_scores(idx, q, limit.max(1) * 3)?),
        _ => None,
    };
    Ok(skills
        .into_iter()
        .map(|skill| {
            let base_relevance = sim
                .as_ref()
                .and_then(|m| m.get(&skill.id).copied())
                .unwrap_or_else(|| keyword_search::skills_score(query, &skill));
            Candidate { source: Source::Skills, base_relevance, payload: Payload::Skill(skill) }
        })
        .collect())
}

pub fn from_anti_patterns(
    store: &MemoryStore,
    query: &str,
    limit: usize,
    vectors: &mut VectorContext,
) -> crate::error::RetrievalResult<Vec<Candidate>> {
    let anti_patterns = store.all_anti_patterns()?;
    let sim = match (vectors.query_embedding, vectors.anti_patterns.as_deref_mut()) {
        (Some(q), Some(idx)) => Some(similarity_scores(idx, q, limit.max(1) * 3)?),
        _ => None,
    };
    Ok(anti_patterns
        .into_iter()
        .map(|anti| {
            let base_relevance = sim
                .as_ref()
                .and_then(|m| m.get(&anti.id).copied())
                .unwrap_or_else(|| keyword_search::anti_pattern_score(query, &anti));
            Candidate { source: Source::AntiPatterns, base_relevance, payload: Payload::AntiPattern(anti) }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::{Episode, Outcome};

    #[test]
    fn keyword_fallback_used_without_vector_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut episode = Episode {
            id: String::new(),
            timestamp: chrono::Utc::now(),
            actor: "eng-backend".into(),
            phase: "implementation".into(),
            goal: "wire up the retry executor".into(),
            actions: vec![],
            errors: vec![],
            outcome: Outcome::Success,
            tokens_used: 0,
            files_read: vec![],
            files_modified: vec![],
            importance: 0.5,
            access_count: 0,
            last_accessed: chrono::Utc::now(),
        };
        store.save_episode(&mut episode).unwrap();

        let mut vectors = VectorContext::default();
        let candidates = from_episodic(&store, "retry executor", 5, &mut vectors).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].base_relevance > 0.0);
    }
}
