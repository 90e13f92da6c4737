use crate::error::{VectorIndexError, VectorIndexResult};
use serde_json::Value;
use std::collections::HashMap;

/// Default embedding width, matching common sentence-transformer output
/// (e.g. MiniLM) sizes.
pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
    pub metadata: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub count: usize,
    pub dimension: usize,
    pub memory_bytes: usize,
}

/// In-memory cosine-similarity index over fixed-width float vectors.
///
/// Cosine ranking normalizes copies of the stored vectors lazily and caches
/// them until the next mutation — the originals are never rescaled in
/// place, so repeated searches never drift from what callers added.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: usize,
    embeddings: Vec<Vec<f32>>,
    ids: Vec<String>,
    metadata: Vec<Value>,
    id_to_index: HashMap<String, usize>,
    normalized_cache: Option<Vec<Vec<f32>>>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            embeddings: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            id_to_index: HashMap::new(),
            normalized_cache: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.id_to_index.contains_key(id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn metadata_for(&self, id: &str) -> Option<&Value> {
        self.id_to_index.get(id).map(|&i| &self.metadata[i])
    }

    fn check_dimension(&self, embedding: &[f32]) -> VectorIndexResult<()> {
        if embedding.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        Ok(())
    }

    /// Adds a vector, updating in place if `id` already exists.
    pub fn add(&mut self, id: impl Into<String>, embedding: Vec<f32>, metadata: Option<Value>) -> VectorIndexResult<()> {
        self.check_dimension(&embedding)?;
        let id = id.into();

        if let Some(&index) = self.id_to_index.get(&id) {
            self.embeddings[index] = embedding;
            if let Some(metadata) = metadata {
                self.metadata[index] = metadata;
            }
            self.normalized_cache = None;
            return Ok(());
        }

        self.embeddings.push(embedding);
        self.metadata.push(metadata.unwrap_or(Value::Object(Default::default())));
        self.id_to_index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.normalized_cache = None;
        Ok(())
    }

    pub fn add_batch(
        &mut self,
        ids: Vec<String>,
        embeddings: Vec<Vec<f32>>,
        metadata: Option<Vec<Value>>,
    ) -> VectorIndexResult<()> {
        if ids.len() != embeddings.len() {
            return Err(VectorIndexError::BatchLengthMismatch {
                ids: ids.len(),
                embeddings: embeddings.len(),
            });
        }
        if let Some(metadata) = &metadata {
            if metadata.len() != embeddings.len() {
                return Err(VectorIndexError::MetadataLengthMismatch {
                    embeddings: embeddings.len(),
                    metadata: metadata.len(),
                });
            }
        }

        for (i, (id, embedding)) in ids.into_iter().zip(embeddings).enumerate() {
            let meta = metadata.as_ref().map(|m| m[i].clone());
            self.add(id, embedding, meta)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let Some(index) = self.id_to_index.remove(id) else {
            return false;
        };
        self.embeddings.remove(index);
        self.ids.remove(index);
        self.metadata.remove(index);
        self.rebuild_id_index();
        self.normalized_cache = None;
        true
    }

    pub fn update(&mut self, id: &str, embedding: Option<Vec<f32>>, metadata: Option<Value>) -> VectorIndexResult<bool> {
        let Some(&index) = self.id_to_index.get(id) else {
            return Ok(false);
        };
        if let Some(embedding) = embedding {
            self.check_dimension(&embedding)?;
            self.embeddings[index] = embedding;
            self.normalized_cache = None;
        }
        if let Some(metadata) = metadata {
            self.metadata[index] = metadata;
        }
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.embeddings.clear();
        self.ids.clear();
        self.metadata.clear();
        self.id_to_index.clear();
        self.normalized_cache = None;
    }

    fn rebuild_id_index(&mut self) {
        self.id_to_index = self.ids.iter().cloned().zip(0..).collect();
    }

    fn normalized(&mut self) -> &[Vec<f32>] {
        if self.normalized_cache.is_none() {
            let normalized = self
                .embeddings
                .iter()
                .map(|v| {
                    let norm = l2_norm(v);
                    if norm > 0.0 {
                        v.iter().map(|x| x / norm).collect()
                    } else {
                        v.clone()
                    }
                })
                .collect();
            self.normalized_cache = Some(normalized);
        }
        self.normalized_cache.as_ref().unwrap()
    }

    /// Finds the `top_k` closest vectors by cosine similarity, optionally
    /// filtered by metadata. Results are sorted by descending score.
    pub fn search(
        &mut self,
        query: &[f32],
        top_k: usize,
        filter: Option<&dyn Fn(&Value) -> bool>,
    ) -> VectorIndexResult<Vec<SearchHit>> {
        if self.embeddings.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query)?;

        let query_norm = l2_norm(query);
        let query_normalized: Vec<f32> = if query_norm > 0.0 {
            query.iter().map(|x| x / (query_norm + 1e-10)).collect()
        } else {
            query.to_vec()
        };

        let ids = self.ids.clone();
        let metadata = self.metadata.clone();
        let normalized = self.normalized();

        let mut hits: Vec<SearchHit> = normalized
            .iter()
            .enumerate()
            .filter_map(|(i, vec)| {
                let meta = &metadata[i];
                if let Some(filter) = filter {
                    if !filter(meta) {
                        return None;
                    }
                }
                let score = dot(vec, &query_normalized);
                Some(SearchHit {
                    id: ids[i].clone(),
                    score,
                    metadata: meta.clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    pub fn stats(&self) -> IndexStats {
        let embedding_bytes = self.embeddings.len() * self.dimension * 4;
        let id_bytes: usize = self.ids.iter().map(|id| id.len()).sum();
        let metadata_bytes: usize = self
            .metadata
            .iter()
            .map(|m| serde_json::to_string(m).map(|s| s.len()).unwrap_or(0))
            .sum();
        IndexStats {
            count: self.embeddings.len(),
            dimension: self.dimension,
            memory_bytes: embedding_bytes + id_bytes + metadata_bytes,
        }
    }

    pub(crate) fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    pub(crate) fn metadata(&self) -> &[Value] {
        &self.metadata
    }

    pub(crate) fn from_parts(dimension: usize, ids: Vec<String>, embeddings: Vec<Vec<f32>>, metadata: Vec<Value>) -> Self {
        let mut index = Self {
            dimension,
            embeddings,
            ids,
            metadata,
            id_to_index: HashMap::new(),
            normalized_cache: None,
        };
        index.rebuild_id_index();
        index
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_search_ranks_by_cosine_similarity() {
        let mut index = VectorIndex::new(3);
        index.add("a", vec![1.0, 0.0, 0.0], None).unwrap();
        index.add("b", vec![0.0, 1.0, 0.0], None).unwrap();
        index.add("c", vec![0.9, 0.1, 0.0], None).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2, None).unwrap();
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[1].id, "c");
    }

    #[test]
    fn adding_duplicate_id_updates_in_place() {
        let mut index = VectorIndex::new(2);
        index.add("x", vec![1.0, 0.0], None).unwrap();
        index.add("x", vec![0.0, 1.0], None).unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.search(&[0.0, 1.0], 1, None).unwrap();
        assert_eq!(hits[0].score, 1.0);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = VectorIndex::new(3);
        let err = index.add("a", vec![1.0, 0.0], None).unwrap_err();
        assert!(matches!(err, VectorIndexError::DimensionMismatch { .. }));
    }

    #[test]
    fn remove_drops_entry_and_rebuilds_lookup() {
        let mut index = VectorIndex::new(2);
        index.add("a", vec![1.0, 0.0], None).unwrap();
        index.add("b", vec![0.0, 1.0], None).unwrap();

        assert!(index.remove("a"));
        assert!(!index.contains("a"));
        assert!(index.contains("b"));
        assert!(!index.remove("a"));
    }

    #[test]
    fn search_respects_metadata_filter() {
        let mut index = VectorIndex::new(2);
        index.add("a", vec![1.0, 0.0], Some(serde_json::json!({"kind": "pattern"}))).unwrap();
        index.add("b", vec![1.0, 0.0], Some(serde_json::json!({"kind": "episode"}))).unwrap();

        let filter: &dyn Fn(&Value) -> bool = &|m| m.get("kind").and_then(|v| v.as_str()) == Some("episode");
        let hits = index.search(&[1.0, 0.0], 10, Some(filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }
}
