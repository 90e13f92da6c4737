use crate::atomic::{atomic_write_json, load_json};
use crate::error::MemoryResult;
use crate::paths::{ANTI_PATTERNS_FILE, SEMANTIC_DIR, PATTERNS_FILE};
use crate::store::MemoryStore;
use chrono::Utc;
use loki_contracts::{generate_id, AntiPattern, IdPrefix, Pattern};
use serde::{Deserialize, Serialize};

const STORE_VERSION: &str = "1.1.0";

#[derive(Debug, Serialize, Deserialize)]
struct PatternsFile {
    version: String,
    last_updated: chrono::DateTime<Utc>,
    patterns: Vec<Pattern>,
}

impl Default for PatternsFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            last_updated: Utc::now(),
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AntiPatternsFile {
    version: String,
    last_updated: chrono::DateTime<Utc>,
    anti_patterns: Vec<AntiPattern>,
}

impl Default for AntiPatternsFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            last_updated: Utc::now(),
            anti_patterns: Vec::new(),
        }
    }
}

impl MemoryStore {
    fn patterns_path(&self) -> std::path::PathBuf {
        self.base_path().join(SEMANTIC_DIR).join(PATTERNS_FILE)
    }

    fn anti_patterns_path(&self) -> std::path::PathBuf {
        self.base_path().join(SEMANTIC_DIR).join(ANTI_PATTERNS_FILE)
    }

    /// Upserts a pattern into the single per-namespace patterns file,
    /// assigning an id if the caller didn't supply one.
    pub fn save_pattern(&self, pattern: &mut Pattern) -> MemoryResult<String> {
        if pattern.id.is_empty() {
            pattern.id = generate_id(IdPrefix::Pattern);
        }
        let path = self.patterns_path();
        let mut file: PatternsFile = load_json(&path, "patterns")?.unwrap_or_default();

        if let Some(existing) = file.patterns.iter_mut().find(|p| p.id == pattern.id) {
            *existing = pattern.clone();
        } else {
            file.patterns.push(pattern.clone());
        }
        file.last_updated = Utc::now();
        atomic_write_json(&path, &file, "patterns")?;
        Ok(pattern.id.clone())
    }

    pub fn load_pattern(&self, id: &str) -> MemoryResult<Option<Pattern>> {
        let file: Option<PatternsFile> = load_json(&self.patterns_path(), "patterns")?;
        Ok(file.and_then(|f| f.patterns.into_iter().find(|p| p.id == id)))
    }

    pub fn list_patterns(&self, category: Option<&str>) -> MemoryResult<Vec<String>> {
        let file: Option<PatternsFile> = load_json(&self.patterns_path(), "patterns")?;
        Ok(file
            .map(|f| {
                f.patterns
                    .into_iter()
                    .filter(|p| category.map(|c| p.category == c).unwrap_or(true))
                    .map(|p| p.id)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Loads every pattern in the namespace, optionally filtered by category.
    pub fn all_patterns(&self, category: Option<&str>) -> MemoryResult<Vec<Pattern>> {
        let file: Option<PatternsFile> = load_json(&self.patterns_path(), "patterns")?;
        Ok(file
            .map(|f| {
                f.patterns
                    .into_iter()
                    .filter(|p| category.map(|c| p.category == c).unwrap_or(true))
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Applies the retrieval boost to a pattern's importance and bumps its
    /// usage tracking. Returns `Ok(None)` if the pattern doesn't exist.
    pub fn boost_pattern_on_retrieval(&self, id: &str, boost: f64) -> MemoryResult<Option<Pattern>> {
        let path = self.patterns_path();
        let mut file: PatternsFile = match load_json(&path, "patterns")? {
            Some(f) => f,
            None => return Ok(None),
        };
        let Some(pattern) = file.patterns.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        pattern.importance = crate::importance::boost_on_retrieval(pattern.importance, boost);
        pattern.usage_count += 1;
        pattern.last_used = Utc::now();
        let updated = pattern.clone();
        file.last_updated = Utc::now();
        atomic_write_json(&path, &file, "patterns")?;
        Ok(Some(updated))
    }

    /// Saves an anti-pattern the same way patterns are upserted.
    pub fn save_anti_pattern(&self, anti: &mut AntiPattern) -> MemoryResult<String> {
        if anti.id.is_empty() {
            anti.id = generate_id(IdPrefix::AntiPattern);
        }
        let path = self.anti_patterns_path();
        let mut file: AntiPatternsFile = load_json(&path, "anti_patterns")?.unwrap_or_default();

        if let Some(existing) = file.anti_patterns.iter_mut().find(|p| p.id == anti.id) {
            *existing = anti.clone();
        } else {
            file.anti_patterns.push(anti.clone());
        }
        file.last_updated = Utc::now();
        atomic_write_json(&path, &file, "anti_patterns")?;
        Ok(anti.id.clone())
    }

    pub fn load_anti_pattern(&self, id: &str) -> MemoryResult<Option<AntiPattern>> {
        let file: Option<AntiPatternsFile> = load_json(&self.anti_patterns_path(), "anti_patterns")?;
        Ok(file.and_then(|f| f.anti_patterns.into_iter().find(|p| p.id == id)))
    }

    pub fn list_anti_patterns(&self) -> MemoryResult<Vec<String>> {
        let file: Option<AntiPatternsFile> = load_json(&self.anti_patterns_path(), "anti_patterns")?;
        Ok(file
            .map(|f| f.anti_patterns.into_iter().map(|p| p.id).collect())
            .unwrap_or_default())
    }

    /// Loads every anti-pattern in the namespace.
    pub fn all_anti_patterns(&self) -> MemoryResult<Vec<AntiPattern>> {
        let file: Option<AntiPatternsFile> = load_json(&self.anti_patterns_path(), "anti_patterns")?;
        Ok(file.map(|f| f.anti_patterns).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pattern() -> Pattern {
        Pattern {
            id: String::new(),
            pattern: "retry transient IO with backoff".to_string(),
            category: "resilience".to_string(),
            correct_approach: "use the retry executor".to_string(),
            incorrect_approach: "loop with a fixed sleep".to_string(),
            confidence: 0.8,
            source_episodes: vec![],
            usage_count: 0,
            last_used: Utc::now(),
            importance: 0.5,
        }
    }

    #[test]
    fn save_is_upsert_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut pattern = sample_pattern();

        let id = store.save_pattern(&mut pattern).unwrap();
        pattern.confidence = 0.95;
        store.save_pattern(&mut pattern).unwrap();

        let loaded = store.load_pattern(&id).unwrap().unwrap();
        assert_eq!(loaded.confidence, 0.95);
        assert_eq!(store.list_patterns(None).unwrap().len(), 1);
    }

    #[test]
    fn list_filters_by_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut a = sample_pattern();
        a.category = "resilience".to_string();
        let mut b = sample_pattern();
        b.category = "testing".to_string();
        store.save_pattern(&mut a).unwrap();
        store.save_pattern(&mut b).unwrap();

        assert_eq!(store.list_patterns(Some("testing")).unwrap().len(), 1);
    }

    #[test]
    fn boost_bumps_usage_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut pattern = sample_pattern();
        let id = store.save_pattern(&mut pattern).unwrap();

        let boosted = store.boost_pattern_on_retrieval(&id, 0.1).unwrap().unwrap();
        assert_eq!(boosted.usage_count, 1);
    }
}
