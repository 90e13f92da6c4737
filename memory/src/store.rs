use crate::error::MemoryResult;
use crate::paths::{namespace_base, EPISODIC_DIR, SEMANTIC_DIR, SKILLS_DIR, VECTORS_DIR};
use loki_contracts::Namespace;
use std::fs;
use std::path::PathBuf;

/// Storage backend for the three memory tiers. Atomic per-file writes and
/// namespace isolation live here; retrieval scoring lives in `loki-retrieval`.
pub struct MemoryStore {
    root: PathBuf,
    namespace: Namespace,
}

impl MemoryStore {
    /// Opens (creating if needed) a store rooted at `root`, in the default
    /// namespace.
    pub fn new(root: impl Into<PathBuf>) -> MemoryResult<Self> {
        let store = Self {
            root: root.into(),
            namespace: Namespace::default_namespace(),
        };
        store.ensure_directories()?;
        Ok(store)
    }

    /// Returns a handle to the same root under a different namespace.
    pub fn with_namespace(&self, namespace: Namespace) -> MemoryResult<Self> {
        let store = Self {
            root: self.root.clone(),
            namespace,
        };
        store.ensure_directories()?;
        Ok(store)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn base_path(&self) -> PathBuf {
        namespace_base(&self.root, &self.namespace)
    }

    pub(crate) fn ensure_directories(&self) -> MemoryResult<()> {
        let base = self.base_path();
        for dir in [EPISODIC_DIR, SEMANTIC_DIR, SKILLS_DIR, VECTORS_DIR] {
            fs::create_dir_all(base.join(dir)).map_err(|source| crate::error::MemoryError::Io {
                path: base.join(dir).display().to_string(),
                source,
            })?;
        }
        Ok(())
    }
}
