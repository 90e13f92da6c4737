use crate::error::{MemoryError, MemoryResult};
use crate::paths::{EPISODIC_DIR, SEMANTIC_DIR, SKILLS_DIR};
use crate::store::MemoryStore;
use loki_contracts::Namespace;
use std::collections::HashSet;
use std::fs;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub episode_count: u64,
    pub pattern_count: u64,
    pub skill_count: u64,
    pub total_count: u64,
    pub path: String,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TransferCounts {
    pub episodes: u64,
    pub patterns: u64,
    pub skills: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferScope {
    pub episodes: bool,
    pub patterns: bool,
    pub skills: bool,
}

impl Default for TransferScope {
    fn default() -> Self {
        Self {
            episodes: true,
            patterns: true,
            skills: true,
        }
    }
}

impl MemoryStore {
    /// Lists every namespace directory under the root that looks like a
    /// memory tree (has at least one of episodic/semantic/skills), plus the
    /// default namespace if the root itself holds memory directly.
    pub fn list_namespaces(&self) -> MemoryResult<Vec<String>> {
        let mut namespaces = Vec::new();
        let root = self.root();

        if root.exists() {
            for entry in fs::read_dir(root).map_err(|source| MemoryError::Io {
                path: root.display().to_string(),
                source,
            })? {
                let entry = entry.map_err(|source| MemoryError::Io {
                    path: root.display().to_string(),
                    source,
                })?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                if !path.is_dir() || name.starts_with('.') {
                    continue;
                }
                let looks_like_namespace = [EPISODIC_DIR, SEMANTIC_DIR, SKILLS_DIR]
                    .iter()
                    .any(|sub| path.join(sub).exists());
                if looks_like_namespace {
                    namespaces.push(name);
                }
            }
        }

        let has_root_memory = [EPISODIC_DIR, SEMANTIC_DIR, SKILLS_DIR]
            .iter()
            .any(|sub| root.join(sub).exists());
        let default_name = Namespace::default_namespace().as_str().to_string();
        if has_root_memory && !namespaces.contains(&default_name) {
            namespaces.insert(0, default_name);
        }

        namespaces.sort();
        Ok(namespaces)
    }

    pub fn namespace_stats(&self) -> MemoryResult<NamespaceStats> {
        let base = self.base_path();

        let mut episode_count = 0u64;
        let episodic_dir = base.join(EPISODIC_DIR);
        if episodic_dir.exists() {
            for entry in fs::read_dir(&episodic_dir).map_err(|source| MemoryError::Io {
                path: episodic_dir.display().to_string(),
                source,
            })? {
                let date_dir = entry
                    .map_err(|source| MemoryError::Io {
                        path: episodic_dir.display().to_string(),
                        source,
                    })?
                    .path();
                if !date_dir.is_dir() {
                    continue;
                }
                episode_count += fs::read_dir(&date_dir)
                    .map(|rd| {
                        rd.filter_map(|e| e.ok())
                            .filter(|e| {
                                let n = e.file_name();
                                let n = n.to_string_lossy();
                                n.starts_with("task-") && n.ends_with(".json")
                            })
                            .count() as u64
                    })
                    .unwrap_or(0);
            }
        }

        let pattern_count = self.list_patterns(None)?.len() as u64;
        let skill_count = self.list_skills()?.len() as u64;

        Ok(NamespaceStats {
            namespace: self.namespace().as_str().to_string(),
            episode_count,
            pattern_count,
            skill_count,
            total_count: episode_count + pattern_count + skill_count,
            path: base.display().to_string(),
        })
    }

    /// Copies this namespace's memories into `target`, returning per-tier
    /// counts of items actually copied.
    pub fn copy_to_namespace(&self, target_namespace: Namespace, scope: TransferScope) -> MemoryResult<TransferCounts> {
        let target = self.with_namespace(target_namespace)?;
        let mut copied = TransferCounts::default();

        if scope.episodes {
            for id in self.list_episodes(None, 10_000)? {
                if let Some(mut episode) = self.load_episode(&id)? {
                    target.save_episode(&mut episode)?;
                    copied.episodes += 1;
                }
            }
        }
        if scope.patterns {
            for id in self.list_patterns(None)? {
                if let Some(mut pattern) = self.load_pattern(&id)? {
                    target.save_pattern(&mut pattern)?;
                    copied.patterns += 1;
                }
            }
        }
        if scope.skills {
            for id in self.list_skills()? {
                if let Some(mut skill) = self.load_skill(&id)? {
                    target.save_skill(&mut skill)?;
                    copied.skills += 1;
                }
            }
        }
        Ok(copied)
    }

    /// Merges memories from `source_namespace` into this namespace,
    /// optionally skipping ids that already exist here.
    pub fn merge_from_namespace(&self, source_namespace: Namespace, deduplicate: bool) -> MemoryResult<TransferCounts> {
        let source = self.with_namespace(source_namespace)?;
        let mut merged = TransferCounts::default();

        let existing_episodes: HashSet<String> = if deduplicate {
            self.list_episodes(None, 10_000)?.into_iter().collect()
        } else {
            HashSet::new()
        };
        let existing_patterns: HashSet<String> = if deduplicate {
            self.list_patterns(None)?.into_iter().collect()
        } else {
            HashSet::new()
        };
        let existing_skills: HashSet<String> = if deduplicate {
            self.list_skills()?.into_iter().collect()
        } else {
            HashSet::new()
        };

        for id in source.list_episodes(None, 10_000)? {
            if existing_episodes.contains(&id) {
                continue;
            }
            if let Some(mut episode) = source.load_episode(&id)? {
                self.save_episode(&mut episode)?;
                merged.episodes += 1;
            }
        }
        for id in source.list_patterns(None)? {
            if existing_patterns.contains(&id) {
                continue;
            }
            if let Some(mut pattern) = source.load_pattern(&id)? {
                self.save_pattern(&mut pattern)?;
                merged.patterns += 1;
            }
        }
        for id in source.list_skills()? {
            if existing_skills.contains(&id) {
                continue;
            }
            if let Some(mut skill) = source.load_skill(&id)? {
                self.save_skill(&mut skill)?;
                merged.skills += 1;
            }
        }

        Ok(merged)
    }
}
