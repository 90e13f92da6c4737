use crate::atomic::{atomic_write_json, load_json};
use crate::error::{MemoryError, MemoryResult};
use crate::paths::SKILLS_DIR;
use crate::store::MemoryStore;
use chrono::Utc;
use loki_contracts::{generate_id, IdPrefix, Skill};
use std::fs;

fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl MemoryStore {
    /// Saves a skill under `skills/<sanitized-name>.json`, falling back to
    /// the id as the filename when no name is set.
    pub fn save_skill(&self, skill: &mut Skill) -> MemoryResult<String> {
        if skill.id.is_empty() {
            skill.id = generate_id(IdPrefix::Skill);
        }
        let filename_source = if skill.name.is_empty() { &skill.id } else { &skill.name };
        let path = self
            .base_path()
            .join(SKILLS_DIR)
            .join(format!("{}.json", sanitize_filename(filename_source)));
        atomic_write_json(&path, skill, "skill")?;
        Ok(skill.id.clone())
    }

    /// Skill files are keyed by sanitized name, not id, so lookup by id
    /// scans every file in the directory.
    pub fn load_skill(&self, id: &str) -> MemoryResult<Option<Skill>> {
        let dir = self.base_path().join(SKILLS_DIR);
        if !dir.exists() {
            return Ok(None);
        }
        for entry in fs::read_dir(&dir).map_err(|source| MemoryError::Io {
            path: dir.display().to_string(),
            source,
        })? {
            let path = entry
                .map_err(|source| MemoryError::Io {
                    path: dir.display().to_string(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(skill) = load_json::<Skill>(&path, "skill")? {
                if skill.id == id {
                    return Ok(Some(skill));
                }
            }
        }
        Ok(None)
    }

    pub fn list_skills(&self) -> MemoryResult<Vec<String>> {
        let dir = self.base_path().join(SKILLS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| MemoryError::Io {
            path: dir.display().to_string(),
            source,
        })? {
            let path = entry
                .map_err(|source| MemoryError::Io {
                    path: dir.display().to_string(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(skill) = load_json::<Skill>(&path, "skill")? {
                ids.push(skill.id);
            }
        }
        Ok(ids)
    }

    /// Loads every skill in the namespace.
    pub fn all_skills(&self) -> MemoryResult<Vec<Skill>> {
        let dir = self.base_path().join(SKILLS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut skills = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|source| MemoryError::Io {
            path: dir.display().to_string(),
            source,
        })? {
            let path = entry
                .map_err(|source| MemoryError::Io {
                    path: dir.display().to_string(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(skill) = load_json::<Skill>(&path, "skill")? {
                skills.push(skill);
            }
        }
        Ok(skills)
    }

    pub fn boost_skill_on_retrieval(&self, id: &str, boost: f64) -> MemoryResult<Option<Skill>> {
        let Some(mut skill) = self.load_skill(id)? else {
            return Ok(None);
        };
        skill.importance = crate::importance::boost_on_retrieval(skill.importance, boost);
        skill.last_used = Utc::now();
        self.save_skill(&mut skill)?;
        Ok(Some(skill))
    }
}
