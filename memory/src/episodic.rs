use crate::atomic::{atomic_write_json, load_json};
use crate::error::{MemoryError, MemoryResult};
use crate::importance::boost_on_retrieval;
use crate::paths::EPISODIC_DIR;
use crate::store::MemoryStore;
use chrono::{DateTime, Utc};
use loki_contracts::{generate_id, Episode, IdPrefix};
use std::fs;
use std::path::PathBuf;

fn episode_file_name(id: &str) -> String {
    format!("task-{}.json", id)
}

impl MemoryStore {
    /// Stores an episode under `episodic/<date>/task-<id>.json`, assigning
    /// an id if the caller didn't supply one. The date directory is derived
    /// from the episode's own timestamp, not the write time.
    pub fn save_episode(&self, episode: &mut Episode) -> MemoryResult<String> {
        if episode.id.is_empty() {
            episode.id = generate_id(IdPrefix::Episode);
        }
        let date_str = episode.timestamp.format("%Y-%m-%d").to_string();
        let dir = self.base_path().join(EPISODIC_DIR).join(&date_str);
        fs::create_dir_all(&dir).map_err(|source| MemoryError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(episode_file_name(&episode.id));
        atomic_write_json(&path, episode, "episode")?;
        Ok(episode.id.clone())
    }

    /// Looks an episode up by id, scanning every date directory. Episode
    /// ids embed no date, so the search is the only option without a
    /// secondary index.
    pub fn load_episode(&self, id: &str) -> MemoryResult<Option<Episode>> {
        for date_dir in self.episodic_date_dirs()? {
            let path = date_dir.join(episode_file_name(id));
            if path.exists() {
                return load_json(&path, "episode");
            }
        }
        Ok(None)
    }

    /// Lists episode ids, newest date directory first, optionally filtered
    /// to dates on/after `since` (compared at day granularity), truncated
    /// to `limit`.
    pub fn list_episodes(&self, since: Option<DateTime<Utc>>, limit: usize) -> MemoryResult<Vec<String>> {
        let mut date_dirs = self.episodic_date_dirs()?;
        date_dirs.sort_by(|a, b| b.cmp(a));

        let since_date = since.map(|dt| dt.format("%Y-%m-%d").to_string());

        let mut ids = Vec::new();
        for date_dir in date_dirs {
            let dir_name = date_dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            if let Some(since_date) = &since_date {
                if &dir_name < since_date {
                    continue;
                }
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&date_dir)
                .map_err(|source| MemoryError::Io {
                    path: date_dir.display().to_string(),
                    source,
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with("task-") && n.ends_with(".json"))
                        .unwrap_or(false)
                })
                .collect();
            files.sort_by(|a, b| b.cmp(a));

            for file in files {
                let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                ids.push(stem.trim_start_matches("task-").to_string());
                if ids.len() >= limit {
                    return Ok(ids);
                }
            }
        }
        Ok(ids)
    }

    /// Loads full episodes newest-date-first, truncated to `limit` — the
    /// retrieval engine's way of scanning candidates without a secondary
    /// index.
    pub fn all_episodes(&self, since: Option<DateTime<Utc>>, limit: usize) -> MemoryResult<Vec<Episode>> {
        let ids = self.list_episodes(since, limit)?;
        let mut episodes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(episode) = self.load_episode(&id)? {
                episodes.push(episode);
            }
        }
        Ok(episodes)
    }

    /// Deletes an episode by id across whichever date directory holds it,
    /// removing the directory too if it's left empty.
    pub fn delete_episode(&self, id: &str) -> MemoryResult<bool> {
        for date_dir in self.episodic_date_dirs()? {
            let path = date_dir.join(episode_file_name(id));
            if path.exists() {
                fs::remove_file(&path).map_err(|source| MemoryError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let lock_path = path.with_extension("json.lock");
                let _ = fs::remove_file(lock_path);
                if fs::read_dir(&date_dir).map(|mut d| d.next().is_none()).unwrap_or(false) {
                    let _ = fs::remove_dir(&date_dir);
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Applies the retrieval boost to an episode's importance and refreshes
    /// its access tracking, persisting the change in place.
    pub fn boost_episode_on_retrieval(&self, id: &str, boost: f64) -> MemoryResult<Option<Episode>> {
        let Some(mut episode) = self.load_episode(id)? else {
            return Ok(None);
        };
        episode.importance = boost_on_retrieval(episode.importance, boost);
        episode.access_count += 1;
        episode.last_accessed = Utc::now();
        self.save_episode(&mut episode)?;
        Ok(Some(episode))
    }

    fn episodic_date_dirs(&self) -> MemoryResult<Vec<PathBuf>> {
        let episodic_dir = self.base_path().join(EPISODIC_DIR);
        if !episodic_dir.exists() {
            return Ok(Vec::new());
        }
        let dirs = fs::read_dir(&episodic_dir)
            .map_err(|source| MemoryError::Io {
                path: episodic_dir.display().to_string(),
                source,
            })?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.path())
            .collect();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use loki_contracts::Outcome;

    fn sample_episode(id: &str, ts: DateTime<Utc>) -> Episode {
        Episode {
            id: id.to_string(),
            timestamp: ts,
            actor: "eng-backend".to_string(),
            phase: "implementation".to_string(),
            goal: "wire up the retry executor".to_string(),
            actions: vec!["read retry.rs".to_string()],
            errors: vec![],
            outcome: Outcome::Success,
            tokens_used: 512,
            files_read: vec![],
            files_modified: vec![],
            importance: 0.5,
            access_count: 0,
            last_accessed: ts,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 7, 20, 12, 0, 0).unwrap();
        let mut episode = sample_episode("", ts);

        let id = store.save_episode(&mut episode).unwrap();
        assert!(!id.is_empty());

        let loaded = store.load_episode(&id).unwrap().expect("episode present");
        assert_eq!(loaded.goal, episode.goal);
    }

    #[test]
    fn list_episodes_newest_date_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();

        let mut early = sample_episode("ep-early", Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let mut late = sample_episode("ep-late", Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        store.save_episode(&mut early).unwrap();
        store.save_episode(&mut late).unwrap();

        let ids = store.list_episodes(None, 10).unwrap();
        assert_eq!(ids[0], "ep-late");
        assert_eq!(ids[1], "ep-early");
    }

    #[test]
    fn delete_removes_file_and_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut episode = sample_episode("ep-del", Utc::now());
        store.save_episode(&mut episode).unwrap();

        assert!(store.delete_episode("ep-del").unwrap());
        assert!(store.load_episode("ep-del").unwrap().is_none());
        assert!(!store.delete_episode("ep-del").unwrap());
    }

    #[test]
    fn boost_increments_access_and_importance() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();
        let mut episode = sample_episode("ep-boost", Utc::now());
        episode.importance = 0.5;
        store.save_episode(&mut episode).unwrap();

        let boosted = store.boost_episode_on_retrieval("ep-boost", 0.1).unwrap().unwrap();
        assert_eq!(boosted.access_count, 1);
        assert!(boosted.importance > 0.5);
    }
}
