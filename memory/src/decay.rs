use crate::error::MemoryResult;
use crate::importance::apply_decay;
use crate::store::MemoryStore;
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayTier {
    Episodic,
    Semantic,
    Skills,
    All,
}

impl MemoryStore {
    /// Sweeps a tier (or all three) and rewrites the importance of every
    /// entity whose decayed value actually changed, returning the count of
    /// entities touched. A no-op sweep touches nothing on disk.
    pub fn batch_apply_decay(&self, tier: DecayTier, decay_rate: f64, half_life_days: f64) -> MemoryResult<u64> {
        let mut updated = 0;
        if matches!(tier, DecayTier::Episodic | DecayTier::All) {
            updated += self.decay_episodic(decay_rate, half_life_days)?;
        }
        if matches!(tier, DecayTier::Semantic | DecayTier::All) {
            updated += self.decay_semantic(decay_rate, half_life_days)?;
        }
        if matches!(tier, DecayTier::Skills | DecayTier::All) {
            updated += self.decay_skills(decay_rate, half_life_days)?;
        }
        Ok(updated)
    }

    fn decay_episodic(&self, decay_rate: f64, half_life_days: f64) -> MemoryResult<u64> {
        let mut updated = 0;
        let now = Utc::now();
        for id in self.list_episodes(None, usize::MAX)? {
            let Some(mut episode) = self.load_episode(&id)? else {
                continue;
            };
            let decayed = apply_decay(episode.importance, episode.last_accessed, now, decay_rate, half_life_days);
            if (decayed - episode.importance).abs() > f64::EPSILON {
                episode.importance = decayed;
                self.save_episode(&mut episode)?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn decay_semantic(&self, decay_rate: f64, half_life_days: f64) -> MemoryResult<u64> {
        let mut updated = 0;
        let now = Utc::now();
        for id in self.list_patterns(None)? {
            let Some(mut pattern) = self.load_pattern(&id)? else {
                continue;
            };
            let decayed = apply_decay(pattern.importance, pattern.last_used, now, decay_rate, half_life_days);
            if (decayed - pattern.importance).abs() > f64::EPSILON {
                pattern.importance = decayed;
                self.save_pattern(&mut pattern)?;
                updated += 1;
            }
        }
        for id in self.list_anti_patterns()? {
            let Some(mut anti) = self.load_anti_pattern(&id)? else {
                continue;
            };
            let decayed = apply_decay(anti.importance, anti.last_used, now, decay_rate, half_life_days);
            if (decayed - anti.importance).abs() > f64::EPSILON {
                anti.importance = decayed;
                self.save_anti_pattern(&mut anti)?;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn decay_skills(&self, decay_rate: f64, half_life_days: f64) -> MemoryResult<u64> {
        let mut updated = 0;
        let now = Utc::now();
        for id in self.list_skills()? {
            let Some(mut skill) = self.load_skill(&id)? else {
                continue;
            };
            let decayed = apply_decay(skill.importance, skill.last_used, now, decay_rate, half_life_days);
            if (decayed - skill.importance).abs() > f64::EPSILON {
                skill.importance = decayed;
                self.save_skill(&mut skill)?;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use loki_contracts::Outcome;

    #[test]
    fn sweep_only_rewrites_changed_entities() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path()).unwrap();

        let old_ts = Utc::now() - Duration::days(400);
        let mut stale = loki_contracts::Episode {
            id: String::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            actor: "eng-backend".into(),
            phase: "implementation".into(),
            goal: "stale work".into(),
            actions: vec![],
            errors: vec![],
            outcome: Outcome::Success,
            tokens_used: 0,
            files_read: vec![],
            files_modified: vec![],
            importance: 0.9,
            access_count: 0,
            last_accessed: old_ts,
        };
        store.save_episode(&mut stale).unwrap();

        let mut fresh = stale.clone();
        fresh.id = String::new();
        fresh.last_accessed = Utc::now();
        store.save_episode(&mut fresh).unwrap();

        let updated = store.batch_apply_decay(DecayTier::Episodic, 0.1, 30.0).unwrap();
        assert_eq!(updated, 1);
    }
}
