use crate::config::BftConfig;
use crate::error::{BftError, BftResult};
use chrono::{Duration, Utc};
use loki_contracts::{FaultRecord, Reputation};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const RECENT_FAULT_WINDOW: usize = 10;
const EXCLUSION_LOOKBACK_SECONDS: i64 = 3600;

/// In-memory, JSON-backed reputation ledger. One instance per BFT system;
/// agents not yet seen are created on first access with full trust
/// (score 1.0).
pub struct ReputationStore {
    storage_path: PathBuf,
    reputations: RwLock<HashMap<String, Reputation>>,
}

impl ReputationStore {
    pub fn new(storage_path: impl Into<PathBuf>) -> BftResult<Self> {
        let store = Self {
            storage_path: storage_path.into(),
            reputations: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    /// Gets or lazily creates the reputation record for `agent_id`.
    pub fn get(&self, agent_id: &str) -> Reputation {
        if let Some(rep) = self.reputations.read().get(agent_id) {
            return rep.clone();
        }
        let rep = Reputation::new(agent_id);
        self.reputations.write().insert(agent_id.to_string(), rep.clone());
        rep
    }

    /// Applies a success or fault outcome, recomputes the score, checks
    /// exclusion on fault, and persists the updated ledger.
    pub fn update(&self, config: &BftConfig, agent_id: &str, success: bool, fault: Option<FaultRecord>) -> BftResult<()> {
        {
            let _ = self.get(agent_id);
            let mut guard = self.reputations.write();
            let rep = guard.get_mut(agent_id).expect("just inserted above");
            if success {
                rep.total_interactions += 1;
                rep.successful_interactions += 1;
                update_score(rep);
            } else if let Some(fault) = fault {
                rep.total_interactions += 1;
                rep.faults.push(fault);
                update_score(rep);
                check_exclusion(config, rep);
            }
        }
        self.save()
    }

    /// Clears the exclusion flag if the agent's score has recovered to the
    /// rehabilitation threshold. Returns whether it was rehabilitated.
    pub fn rehabilitate(&self, config: &BftConfig, agent_id: &str) -> BftResult<bool> {
        let rehabilitated = {
            let mut guard = self.reputations.write();
            match guard.get_mut(agent_id) {
                Some(rep) if rep.is_excluded && rep.score >= config.rehabilitation_threshold => {
                    rep.is_excluded = false;
                    rep.exclusion_reason = None;
                    true
                }
                _ => false,
            }
        };
        if rehabilitated {
            self.save()?;
        }
        Ok(rehabilitated)
    }

    /// Filters `agent_ids` to those neither excluded nor below
    /// `min_reputation_for_consensus`.
    pub fn eligible(&self, config: &BftConfig, agent_ids: &[String]) -> Vec<String> {
        agent_ids
            .iter()
            .filter(|id| {
                let rep = self.get(id);
                !rep.is_excluded && rep.score >= config.min_reputation_for_consensus
            })
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Reputation> {
        self.reputations.read().values().cloned().collect()
    }

    pub fn excluded(&self) -> Vec<String> {
        self.reputations
            .read()
            .values()
            .filter(|rep| rep.is_excluded)
            .map(|rep| rep.agent_id.clone())
            .collect()
    }

    fn load(&self) -> BftResult<()> {
        if !self.storage_path.exists() {
            return Ok(());
        }
        let raw = match fs::read_to_string(&self.storage_path) {
            Ok(raw) => raw,
            Err(_) => return Ok(()),
        };
        #[derive(serde::Deserialize)]
        struct OnDisk {
            reputations: Vec<Reputation>,
        }
        match serde_json::from_str::<OnDisk>(&raw) {
            Ok(parsed) => {
                let mut guard = self.reputations.write();
                for rep in parsed.reputations {
                    guard.insert(rep.agent_id.clone(), rep);
                }
            }
            Err(source) => {
                tracing::warn!(path = %self.storage_path.display(), error = %source, "corrupt reputation store, starting fresh");
            }
        }
        Ok(())
    }

    fn save(&self) -> BftResult<()> {
        let parent = self.storage_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| BftError::Io { path: parent.display().to_string(), source })?;

        #[derive(serde::Serialize)]
        struct OnDisk<'a> {
            version: &'static str,
            last_updated: chrono::DateTime<Utc>,
            reputations: Vec<&'a Reputation>,
        }
        let guard = self.reputations.read();
        let on_disk = OnDisk { version: "1.0", last_updated: Utc::now(), reputations: guard.values().collect() };

        let mut tmp = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|source| BftError::Io { path: parent.display().to_string(), source })?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &on_disk)?;
        tmp.persist(&self.storage_path).map_err(|e| BftError::Io { path: self.storage_path.display().to_string(), source: e.error })?;
        Ok(())
    }
}

/// `score = clamp(successful/total - sum(fault.severity * 0.1 for last 10 faults), 0, 1)`.
fn update_score(rep: &mut Reputation) {
    if rep.total_interactions == 0 {
        rep.score = 1.0;
        return;
    }
    let base_score = rep.successful_interactions as f64 / rep.total_interactions as f64;
    let fault_penalty: f64 = rep.faults.iter().rev().take(RECENT_FAULT_WINDOW).map(|f| f.severity * 0.1).sum();
    rep.score = (base_score - fault_penalty).clamp(0.0, 1.0);
    rep.last_updated = Utc::now();
}

/// Excludes on score below threshold, or too many faults within the last
/// hour — whichever fires first, matching the original's ordering.
fn check_exclusion(config: &BftConfig, rep: &mut Reputation) {
    if rep.score < config.exclusion_threshold {
        rep.is_excluded = true;
        rep.exclusion_reason = Some(format!("reputation score below threshold ({:.2} < {})", rep.score, config.exclusion_threshold));
        return;
    }

    let cutoff = Utc::now() - Duration::seconds(EXCLUSION_LOOKBACK_SECONDS);
    let recent_faults = rep.faults.iter().filter(|f| f.timestamp > cutoff).count();
    if recent_faults >= config.max_faults_before_exclusion {
        rep.is_excluded = true;
        rep.exclusion_reason = Some(format!("too many recent faults ({recent_faults})"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::FaultKind;

    fn fault(severity: f64) -> FaultRecord {
        FaultRecord {
            id: "fault-1".into(),
            agent_id: "agent-1".into(),
            kind: FaultKind::Timeout,
            severity,
            description: "timed out".into(),
            evidence: Default::default(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn fresh_agent_has_full_trust() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        assert_eq!(store.get("agent-1").score, 1.0);
    }

    #[test]
    fn faults_drop_score_and_can_exclude() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        for _ in 0..5 {
            store.update(&config, "agent-1", false, Some(fault(0.5))).unwrap();
        }
        let rep = store.get("agent-1");
        assert!(rep.score < config.exclusion_threshold);
        assert!(rep.is_excluded);
    }

    #[test]
    fn rehabilitation_requires_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        store.update(&config, "agent-1", false, Some(fault(1.0))).unwrap();
        assert!(store.get("agent-1").is_excluded);
        // No successes recorded yet, so the score is still 0 — not eligible.
        assert!(!store.rehabilitate(&config, "agent-1").unwrap());
        for _ in 0..10 {
            store.update(&config, "agent-1", true, None).unwrap();
        }
        assert!(store.rehabilitate(&config, "agent-1").unwrap());
        assert!(!store.get("agent-1").is_excluded);
    }

    #[test]
    fn eligible_filters_low_reputation_and_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReputationStore::new(dir.path().join("rep.json")).unwrap();
        let config = BftConfig::default();
        let _ = store.get("agent-ok");
        store.update(&config, "agent-bad", false, Some(fault(1.0))).unwrap();

        let eligible = store.eligible(&config, &["agent-ok".into(), "agent-bad".into()]);
        assert_eq!(eligible, vec!["agent-ok".to_string()]);
    }
}
