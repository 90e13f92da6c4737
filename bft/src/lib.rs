//! Byzantine fault tolerance for the swarm: PBFT-lite consensus, per-agent
//! reputation, HMAC-authenticated messages, and fault detection.
//!
//! The system tolerates `f` faulty agents out of `n` total where `n > 3f`
//! (e.g. 4 agents can tolerate 1 fault).
//!
//! ```ignore
//! let bft = Bft::new(".loki", BftConfig::default(), b"shared-secret".to_vec())?;
//! let outcome = bft.run_consensus("proposal-1", json!("rust"), &participants, None, None)?;
//! if outcome.consensus_reached {
//!     println!("consensus on {:?}", outcome.value);
//! }
//! ```

pub mod auth;
pub mod config;
pub mod consensus;
pub mod cross_check;
pub mod delegate;
pub mod error;
pub mod fault;
pub mod reputation;
pub mod vote;

pub use auth::AuthenticatedMessage;
pub use config::BftConfig;
pub use consensus::ConsensusOutcome;
pub use cross_check::DEFAULT_MIN_AGREEMENT;
pub use delegate::DelegationOutcome;
pub use error::{BftError, BftResult};
pub use vote::{Vote, VoteOutcome};

use auth::NonceTracker;
use dashmap::DashMap;
use fault::VoteHistory;
use loki_contracts::{Agent, ConsensusRound, FaultRecord, Reputation, VoteChoice};
use parking_lot::RwLock;
use reputation::ReputationStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Used when no secret key is supplied — fine for local/dev runs, but any
/// production deployment should pass its own key to [`Bft::new`].
pub const DEFAULT_SECRET_KEY: &str = "loki-bft-secret-key-change-in-production";

type FaultHandler = Box<dyn Fn(&FaultRecord) + Send + Sync>;

/// Top-level facade over reputation, consensus, and authentication state
/// for one swarm run.
pub struct Bft {
    config: BftConfig,
    secret_key: Vec<u8>,
    bft_dir: PathBuf,
    reputations: ReputationStore,
    vote_history: VoteHistory,
    active_rounds: DashMap<String, ConsensusRound>,
    nonces: NonceTracker,
    fault_handlers: RwLock<Vec<FaultHandler>>,
}

impl Bft {
    /// Creates (or resumes) a BFT system rooted at `loki_dir/swarm/bft`,
    /// loading any persisted reputation ledger. `secret_key` authenticates
    /// every message this instance creates or verifies; falls back to
    /// [`DEFAULT_SECRET_KEY`] when empty, which is only appropriate for
    /// local development.
    pub fn new(loki_dir: impl AsRef<Path>, config: BftConfig, secret_key: Vec<u8>) -> BftResult<Self> {
        let bft_dir = loki_dir.as_ref().join("swarm").join("bft");
        let secret_key = if secret_key.is_empty() { DEFAULT_SECRET_KEY.as_bytes().to_vec() } else { secret_key };
        Ok(Self {
            reputations: ReputationStore::new(bft_dir.join("reputations.json"))?,
            config,
            secret_key,
            bft_dir,
            vote_history: VoteHistory::new(),
            active_rounds: DashMap::new(),
            nonces: NonceTracker::new(),
            fault_handlers: RwLock::new(Vec::new()),
        })
    }

    fn emit(&self, fault: &FaultRecord) {
        for handler in self.fault_handlers.read().iter() {
            handler(fault);
        }
    }

    fn emit_all(&self, faults: &[FaultRecord]) {
        for fault in faults {
            self.emit(fault);
        }
    }

    // -- Message authentication ------------------------------------------------

    pub fn create_authenticated_message(&self, message: serde_json::Value) -> AuthenticatedMessage {
        auth::create_authenticated_message(&self.secret_key, message)
    }

    pub fn verify_authenticated_message(&self, message: &AuthenticatedMessage) -> Result<(), String> {
        auth::verify_authenticated_message(&self.secret_key, &self.nonces, self.config.message_validity_window_seconds, message)
    }

    // -- Reputation -------------------------------------------------------------

    pub fn get_reputation(&self, agent_id: &str) -> Reputation {
        self.reputations.get(agent_id)
    }

    pub fn update_reputation(&self, agent_id: &str, success: bool, fault: Option<FaultRecord>) -> BftResult<()> {
        if let Some(fault) = &fault {
            self.emit(fault);
        }
        self.reputations.update(&self.config, agent_id, success, fault)
    }

    pub fn rehabilitate_agent(&self, agent_id: &str) -> BftResult<bool> {
        self.reputations.rehabilitate(&self.config, agent_id)
    }

    pub fn get_eligible_agents(&self, agent_ids: &[String]) -> Vec<String> {
        self.reputations.eligible(&self.config, agent_ids)
    }

    pub fn get_all_reputations(&self) -> Vec<Reputation> {
        self.reputations.all()
    }

    pub fn get_excluded_agents(&self) -> Vec<String> {
        self.reputations.excluded()
    }

    // -- Fault detection ----------------------------------------------------

    pub fn detect_vote_inconsistency(&self, agent_id: &str, proposal_id: &str, vote: &str) -> Option<FaultRecord> {
        self.vote_history.check_and_record(&self.config, agent_id, proposal_id, vote)
    }

    pub fn detect_equivocation(&self, agent_id: &str, messages: &[(String, String)]) -> Option<FaultRecord> {
        fault::detect_equivocation(&self.config, agent_id, messages)
    }

    pub fn detect_result_conflict(&self, agent_id: &str, agent_result: &serde_json::Value, consensus_result: &serde_json::Value, proposal_id: &str) -> Option<FaultRecord> {
        fault::detect_result_conflict(&self.config, agent_id, agent_result, consensus_result, proposal_id)
    }

    pub fn record_timeout(&self, agent_id: &str, proposal_id: &str, timeout_seconds: f64) -> BftResult<FaultRecord> {
        let fault = fault::timeout_fault(&self.config, agent_id, proposal_id, timeout_seconds);
        self.update_reputation(agent_id, false, Some(fault.clone()))?;
        Ok(fault)
    }

    // -- Consensus ----------------------------------------------------------

    pub fn run_consensus(&self, proposal_id: &str, value: serde_json::Value, participants: &[String], primary_id: Option<&str>, timeout_seconds: Option<f64>) -> BftResult<ConsensusOutcome> {
        let outcome = consensus::run_consensus(&self.config, &self.reputations, &self.vote_history, &self.active_rounds, proposal_id, value, participants, primary_id, timeout_seconds)?;
        self.emit_all(&outcome.faults_detected);
        Ok(outcome)
    }

    pub fn verify_result(&self, proposal_id: &str, agent_results: &HashMap<String, serde_json::Value>) -> BftResult<(Option<serde_json::Value>, Vec<FaultRecord>)> {
        let (result, faults) = cross_check::verify_result(&self.config, &self.reputations, proposal_id, agent_results)?;
        self.emit_all(&faults);
        Ok((result, faults))
    }

    pub fn cross_check_results(&self, proposal_id: &str, results: &[(String, serde_json::Value)], min_agreement: f64) -> BftResult<(bool, Option<serde_json::Value>, Vec<FaultRecord>)> {
        let (reached, value, faults) = cross_check::cross_check_results(&self.config, &self.reputations, proposal_id, results, min_agreement)?;
        self.emit_all(&faults);
        Ok((reached, value, faults))
    }

    // -- Voting & delegation --------------------------------------------------

    pub fn bft_vote(&self, proposal_id: &str, votes: &[Vote], weighted_by_reputation: bool) -> BftResult<VoteOutcome> {
        let outcome = vote::bft_vote(&self.config, &self.reputations, &self.vote_history, proposal_id, votes, weighted_by_reputation)?;
        self.emit_all(&outcome.faults_detected);
        Ok(outcome)
    }

    pub fn bft_delegate(&self, required_capabilities: &[String], candidates: &[Agent], min_reputation: Option<f64>) -> DelegationOutcome {
        delegate::bft_delegate(&self.config, &self.reputations, required_capabilities, candidates, min_reputation)
    }

    // -- Events ----------------------------------------------------------------

    pub fn on_fault(&self, handler: impl Fn(&FaultRecord) + Send + Sync + 'static) {
        self.fault_handlers.write().push(Box::new(handler));
    }

    // -- Config persistence -----------------------------------------------------

    pub fn save_config(&self) -> BftResult<()> {
        let path = self.bft_dir.join("config.json");
        std::fs::create_dir_all(&self.bft_dir).map_err(|source| BftError::Io { path: self.bft_dir.display().to_string(), source })?;
        let text = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(&path, text).map_err(|source| BftError::Io { path: path.display().to_string(), source })
    }

    pub fn load_config(&mut self) -> BftResult<bool> {
        let path = self.bft_dir.join("config.json");
        if !path.exists() {
            return Ok(false);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| BftError::Io { path: path.display().to_string(), source })?;
        self.config = serde_json::from_str(&text)?;
        Ok(true)
    }

    // -- Statistics ---------------------------------------------------------

    pub fn get_stats(&self) -> Stats {
        let reputations = self.reputations.all();
        let total_agents = reputations.len();
        let excluded_count = reputations.iter().filter(|r| r.is_excluded).count();
        let total_faults: usize = reputations.iter().map(|r| r.faults.len()).sum();
        let total_interactions: u64 = reputations.iter().map(|r| r.total_interactions).sum();

        let mut fault_types: HashMap<String, usize> = HashMap::new();
        for rep in &reputations {
            for fault in &rep.faults {
                *fault_types.entry(format!("{:?}", fault.kind)).or_insert(0) += 1;
            }
        }

        let average_reputation = if total_agents > 0 { reputations.iter().map(|r| r.score).sum::<f64>() / total_agents as f64 } else { 0.0 };

        Stats {
            total_agents_tracked: total_agents,
            excluded_agents: excluded_count,
            active_rounds: self.active_rounds.len(),
            total_faults_recorded: total_faults,
            total_interactions,
            fault_types,
            average_reputation,
        }
    }

    /// Every recorded fault, optionally filtered to one agent, newest first.
    pub fn get_fault_report(&self, agent_id: Option<&str>) -> Vec<FaultRecord> {
        let mut faults: Vec<FaultRecord> = self
            .reputations
            .all()
            .into_iter()
            .filter(|rep| agent_id.map(|id| rep.agent_id == id).unwrap_or(true))
            .flat_map(|rep| rep.faults)
            .collect();
        faults.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        faults
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Stats {
    pub total_agents_tracked: usize,
    pub excluded_agents: usize,
    pub active_rounds: usize,
    pub total_faults_recorded: usize,
    pub total_interactions: u64,
    pub fault_types: HashMap<String, usize>,
    pub average_reputation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn end_to_end_consensus_updates_reputation_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let bft = Bft::new(dir.path(), BftConfig::default(), vec![]).unwrap();
        let participants: Vec<String> = (0..4).map(|i| format!("agent-{i}")).collect();
        let outcome = bft.run_consensus("prop-1", json!("rust"), &participants, None, None).unwrap();
        assert!(outcome.consensus_reached);

        let stats = bft.get_stats();
        assert_eq!(stats.total_agents_tracked, 4);
        assert!(stats.average_reputation > 0.0);
    }

    #[test]
    fn fault_handler_is_invoked_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let bft = Bft::new(dir.path(), BftConfig::default(), vec![]).unwrap();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen_clone = seen.clone();
        bft.on_fault(move |_| {
            seen_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        bft.record_timeout("agent-1", "prop-1", 30.0).unwrap();
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn config_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = BftConfig::default();
        config.min_reputation_for_consensus = 0.42;
        let bft = Bft::new(dir.path(), config, vec![]).unwrap();
        bft.save_config().unwrap();

        let mut reloaded = Bft::new(dir.path(), BftConfig::default(), vec![]).unwrap();
        assert!(reloaded.load_config().unwrap());
        assert!((reloaded.config.min_reputation_for_consensus - 0.42).abs() < 1e-9);
    }
}
