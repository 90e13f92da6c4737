//! Orchestrator configuration: built-in defaults, layered with an optional
//! TOML/YAML/JSON file and `LOKI_`-prefixed environment overrides via the
//! `config` crate, the same layering idiom the teacher's services use for
//! their own runtime configuration.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Root of the `.loki` state directory (memory, bft, council, events).
    pub loki_dir: PathBuf,
    /// Root of the project being worked on (checklist file checks, tests_pass).
    pub project_dir: PathBuf,
    /// How long to sleep between RARV iterations when the queue is empty
    /// or the session is paused.
    pub poll_interval_ms: u64,
    /// Run the adjuster every N completed iterations.
    pub adjust_every: u64,
    /// Run the checklist verifier every M completed iterations.
    pub checklist_every: u64,
    /// Token budget handed to retrieval per task.
    pub retrieval_token_budget: u64,
    /// Number of retrieved context items requested per task.
    pub retrieval_top_k: usize,
    /// Stops the loop after this many completed iterations; `None` runs
    /// until a stop file appears.
    pub max_iterations: Option<u64>,
    /// How often the dashboard snapshot is rewritten.
    pub dashboard_interval_ms: u64,
    /// Shared secret authenticating BFT messages; empty falls back to
    /// `loki_bft::DEFAULT_SECRET_KEY` (development only).
    pub bft_secret_key: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            loki_dir: PathBuf::from(".loki"),
            project_dir: PathBuf::from("."),
            poll_interval_ms: 500,
            adjust_every: 5,
            checklist_every: 10,
            retrieval_token_budget: 4000,
            retrieval_top_k: 8,
            max_iterations: None,
            dashboard_interval_ms: 2000,
            bft_secret_key: String::new(),
        }
    }
}

impl OrchestratorConfig {
    /// Loads defaults, then an optional config file at `path`, then
    /// `LOKI_*` environment overrides (e.g. `LOKI_POLL_INTERVAL_MS`).
    pub fn load(path: Option<&Path>) -> OrchestratorResult<Self> {
        let defaults = config::Config::try_from(&Self::default()).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("LOKI").separator("_"));

        let built = builder.build().map_err(|e| OrchestratorError::Config(e.to_string()))?;
        built.try_deserialize().map_err(|e| OrchestratorError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = OrchestratorConfig::default();
        assert!(config.poll_interval_ms > 0);
        assert!(config.adjust_every > 0);
        assert!(config.checklist_every > 0);
    }

    #[test]
    fn load_without_file_returns_defaults() {
        let config = OrchestratorConfig::load(None).unwrap();
        assert_eq!(config.retrieval_top_k, OrchestratorConfig::default().retrieval_top_k);
    }
}
