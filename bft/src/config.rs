use serde::{Deserialize, Serialize};

/// Thresholds and penalties governing reputation, exclusion and consensus
/// timing. Defaults match the system's long-standing production values;
/// override via config or the `LOKI_BFT_*` environment family (wiring left
/// to the orchestrator's config loader).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BftConfig {
    pub min_reputation_for_consensus: f64,
    pub exclusion_threshold: f64,
    pub rehabilitation_threshold: f64,

    pub consensus_timeout_seconds: f64,
    pub max_view_changes: u32,
    pub require_prepare_quorum: bool,

    pub vote_consistency_window: usize,
    pub message_validity_window_seconds: f64,
    pub max_faults_before_exclusion: usize,

    pub timeout_penalty: f64,
    pub inconsistency_penalty: f64,
    pub invalid_message_penalty: f64,
    pub equivocation_penalty: f64,
}

impl Default for BftConfig {
    fn default() -> Self {
        Self {
            min_reputation_for_consensus: 0.3,
            exclusion_threshold: 0.2,
            rehabilitation_threshold: 0.5,
            consensus_timeout_seconds: 30.0,
            max_view_changes: 3,
            require_prepare_quorum: true,
            vote_consistency_window: 10,
            message_validity_window_seconds: 60.0,
            max_faults_before_exclusion: 3,
            timeout_penalty: 0.1,
            inconsistency_penalty: 0.3,
            invalid_message_penalty: 0.2,
            equivocation_penalty: 0.5,
        }
    }
}
