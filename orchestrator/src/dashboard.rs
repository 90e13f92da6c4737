//! `dashboard-state.json`: a best-effort snapshot of the live run, atomically
//! rewritten on a fixed interval by a single background task. Readers
//! (a UI, a CLI status command) only ever see a complete, parseable file.

use crate::queue::QueueCounts;
use loki_contracts::Tier;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub phase: String,
    pub iteration: u64,
    pub complexity: Option<Tier>,
    pub mode: String,
    pub agents: Vec<String>,
    pub tasks: QueueCounts,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self { phase: "starting".to_string(), iteration: 0, complexity: None, mode: "autonomous".to_string(), agents: Vec::new(), tasks: QueueCounts::default() }
    }
}

pub type SharedDashboardState = Arc<RwLock<DashboardState>>;

pub fn dashboard_path(loki_dir: &Path) -> PathBuf {
    loki_dir.join("dashboard-state.json")
}

/// Spawns the periodic snapshot writer. Stops when `stop` resolves (the
/// orchestrator drops its sender / triggers shutdown), writing one final
/// snapshot before exiting so the last state on disk reflects the actual
/// end of the run rather than a stale interval tick.
pub fn spawn(path: PathBuf, state: SharedDashboardState, interval: Duration, mut stop: tokio::sync::watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    write_snapshot(&path, &state);
                }
                _ = stop.changed() => {
                    write_snapshot(&path, &state);
                    break;
                }
            }
        }
    })
}

fn write_snapshot(path: &Path, state: &SharedDashboardState) {
    let snapshot = state.read().clone();
    if let Err(e) = loki_memory::atomic::atomic_write_json(path, &snapshot, "dashboard_state") {
        tracing::warn!(path = %path.display(), error = %e, "failed to write dashboard snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_a_snapshot_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dashboard_path(dir.path());
        let state: SharedDashboardState = Arc::new(RwLock::new(DashboardState { iteration: 3, ..Default::default() }));
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

        let handle = spawn(path.clone(), state, Duration::from_secs(60), stop_rx);
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["iteration"], 3);
    }
}
