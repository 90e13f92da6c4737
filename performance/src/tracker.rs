use crate::error::{PerformanceError, PerformanceResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_RECENT_SCORES: usize = 20;
pub const DEFAULT_STORAGE_PATH: &str = ".loki/memory/agent-performance.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentEntry {
    total_tasks: u64,
    avg_quality: f64,
    avg_duration: f64,
    recent_scores: Vec<f64>,
    last_updated: DateTime<Utc>,
}

impl Default for AgentEntry {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            avg_quality: 0.0,
            avg_duration: 0.0,
            recent_scores: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformance {
    pub avg_quality: f64,
    pub avg_duration: f64,
    pub task_count: u64,
    pub trend: f64,
}

/// Tracks per-agent-type task quality and duration across runs so the
/// composer can prefer consistently strong performers.
pub struct PerformanceTracker {
    storage_path: PathBuf,
    data: RwLock<HashMap<String, AgentEntry>>,
}

impl PerformanceTracker {
    pub fn new(storage_path: impl Into<PathBuf>) -> PerformanceResult<Self> {
        let tracker = Self {
            storage_path: storage_path.into(),
            data: RwLock::new(HashMap::new()),
        };
        tracker.load()?;
        Ok(tracker)
    }

    pub fn default_path() -> PerformanceResult<Self> {
        Self::new(DEFAULT_STORAGE_PATH)
    }

    /// Updates the running quality/duration averages for `agent_type` and
    /// appends to its recent-scores ring buffer (trimmed to the most
    /// recent 20).
    pub fn record_task_completion(&self, agent_type: &str, quality_score: f64, duration_seconds: f64) {
        let quality_score = quality_score.clamp(0.0, 1.0);
        let duration_seconds = duration_seconds.max(0.0);

        let mut data = self.data.write();
        let entry = data.entry(agent_type.to_string()).or_default();
        let n = entry.total_tasks as f64;

        entry.avg_quality = round4((entry.avg_quality * n + quality_score) / (n + 1.0));
        entry.avg_duration = round2((entry.avg_duration * n + duration_seconds) / (n + 1.0));
        entry.total_tasks += 1;

        entry.recent_scores.push(round4(quality_score));
        if entry.recent_scores.len() > MAX_RECENT_SCORES {
            let excess = entry.recent_scores.len() - MAX_RECENT_SCORES;
            entry.recent_scores.drain(0..excess);
        }
        entry.last_updated = Utc::now();
    }

    pub fn performance_scores(&self) -> HashMap<String, AgentPerformance> {
        self.data
            .read()
            .iter()
            .map(|(agent_type, entry)| {
                (
                    agent_type.clone(),
                    AgentPerformance {
                        avg_quality: entry.avg_quality,
                        avg_duration: entry.avg_duration,
                        task_count: entry.total_tasks,
                        trend: compute_trend(&entry.recent_scores),
                    },
                )
            })
            .collect()
    }

    /// Ranks `candidates` by `avg_quality + 0.1 * trend`; agents with no
    /// recorded data get a neutral 0.5 with no trend term. Returns at most
    /// `top_n` agent types, best first.
    pub fn recommend(&self, candidates: &[String], top_n: usize) -> Vec<String> {
        let data = self.data.read();
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|agent_type| {
                let score = match data.get(agent_type) {
                    Some(entry) if entry.total_tasks > 0 => {
                        entry.avg_quality + compute_trend(&entry.recent_scores) * 0.1
                    }
                    _ => 0.5,
                };
                (agent_type.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.into_iter().take(top_n).map(|(agent_type, _)| agent_type).collect()
    }

    pub fn agent_data(&self, agent_type: &str) -> Option<AgentPerformance> {
        self.data.read().get(agent_type).map(|entry| AgentPerformance {
            avg_quality: entry.avg_quality,
            avg_duration: entry.avg_duration,
            task_count: entry.total_tasks,
            trend: compute_trend(&entry.recent_scores),
        })
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub fn save(&self) -> PerformanceResult<()> {
        let parent = self.storage_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| PerformanceError::Io {
            path: parent.display().to_string(),
            source,
        })?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|source| PerformanceError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), &*self.data.read())?;
        tmp.persist(&self.storage_path).map_err(|e| PerformanceError::Io {
            path: self.storage_path.display().to_string(),
            source: e.error,
        })?;
        Ok(())
    }

    fn load(&self) -> PerformanceResult<()> {
        if !self.storage_path.exists() {
            return Ok(());
        }
        let raw = match fs::read_to_string(&self.storage_path) {
            Ok(raw) => raw,
            Err(_) => return Ok(()),
        };
        match serde_json::from_str(&raw) {
            Ok(parsed) => {
                *self.data.write() = parsed;
            }
            Err(source) => {
                tracing::warn!(path = %self.storage_path.display(), error = %source, "corrupt performance store, starting fresh");
            }
        }
        Ok(())
    }
}

/// Trend of the newer half of the ring buffer vs. the older half, clamped
/// to [-1, 1]. Fewer than two scores yields a flat 0.0.
fn compute_trend(recent_scores: &[f64]) -> f64 {
    if recent_scores.len() < 2 {
        return 0.0;
    }
    let mid = recent_scores.len() / 2;
    let (older, newer) = recent_scores.split_at(mid);
    if older.is_empty() || newer.is_empty() {
        return 0.0;
    }
    let older_avg = older.iter().sum::<f64>() / older.len() as f64;
    let newer_avg = newer.iter().sum::<f64>() / newer.len() as f64;
    round4(newer_avg - older_avg).clamp(-1.0, 1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_running_averages() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = PerformanceTracker::new(dir.path().join("perf.json")).unwrap();

        tracker.record_task_completion("eng-backend", 0.8, 120.0);
        tracker.record_task_completion("eng-backend", 1.0, 80.0);

        let data = tracker.agent_data("eng-backend").unwrap();
        assert_eq!(data.task_count, 2);
        assert!((data.avg_quality - 0.9).abs() < 1e-6);
    }

    #[test]
    fn recent_scores_trim_to_twenty() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = PerformanceTracker::new(dir.path().join("perf.json")).unwrap();
        for _ in 0..25 {
            tracker.record_task_completion("eng-qa", 0.7, 10.0);
        }
        assert_eq!(tracker.agent_data("eng-qa").unwrap().task_count, 25);
    }

    #[test]
    fn recommend_prefers_higher_quality_and_trend() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = PerformanceTracker::new(dir.path().join("perf.json")).unwrap();
        for q in [0.5, 0.6, 0.7, 0.9] {
            tracker.record_task_completion("eng-frontend", q, 10.0);
        }
        tracker.record_task_completion("eng-backend", 0.4, 10.0);

        let ranked = tracker.recommend(&["eng-frontend".into(), "eng-backend".into(), "eng-mobile".into()], 3);
        assert_eq!(ranked[0], "eng-frontend");
    }

    #[test]
    fn save_then_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.json");
        {
            let tracker = PerformanceTracker::new(&path).unwrap();
            tracker.record_task_completion("eng-backend", 0.8, 120.0);
            tracker.save().unwrap();
        }
        let reloaded = PerformanceTracker::new(&path).unwrap();
        assert_eq!(reloaded.agent_data("eng-backend").unwrap().task_count, 1);
    }

    #[test]
    fn unknown_candidates_get_neutral_score() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = PerformanceTracker::new(dir.path().join("perf.json")).unwrap();
        let ranked = tracker.recommend(&["ghost-type".into()], 5);
        assert_eq!(ranked, vec!["ghost-type".to_string()]);
    }
}
