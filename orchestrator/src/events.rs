//! Append-only JSON-lines event sink. One task owns the file and fsyncs
//! every line so events survive a crash; every other caller sends through
//! a bounded channel — when the channel is full the sender blocks, it
//! never drops an event.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionStop,
    SessionPause,
    SessionResume,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    AgentAdded,
    AgentRemoved,
    ConsensusReached,
    ConsensusFailed,
    FaultDetected,
    ChecklistVerified,
    SessionComplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
}

/// A handle to the background writer task. Cloning shares the same
/// channel, so all callers funnel through the single serialising writer.
#[derive(Clone)]
pub struct EventSink {
    sender: mpsc::Sender<Event>,
}

impl EventSink {
    /// Spawns the writer task appending to `path` and returns a sink
    /// handle plus its join handle (awaited on shutdown to guarantee the
    /// final events are flushed before the process exits).
    pub fn spawn(path: impl Into<PathBuf>) -> (Self, tokio::task::JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(Self::run(path.into(), receiver));
        (Self { sender }, handle)
    }

    async fn run(path: PathBuf, mut receiver: mpsc::Receiver<Event>) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let mut file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to open event sink file");
                return;
            }
        };

        while let Some(event) = receiver.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize event, dropping");
                    continue;
                }
            };
            if let Err(e) = writeln!(file, "{line}") {
                tracing::error!(path = %path.display(), error = %e, "failed to write event");
                continue;
            }
            let _ = file.sync_data();
        }
    }

    /// Sends an event, blocking the caller if the channel is full rather
    /// than dropping it. Logs and swallows the error if the writer task
    /// has already exited (e.g. during shutdown race).
    pub async fn emit(&self, event_type: EventType, data: serde_json::Value) {
        let event = Event { timestamp: Utc::now(), event_type, data };
        if self.sender.send(event).await.is_err() {
            tracing::warn!("event sink writer has shut down, dropping event");
        }
    }
}

pub fn events_file(loki_dir: &Path) -> PathBuf {
    loki_dir.join("events.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_are_appended_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = events_file(dir.path());
        let (sink, handle) = EventSink::spawn(&path);

        sink.emit(EventType::SessionStart, json!({"iteration": 0})).await;
        sink.emit(EventType::TaskStarted, json!({"task_id": "a"})).await;

        drop(sink);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "session_start");
    }
}
