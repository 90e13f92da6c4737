//! Durable task queue: one JSON file per [`TaskItem`] under a status
//! subdirectory (`pending`, `in-progress`, `review`, `completed`, `failed`,
//! `dead-letter`). The orchestrator's in-memory view is a cache over this;
//! every transition is flushed immediately so a crash loses at most the
//! in-flight task's latest status update, never the task itself.

use crate::error::{OrchestratorError, OrchestratorResult};
use loki_contracts::{TaskItem, TaskStatus};
use std::path::{Path, PathBuf};

fn dir_for(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::InProgress => "in-progress",
        TaskStatus::Review => "review",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

const DEAD_LETTER_DIR: &str = "dead-letter";

pub struct TaskQueue {
    root: PathBuf,
}

impl TaskQueue {
    pub fn new(loki_dir: impl Into<PathBuf>) -> OrchestratorResult<Self> {
        let root = loki_dir.into().join("tasks");
        for dir in ["pending", "in-progress", "review", "completed", "failed", DEAD_LETTER_DIR] {
            std::fs::create_dir_all(root.join(dir)).map_err(|source| OrchestratorError::Io { path: root.join(dir).display().to_string(), source })?;
        }
        Ok(Self { root })
    }

    fn path_for(&self, status: TaskStatus, id: &str) -> PathBuf {
        self.root.join(dir_for(status)).join(format!("{id}.json"))
    }

    fn dead_letter_path(&self, id: &str) -> PathBuf {
        self.root.join(DEAD_LETTER_DIR).join(format!("{id}.json"))
    }

    /// Writes a new task into `pending`.
    pub fn enqueue(&self, task: &TaskItem) -> OrchestratorResult<()> {
        let path = self.path_for(TaskStatus::Pending, &task.id);
        loki_memory::atomic::atomic_write_json(&path, task, "task_item")?;
        Ok(())
    }

    /// Picks the oldest (lowest `position`) pending task, moves it into
    /// `in-progress` and stamps its status/updated_at. Returns `None` when
    /// the pending directory is empty.
    pub fn pop_next_pending(&self) -> OrchestratorResult<Option<TaskItem>> {
        let pending_dir = self.root.join(dir_for(TaskStatus::Pending));
        let mut candidates: Vec<TaskItem> = Vec::new();
        for entry in std::fs::read_dir(&pending_dir).map_err(|source| OrchestratorError::Io { path: pending_dir.display().to_string(), source })? {
            let entry = entry.map_err(|source| OrchestratorError::Io { path: pending_dir.display().to_string(), source })?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(task) = loki_memory::atomic::load_json::<TaskItem>(&entry.path(), "task_item")? {
                candidates.push(task);
            }
        }
        candidates.sort_by_key(|task| task.position);

        let Some(mut task) = candidates.into_iter().next() else {
            return Ok(None);
        };

        let old_path = self.path_for(TaskStatus::Pending, &task.id);
        task.status = TaskStatus::InProgress;
        task.updated_at = chrono::Utc::now();
        let new_path = self.path_for(TaskStatus::InProgress, &task.id);
        loki_memory::atomic::atomic_write_json(&new_path, &task, "task_item")?;
        let _ = std::fs::remove_file(&old_path);
        Ok(Some(task))
    }

    /// Moves `task` from its current status's file to `next`, rejecting
    /// illegal transitions per [`TaskStatus::can_transition_to`].
    pub fn transition(&self, task: &mut TaskItem, next: TaskStatus) -> OrchestratorResult<()> {
        if !task.status.can_transition_to(next) {
            return Err(OrchestratorError::Config(format!("illegal task transition {:?} -> {:?} for {}", task.status, next, task.id)));
        }
        let old_path = self.path_for(task.status, &task.id);
        task.status = next;
        task.updated_at = chrono::Utc::now();
        let new_path = self.path_for(next, &task.id);
        loki_memory::atomic::atomic_write_json(&new_path, task, "task_item")?;
        let _ = std::fs::remove_file(&old_path);
        Ok(())
    }

    /// Moves an unrecoverable task (e.g. repeated failure) into the
    /// dead-letter directory, outside the normal status lifecycle.
    pub fn move_to_dead_letter(&self, task: &TaskItem) -> OrchestratorResult<()> {
        let old_path = self.path_for(task.status, &task.id);
        let new_path = self.dead_letter_path(&task.id);
        loki_memory::atomic::atomic_write_json(&new_path, task, "task_item")?;
        let _ = std::fs::remove_file(&old_path);
        Ok(())
    }

    /// Counts of tasks per status, for dashboard snapshots.
    pub fn counts(&self) -> OrchestratorResult<QueueCounts> {
        Ok(QueueCounts {
            pending: self.count_dir(TaskStatus::Pending)?,
            in_progress: self.count_dir(TaskStatus::InProgress)?,
            review: self.count_dir(TaskStatus::Review)?,
            completed: self.count_dir(TaskStatus::Completed)?,
            failed: self.count_dir(TaskStatus::Failed)?,
        })
    }

    fn count_dir(&self, status: TaskStatus) -> OrchestratorResult<u64> {
        let dir = self.root.join(dir_for(status));
        Ok(std::fs::read_dir(&dir).map_err(|source| OrchestratorError::Io { path: dir.display().to_string(), source })?.count() as u64)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub review: u64,
    pub completed: u64,
    pub failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::TaskPayload;

    fn sample_task(id: &str, position: u32) -> TaskItem {
        let now = chrono::Utc::now();
        TaskItem {
            id: id.to_string(),
            task_type: "implement".to_string(),
            title: format!("task {id}"),
            payload: TaskPayload { action: "write_code".to_string(), priority: 1, description: "do the thing".to_string() },
            status: TaskStatus::Pending,
            position,
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn pop_returns_lowest_position_first() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::new(dir.path()).unwrap();
        queue.enqueue(&sample_task("b", 2)).unwrap();
        queue.enqueue(&sample_task("a", 1)).unwrap();

        let popped = queue.pop_next_pending().unwrap().unwrap();
        assert_eq!(popped.id, "a");
        assert_eq!(popped.status, TaskStatus::InProgress);

        let counts = queue.counts().unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.in_progress, 1);
    }

    #[test]
    fn empty_pending_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::new(dir.path()).unwrap();
        assert!(queue.pop_next_pending().unwrap().is_none());
    }

    #[test]
    fn transition_moves_file_between_directories() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::new(dir.path()).unwrap();
        queue.enqueue(&sample_task("a", 1)).unwrap();
        let mut task = queue.pop_next_pending().unwrap().unwrap();

        queue.transition(&mut task, TaskStatus::Review).unwrap();
        assert_eq!(task.status, TaskStatus::Review);
        let counts = queue.counts().unwrap();
        assert_eq!(counts.review, 1);
        assert_eq!(counts.in_progress, 0);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = TaskQueue::new(dir.path()).unwrap();
        queue.enqueue(&sample_task("a", 1)).unwrap();
        let mut task = queue.pop_next_pending().unwrap().unwrap();
        assert!(queue.transition(&mut task, TaskStatus::Completed).is_err());
    }
}
