//! Scoped checklist verification: loads a checklist document, runs every
//! item's checks concurrently with a bounded worker pool, rolls up item
//! and summary status, and atomically persists both the updated
//! checklist and a compact `verification-results.json`.
//!
//! Verification outcomes are informational, never fatal — a call to
//! [`Verifier::verify`] does not fail because individual checks failed
//! or timed out; it only errors on I/O/serialization problems loading
//! or saving the checklist itself.

pub mod atomic;
pub mod error;
pub mod model;
pub mod runner;
pub mod validate;

use chrono::Utc;
use error::ChecklistResult;
use model::{Checklist, ChecklistItem, ChecklistSummary, ItemStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;

/// Matches the original script's default per-check timeout.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_CONCURRENCY: usize = 8;

pub struct Verifier {
    checklist_path: PathBuf,
    project_dir: PathBuf,
    check_timeout: Duration,
    max_concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemResult {
    pub item_id: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResults {
    pub summary: ChecklistSummary,
    pub items: Vec<ItemResult>,
    pub verified_at: chrono::DateTime<Utc>,
}

impl Verifier {
    pub fn new(checklist_path: impl Into<PathBuf>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            checklist_path: checklist_path.into(),
            project_dir: project_dir.into(),
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn load_checklist(&self) -> ChecklistResult<Checklist> {
        if !self.checklist_path.is_file() {
            return Err(error::ChecklistError::NotFound(self.checklist_path.display().to_string()));
        }
        let text = std::fs::read_to_string(&self.checklist_path)
            .map_err(|e| error::ChecklistError::Io { path: self.checklist_path.display().to_string(), source: e })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Runs every item's checks (bounded concurrency across the flattened
    /// item list), rolls up status, and atomically writes the updated
    /// checklist plus a `verification-results.json` summary alongside it.
    /// Always returns `Ok` unless the checklist itself cannot be loaded
    /// or the results cannot be persisted — per-check failures surface
    /// only in the returned results, matching the original verifier's
    /// unconditional success exit code.
    pub async fn verify(&self) -> ChecklistResult<VerificationResults> {
        let mut checklist = self.load_checklist()?;

        let indexed_items: Vec<(usize, ChecklistItem)> = checklist
            .categories
            .iter_mut()
            .enumerate()
            .flat_map(|(category_index, category)| {
                std::mem::take(&mut category.items).into_iter().map(move |item| (category_index, item))
            })
            .collect();

        let results = self.run_all(indexed_items).await;

        let mut summary = ChecklistSummary::default();
        let mut item_results = Vec::with_capacity(results.len());
        let mut results_by_category: std::collections::HashMap<usize, Vec<ChecklistItem>> = std::collections::HashMap::new();

        for (category_index, item) in results {
            summary.total += 1;
            match item.status {
                ItemStatus::Verified => summary.verified += 1,
                ItemStatus::Failing => summary.failing += 1,
                ItemStatus::Pending => summary.pending += 1,
            }
            item_results.push(ItemResult { item_id: item.id.clone(), status: item.status });
            results_by_category.entry(category_index).or_default().push(item);
        }

        for (index, category) in checklist.categories.iter_mut().enumerate() {
            category.items = results_by_category.remove(&index).unwrap_or_default();
        }

        let now = Utc::now();
        checklist.summary = Some(summary);
        checklist.last_verified_at = Some(now);

        atomic::atomic_write_json(&self.checklist_path, &checklist)?;

        let verification_results = VerificationResults { summary, items: item_results, verified_at: now };
        let results_path = self.results_path();
        atomic::atomic_write_json(&results_path, &verification_results)?;

        Ok(verification_results)
    }

    fn results_path(&self) -> PathBuf {
        self.checklist_path.parent().unwrap_or_else(|| Path::new(".")).join("verification-results.json")
    }

    async fn run_all(&self, indexed_items: Vec<(usize, ChecklistItem)>) -> Vec<(usize, ChecklistItem)> {
        let mut pending = indexed_items.into_iter();
        let mut in_flight: JoinSet<(usize, ChecklistItem)> = JoinSet::new();
        let mut completed = Vec::new();

        for _ in 0..self.max_concurrency {
            if let Some((category_index, item)) = pending.next() {
                in_flight.spawn(self.run_item(category_index, item));
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Ok(result) = joined {
                completed.push(result);
            }
            if let Some((category_index, item)) = pending.next() {
                in_flight.spawn(self.run_item(category_index, item));
            }
        }

        completed
    }

    fn run_item(
        &self,
        category_index: usize,
        mut item: ChecklistItem,
    ) -> impl std::future::Future<Output = (usize, ChecklistItem)> + Send + 'static {
        let project_dir = self.project_dir.clone();
        let timeout = self.check_timeout;
        async move {
            let mut resolved = Vec::with_capacity(item.verification.len());
            for check in &item.verification {
                resolved.push(runner::run_check(check, &project_dir, timeout).await);
            }
            item.status = model::determine_item_status(&resolved);
            item.verification = resolved;
            if item.status == ItemStatus::Verified {
                item.verified_at = Some(Utc::now());
            }
            (category_index, item)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{CheckType, VerificationCheck};

    fn sample_checklist() -> Checklist {
        Checklist {
            categories: vec![model::ChecklistCategory {
                name: "core".to_string(),
                items: vec![
                    ChecklistItem {
                        id: "item-1".to_string(),
                        title: "README exists".to_string(),
                        priority: "major".to_string(),
                        status: ItemStatus::Pending,
                        verification: vec![VerificationCheck {
                            check_type: CheckType::FileExists,
                            path: Some("README.md".to_string()),
                            pattern: None,
                            command: None,
                            expected_status: None,
                            passed: None,
                            output: None,
                        }],
                        verified_at: None,
                    },
                    ChecklistItem {
                        id: "item-2".to_string(),
                        title: "missing file".to_string(),
                        priority: "minor".to_string(),
                        status: ItemStatus::Pending,
                        verification: vec![VerificationCheck {
                            check_type: CheckType::FileExists,
                            path: Some("nope.txt".to_string()),
                            pattern: None,
                            command: None,
                            expected_status: None,
                            passed: None,
                            output: None,
                        }],
                        verified_at: None,
                    },
                ],
            }],
            summary: None,
            last_verified_at: None,
        }
    }

    #[tokio::test]
    async fn verify_rolls_up_summary_and_persists_results() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();

        let checklist_path = dir.path().join("checklist.json");
        std::fs::write(&checklist_path, serde_json::to_string(&sample_checklist()).unwrap()).unwrap();

        let verifier = Verifier::new(&checklist_path, dir.path());
        let results = verifier.verify().await.unwrap();

        assert_eq!(results.summary.total, 2);
        assert_eq!(results.summary.verified, 1);
        assert_eq!(results.summary.failing, 1);

        let results_path = dir.path().join("verification-results.json");
        assert!(results_path.is_file());

        let reloaded: Checklist = serde_json::from_str(&std::fs::read_to_string(&checklist_path).unwrap()).unwrap();
        assert!(reloaded.last_verified_at.is_some());
        assert_eq!(reloaded.categories[0].items.len(), 2);
    }

    #[tokio::test]
    async fn missing_checklist_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = Verifier::new(dir.path().join("absent.json"), dir.path());
        assert!(verifier.load_checklist().is_err());
    }
}
