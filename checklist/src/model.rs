//! The checklist document shape: categories of items, each with a list
//! of verification checks that independently resolve pass/fail/pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    FileExists,
    FileContains,
    TestsPass,
    Command,
    GrepCodebase,
    HttpCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCheck {
    #[serde(rename = "type")]
    pub check_type: CheckType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    /// `None` means pending (unknown/timed out/rejected input), matching
    /// the original's three-valued `passed` field.
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Verified,
    Failing,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default = "default_status")]
    pub status: ItemStatus,
    #[serde(default)]
    pub verification: Vec<VerificationCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

fn default_priority() -> String {
    "minor".to_string()
}

fn default_status() -> ItemStatus {
    ItemStatus::Pending
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistCategory {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChecklistSummary {
    pub total: u32,
    pub verified: u32,
    pub failing: u32,
    pub pending: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    #[serde(default)]
    pub categories: Vec<ChecklistCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ChecklistSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
}

/// Rolls up a single item's checks: `pending` if empty, `failing` if any
/// check explicitly failed, `verified` if every check passed, else
/// `pending` (some checks still unresolved).
pub fn determine_item_status(verifications: &[VerificationCheck]) -> ItemStatus {
    if verifications.is_empty() {
        return ItemStatus::Pending;
    }

    let mut all_passed = true;
    let mut any_failed = false;

    for check in verifications {
        match check.passed {
            None => all_passed = false,
            Some(false) => {
                any_failed = true;
                all_passed = false;
            }
            Some(true) => {}
        }
    }

    if any_failed {
        ItemStatus::Failing
    } else if all_passed {
        ItemStatus::Verified
    } else {
        ItemStatus::Pending
    }
}
