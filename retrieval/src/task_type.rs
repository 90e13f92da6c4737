use serde::{Deserialize, Serialize};

/// The five task shapes the retrieval weighting table distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Exploration,
    Implementation,
    Debugging,
    Review,
    Refactoring,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Exploration => "exploration",
            TaskType::Implementation => "implementation",
            TaskType::Debugging => "debugging",
            TaskType::Review => "review",
            TaskType::Refactoring => "refactoring",
        }
    }
}

/// Per-collection retrieval weights for a task type:
/// `(episodic, semantic, skills, anti_patterns)`.
pub fn strategy_weights(task_type: TaskType) -> (f64, f64, f64, f64) {
    match task_type {
        TaskType::Exploration => (0.6, 0.3, 0.1, 0.0),
        TaskType::Implementation => (0.15, 0.5, 0.35, 0.0),
        TaskType::Debugging => (0.4, 0.2, 0.0, 0.4),
        TaskType::Review => (0.3, 0.5, 0.0, 0.2),
        TaskType::Refactoring => (0.25, 0.45, 0.3, 0.0),
    }
}

struct Signals {
    keywords: &'static [&'static str],
    actions: &'static [&'static str],
    phases: &'static [&'static str],
}

const EXPLORATION: Signals = Signals {
    keywords: &[
        "explore", "understand", "research", "investigate", "analyze", "discover", "find", "what is", "how does",
        "architecture", "structure", "overview",
    ],
    actions: &["read_file", "search", "list_files"],
    phases: &["planning", "discovery", "research"],
};

const IMPLEMENTATION: Signals = Signals {
    keywords: &["implement", "create", "build", "add", "write", "develop", "make", "construct", "new feature"],
    actions: &["write_file", "create_file", "edit_file"],
    phases: &["development", "implementation", "coding"],
};

const DEBUGGING: Signals = Signals {
    keywords: &[
        "fix", "debug", "error", "bug", "issue", "broken", "failing", "crash", "exception", "investigate error",
    ],
    actions: &["run_test", "check_logs", "trace"],
    phases: &["debugging", "troubleshooting", "fixing"],
};

const REVIEW: Signals = Signals {
    keywords: &["review", "check", "validate", "verify", "audit", "inspect", "quality", "standards", "lint"],
    actions: &["diff", "review_pr", "check_style"],
    phases: &["review", "qa", "validation"],
};

const REFACTORING: Signals = Signals {
    keywords: &["refactor", "restructure", "reorganize", "clean up", "improve structure", "extract", "rename", "move"],
    actions: &["rename", "move_file", "extract_function"],
    phases: &["refactoring", "cleanup", "optimization"],
};

fn score(signals: &Signals, goal: &str, action_type: &str, phase: &str) -> f64 {
    let mut hit = 0.0;
    if signals.keywords.iter().any(|kw| goal.contains(kw)) {
        hit += 2.0;
    }
    if signals.actions.iter().any(|a| action_type.contains(a)) {
        hit += 3.0;
    }
    if signals.phases.iter().any(|p| phase.contains(p)) {
        hit += 4.0;
    }
    hit
}

/// Detects the task type from a goal, an action-type label and a phase
/// label, all compared case-insensitively by substring containment.
/// Defaults to `Implementation` when nothing matches at all.
pub fn detect_task_type(goal: &str, action_type: &str, phase: &str) -> TaskType {
    let goal = goal.to_lowercase();
    let action_type = action_type.to_lowercase();
    let phase = phase.to_lowercase();

    let scores = [
        (TaskType::Exploration, score(&EXPLORATION, &goal, &action_type, &phase)),
        (TaskType::Implementation, score(&IMPLEMENTATION, &goal, &action_type, &phase)),
        (TaskType::Debugging, score(&DEBUGGING, &goal, &action_type, &phase)),
        (TaskType::Review, score(&REVIEW, &goal, &action_type, &phase)),
        (TaskType::Refactoring, score(&REFACTORING, &goal, &action_type, &phase)),
    ];

    let (best_type, best_score) = scores
        .iter()
        .cloned()
        .fold((TaskType::Implementation, 0.0), |best, candidate| if candidate.1 > best.1 { candidate } else { best });

    if best_score == 0.0 {
        TaskType::Implementation
    } else {
        best_type
    }
}
