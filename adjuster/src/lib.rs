//! Mid-run agent team adjustment: watches live quality signals and
//! recommends adding specialists, trimming optional agents, or (in
//! principle, though no current rule produces it) replacing some of
//! both in the same cycle.

pub mod gate_map;

use loki_contracts::Agent;
use serde::Serialize;

const GATE_PASS_RATE_FLOOR: f64 = 0.5;
const MIN_ITERATION_FOR_GATE_RULE: u32 = 3;
const TEST_COVERAGE_FLOOR: f64 = 0.6;
const REVIEW_PASS_RATE_FLOOR: f64 = 0.5;
const HEALTHY_SIGNAL_FLOOR: f64 = 0.8;
const TRIM_MIN_TEAM_SIZE: usize = 4;
const TRIM_MIN_PRIORITY: u8 = 3;

/// Live quality signals the adjuster evaluates each cycle.
#[derive(Debug, Clone)]
pub struct QualitySignals {
    pub gate_pass_rate: f64,
    pub test_coverage: f64,
    pub review_pass_rate: f64,
    pub iteration_count: u32,
    pub failed_gates: Vec<String>,
}

impl Default for QualitySignals {
    fn default() -> Self {
        Self { gate_pass_rate: 1.0, test_coverage: 1.0, review_pass_rate: 1.0, iteration_count: 0, failed_gates: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentAction {
    None,
    Add,
    Remove,
    Replace,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentChange {
    pub agent_type: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustmentPlan {
    pub action: AdjustmentAction,
    pub agents_to_add: Vec<AgentChange>,
    pub agents_to_remove: Vec<AgentChange>,
    pub rationale: String,
}

/// Evaluates whether the current swarm composition needs adjustment,
/// applying four rules in order: specialist coverage for failing gates,
/// low test coverage, low review pass rate, and team trimming when
/// every signal is healthy.
pub fn evaluate_adjustment(current_agents: &[Agent], signals: &QualitySignals) -> AdjustmentPlan {
    let mut current_types: std::collections::HashSet<String> = current_agents.iter().map(|a| a.agent_type.clone()).collect();
    let mut agents_to_add = Vec::new();
    let agents_to_remove;
    let mut reasons = Vec::new();

    // Rule 1: failing quality gates after several iterations.
    if signals.gate_pass_rate < GATE_PASS_RATE_FLOOR && signals.iteration_count > MIN_ITERATION_FOR_GATE_RULE {
        for gate_name in &signals.failed_gates {
            if let Some(agent_type) = gate_map::gate_to_agent_type(gate_name) {
                if !current_types.contains(agent_type) {
                    agents_to_add.push(AgentChange { agent_type: agent_type.to_string(), reason: format!("Gate '{gate_name}' failing consistently") });
                    current_types.insert(agent_type.to_string());
                }
            }
        }
        if !agents_to_add.is_empty() {
            reasons.push(format!("Gate pass rate ({:.0}%) below 50% after {} iterations", signals.gate_pass_rate * 100.0, signals.iteration_count));
        }
    }

    // Rule 2: low test coverage.
    if signals.test_coverage < TEST_COVERAGE_FLOOR && !current_types.contains("eng-qa") {
        agents_to_add.push(AgentChange { agent_type: "eng-qa".to_string(), reason: format!("Test coverage at {:.0}%, below 60% threshold", signals.test_coverage * 100.0) });
        current_types.insert("eng-qa".to_string());
        reasons.push(format!("Test coverage ({:.0}%) critically low", signals.test_coverage * 100.0));
    }

    // Rule 3: low review pass rate.
    if signals.review_pass_rate < REVIEW_PASS_RATE_FLOOR && !current_types.contains("review-security") {
        agents_to_add.push(AgentChange { agent_type: "review-security".to_string(), reason: format!("Review pass rate at {:.0}%, adding security review", signals.review_pass_rate * 100.0) });
        current_types.insert("review-security".to_string());
        reasons.push(format!("Review pass rate ({:.0}%) below 50%", signals.review_pass_rate * 100.0));
    }

    // Rule 4: everything healthy — consider trimming the least critical agent.
    if signals.gate_pass_rate > HEALTHY_SIGNAL_FLOOR && signals.test_coverage > HEALTHY_SIGNAL_FLOOR && signals.review_pass_rate > HEALTHY_SIGNAL_FLOOR && current_agents.len() > TRIM_MIN_TEAM_SIZE && agents_to_add.is_empty() {
        let to_remove = current_agents.iter().filter(|a| a.priority >= TRIM_MIN_PRIORITY).max_by_key(|a| a.priority);
        if let Some(agent) = to_remove {
            agents_to_remove = vec![AgentChange { agent_type: agent.agent_type.clone(), reason: "All quality signals healthy; reducing team size".to_string() }];
            reasons.push("All signals above 80%; trimming optional agent".to_string());
        } else {
            agents_to_remove = vec![];
        }
    } else {
        agents_to_remove = vec![];
    }

    let action = match (!agents_to_add.is_empty(), !agents_to_remove.is_empty()) {
        (true, true) => AdjustmentAction::Replace,
        (true, false) => AdjustmentAction::Add,
        (false, true) => AdjustmentAction::Remove,
        (false, false) => {
            reasons.push("All quality signals within acceptable range".to_string());
            AdjustmentAction::None
        }
    };

    let rationale = if reasons.is_empty() { "No adjustment needed".to_string() } else { reasons.join("; ") };

    AdjustmentPlan { action, agents_to_add, agents_to_remove, rationale }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loki_contracts::AgentStatus;
    use std::collections::HashMap;

    fn agent(agent_type: &str, priority: u8) -> Agent {
        Agent { id: format!("{agent_type}-1"), agent_type: agent_type.to_string(), role: "engineer".to_string(), priority, capabilities: HashMap::new(), status: AgentStatus::Idle }
    }

    #[test]
    fn healthy_signals_need_no_adjustment() {
        let agents = vec![agent("eng-backend", 1)];
        let plan = evaluate_adjustment(&agents, &QualitySignals::default());
        assert_eq!(plan.action, AdjustmentAction::None);
    }

    #[test]
    fn failing_gates_after_several_iterations_add_specialists() {
        let agents = vec![agent("eng-backend", 1)];
        let signals = QualitySignals { gate_pass_rate: 0.3, iteration_count: 4, failed_gates: vec!["security_scan".to_string(), "unknown_gate".to_string()], ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.action, AdjustmentAction::Add);
        assert_eq!(plan.agents_to_add.len(), 1);
        assert_eq!(plan.agents_to_add[0].agent_type, "ops-security");
    }

    #[test]
    fn gate_rule_does_not_fire_before_iteration_three() {
        let agents = vec![agent("eng-backend", 1)];
        let signals = QualitySignals { gate_pass_rate: 0.2, iteration_count: 2, failed_gates: vec!["security".to_string()], ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.action, AdjustmentAction::None);
    }

    #[test]
    fn low_coverage_adds_eng_qa() {
        let agents = vec![agent("eng-backend", 1)];
        let signals = QualitySignals { test_coverage: 0.4, ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.action, AdjustmentAction::Add);
        assert_eq!(plan.agents_to_add[0].agent_type, "eng-qa");
    }

    #[test]
    fn low_review_pass_rate_adds_review_security() {
        let agents = vec![agent("eng-backend", 1)];
        let signals = QualitySignals { review_pass_rate: 0.3, ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.agents_to_add[0].agent_type, "review-security");
    }

    #[test]
    fn all_healthy_with_large_team_trims_lowest_priority() {
        let agents = vec![agent("eng-backend", 1), agent("eng-frontend", 2), agent("eng-qa", 3), agent("eng-perf", 5), agent("ops-devops", 4)];
        let signals = QualitySignals { gate_pass_rate: 0.95, test_coverage: 0.9, review_pass_rate: 0.85, ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.action, AdjustmentAction::Remove);
        assert_eq!(plan.agents_to_remove[0].agent_type, "eng-perf");
    }

    #[test]
    fn trim_skipped_when_no_agent_meets_priority_floor() {
        let agents = vec![agent("a", 1), agent("b", 1), agent("c", 1), agent("d", 1), agent("e", 1)];
        let signals = QualitySignals { gate_pass_rate: 0.95, test_coverage: 0.9, review_pass_rate: 0.85, ..QualitySignals::default() };
        let plan = evaluate_adjustment(&agents, &signals);
        assert_eq!(plan.action, AdjustmentAction::None);
    }
}
