//! Assembles an agent team from a [`Classification`], optional org-knowledge
//! patterns, and optional performance history.

pub mod registry;

use loki_contracts::Classification;
use loki_performance::PerformanceTracker;
use registry::role_for;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ComposedAgent {
    pub agent_type: String,
    pub role: String,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum CompositionSource {
    Classifier,
    OrgKnowledge,
    Override,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Composition {
    pub agents: Vec<ComposedAgent>,
    pub rationale: String,
    pub source: CompositionSource,
}

/// A minimal org-knowledge pattern: enough text fields to scan for
/// technology mentions, independent of `loki-contracts::Pattern`'s full
/// shape so callers can feed in lighter records too.
#[derive(Debug, Clone, Default)]
pub struct OrgPattern {
    pub name: String,
    pub pattern: String,
    pub description: String,
    pub category: String,
}

fn agent(agent_type: &str, role: &str, priority: u8) -> ComposedAgent {
    ComposedAgent {
        agent_type: agent_type.to_string(),
        role: role.to_string(),
        priority,
    }
}

fn base_team() -> Vec<ComposedAgent> {
    vec![
        agent("orch-planner", "orchestration", 1),
        agent("eng-backend", "engineering", 1),
        agent("review-code", "review", 1),
    ]
}

const FEATURE_AGENT_MAP: &[(&str, &str, &str)] = &[
    ("database_complexity", "eng-database", "engineering"),
    ("ui_complexity", "eng-frontend", "engineering"),
    ("external_apis", "eng-api", "engineering"),
    ("deployment_complexity", "ops-devops", "operations"),
    ("testing_requirements", "eng-qa", "engineering"),
    ("auth_complexity", "ops-security", "operations"),
];

const ENTERPRISE_AGENTS: &[(&str, &str)] = &[
    ("ops-sre", "operations"),
    ("ops-compliance", "operations"),
    ("data-analytics", "data"),
];

const TECH_TO_AGENT: &[(&str, &str)] = &[
    ("react", "eng-frontend"),
    ("vue", "eng-frontend"),
    ("svelte", "eng-frontend"),
    ("angular", "eng-frontend"),
    ("next.js", "eng-frontend"),
    ("nuxt", "eng-frontend"),
    ("postgresql", "eng-database"),
    ("mongodb", "eng-database"),
    ("redis", "eng-database"),
    ("mysql", "eng-database"),
    ("docker", "ops-devops"),
    ("kubernetes", "ops-devops"),
    ("terraform", "ops-devops"),
    ("playwright", "eng-qa"),
    ("cypress", "eng-qa"),
    ("jest", "eng-qa"),
    ("stripe", "eng-api"),
    ("graphql", "eng-api"),
    ("rest api", "eng-api"),
    ("react-native", "eng-mobile"),
    ("flutter", "eng-mobile"),
    ("swift", "eng-mobile"),
    ("kotlin", "eng-mobile"),
    ("ml", "data-ml"),
    ("machine learning", "data-ml"),
    ("analytics", "data-analytics"),
];

/// Composes a team from classification results, with optional org-pattern
/// and performance-history influence. `performance` is consulted only to
/// stably reorder same-priority specialists by descending quality score —
/// it never changes which agents are selected.
pub fn compose(
    classification: &Classification,
    org_patterns: &[OrgPattern],
    performance: Option<&PerformanceTracker>,
) -> Composition {
    let tier = classification.tier;
    let max_agents = classification.agent_count as usize;

    let mut agents = base_team();
    let mut added: HashSet<String> = agents.iter().map(|a| a.agent_type.clone()).collect();

    for (feature, agent_type, role) in FEATURE_AGENT_MAP {
        if classification.features.get(*feature).copied().unwrap_or(0) > 0 && !added.contains(*agent_type) {
            agents.push(agent(agent_type, role, 2));
            added.insert(agent_type.to_string());
        }
    }

    if tier == loki_contracts::Tier::Enterprise {
        for (agent_type, role) in ENTERPRISE_AGENTS {
            if !added.contains(*agent_type) {
                agents.push(agent(agent_type, role, 3));
                added.insert(agent_type.to_string());
            }
        }
    }

    let mut source = if classification.override_applied {
        CompositionSource::Override
    } else {
        CompositionSource::Classifier
    };

    if apply_org_patterns(&mut agents, &mut added, org_patterns) {
        source = CompositionSource::OrgKnowledge;
    }

    agents.sort_by_key(|a| a.priority);

    if let Some(tracker) = performance {
        reorder_by_performance(&mut agents, tracker);
    }

    if agents.len() > max_agents {
        agents.truncate(max_agents);
    }

    let rationale = build_rationale(tier, &classification.features, &agents, &source);

    Composition { agents, rationale, source }
}

fn apply_org_patterns(agents: &mut Vec<ComposedAgent>, added: &mut HashSet<String>, org_patterns: &[OrgPattern]) -> bool {
    let mut any_added = false;
    for pattern in org_patterns {
        let text = format!("{} {} {} {}", pattern.name, pattern.pattern, pattern.description, pattern.category).to_lowercase();
        for (tech, agent_type) in TECH_TO_AGENT {
            if text.contains(tech) && !added.contains(*agent_type) {
                agents.push(agent(agent_type, role_for(agent_type), 2));
                added.insert(agent_type.to_string());
                any_added = true;
            }
        }
    }
    any_added
}

/// Stably reorders agents sharing a priority tier by descending recorded
/// quality for their agent type; agents with no performance data sort
/// after those with data at the same priority.
fn reorder_by_performance(agents: &mut [ComposedAgent], tracker: &PerformanceTracker) {
    let scores = tracker.performance_scores();
    let mut start = 0;
    while start < agents.len() {
        let priority = agents[start].priority;
        let mut end = start;
        while end < agents.len() && agents[end].priority == priority {
            end += 1;
        }
        agents[start..end].sort_by(|a, b| {
            let score_a = scores.get(&a.agent_type).map(|s| s.avg_quality).unwrap_or(-1.0);
            let score_b = scores.get(&b.agent_type).map(|s| s.avg_quality).unwrap_or(-1.0);
            score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
        });
        start = end;
    }
}

fn build_rationale(
    tier: loki_contracts::Tier,
    features: &std::collections::HashMap<String, u32>,
    agents: &[ComposedAgent],
    source: &CompositionSource,
) -> String {
    let mut parts = vec![format!("Tier: {} ({} agents).", tier.as_str(), agents.len())];

    let active: Vec<&str> = features
        .iter()
        .filter(|(_, &v)| v > 0)
        .map(|(k, _)| k.as_str())
        .collect();
    if active.is_empty() {
        parts.push("No specific features detected; using base team.".to_string());
    } else {
        parts.push(format!("Active features: {}.", active.join(", ")));
    }

    let team: Vec<&str> = agents.iter().map(|a| a.agent_type.as_str()).collect();
    parts.push(format!("Team: {}.", team.join(", ")));

    let source_label = match source {
        CompositionSource::Classifier => "classifier",
        CompositionSource::OrgKnowledge => "org_knowledge",
        CompositionSource::Override => "override",
    };
    parts.push(format!("Source: {source_label}."));

    parts.join(" ")
}
