/// Agent type → category, used to classify org-pattern-derived additions by
/// role when no closer-fitting definition is available.
pub const SWARM_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "engineering",
        &["eng-backend", "eng-database", "eng-frontend", "eng-api", "eng-qa", "eng-mobile", "eng-perf", "eng-infra"],
    ),
    ("operations", &["ops-devops", "ops-security", "ops-sre", "ops-compliance"]),
    ("data", &["data-ml", "data-analytics"]),
    ("orchestration", &["orch-planner"]),
    ("review", &["review-code", "review-security"]),
];

pub fn role_for(agent_type: &str) -> &'static str {
    SWARM_CATEGORIES
        .iter()
        .find(|(_, types)| types.contains(&agent_type))
        .map(|(category, _)| *category)
        .unwrap_or("engineering")
}
