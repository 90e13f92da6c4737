//! Maps a failing quality gate name to the specialist agent type that
//! should be pulled in to address it.

/// Case-insensitive lookup; unknown gate names return `None` rather than
/// a default, so callers silently skip gates with no known specialist.
pub fn gate_to_agent_type(gate_name: &str) -> Option<&'static str> {
    match gate_name.to_lowercase().as_str() {
        "mock_detector" | "mock_detection" | "test_coverage" | "testing" | "unit_test" | "integration_test" | "e2e" => Some("eng-qa"),
        "security" | "security_scan" | "vulnerability" | "owasp" => Some("ops-security"),
        "code_quality" | "code_review" | "lint" | "static_analysis" => Some("review-code"),
        "performance" | "load_test" | "benchmark" => Some("eng-perf"),
        "deployment" | "ci_cd" => Some("ops-devops"),
        "infrastructure" => Some("eng-infra"),
        "database" | "migration" => Some("eng-database"),
        "frontend" | "ui" | "accessibility" => Some("eng-frontend"),
        "api" => Some("eng-api"),
        "documentation" => Some("prod-techwriter"),
        _ => None,
    }
}
