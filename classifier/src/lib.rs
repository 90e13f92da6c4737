//! Rule-based PRD complexity classification — no LLM calls.
//!
//! Keyword matching over seven feature categories decides a complexity
//! tier and a confidence score; an `LOKI_COMPLEXITY` environment override
//! can force a tier for testing or operator control.

pub mod keywords;

use keywords::{ENTERPRISE_KEYWORDS, FEATURE_KEYWORDS};
use loki_contracts::{Classification, Tier};
use std::collections::HashMap;
use std::env;

/// Counts each keyword's presence at most once per category, regardless of
/// how many times it appears in the text.
pub fn extract_features(prd_text: &str) -> HashMap<String, u32> {
    let text_lower = prd_text.to_lowercase();
    FEATURE_KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let hits = keywords.iter().filter(|kw| text_lower.contains(*kw)).count() as u32;
            (category.to_string(), hits)
        })
        .collect()
}

fn total_feature_hits(features: &HashMap<String, u32>) -> u32 {
    features.values().sum()
}

fn active_categories(features: &HashMap<String, u32>) -> u32 {
    features.values().filter(|&&v| v > 0).count() as u32
}

fn has_enterprise_keywords(prd_text: &str) -> bool {
    if prd_text.is_empty() {
        return false;
    }
    let text_lower = prd_text.to_lowercase();
    ENTERPRISE_KEYWORDS.iter().any(|kw| text_lower.contains(kw))
}

fn score_tier(features: &HashMap<String, u32>, prd_text: &str) -> Tier {
    let total = total_feature_hits(features);
    let active = active_categories(features);

    if has_enterprise_keywords(prd_text) || total > 25 {
        return Tier::Enterprise;
    }
    if total >= 16 || (total >= 12 && active >= 4) {
        return Tier::Complex;
    }
    if total >= 6 || active >= 3 {
        return Tier::Standard;
    }
    Tier::Simple
}

/// Confidence is highest far from a tier boundary (5.5 / 15.5 / 25.5) and
/// lowest right on one, with a clarity boost for broad category coverage
/// and a penalty for near-empty PRDs.
fn compute_confidence(features: &HashMap<String, u32>) -> f64 {
    let total = total_feature_hits(features) as f64;
    let boundaries = [5.5, 15.5, 25.5];
    let min_distance = boundaries.iter().map(|b| (total - b).abs()).fold(f64::INFINITY, f64::min);

    let mut confidence = (0.5 + min_distance * 0.05).min(0.95);

    if active_categories(features) >= 5 {
        confidence = (confidence + 0.05).min(0.95);
    }
    if total <= 2.0 {
        confidence = confidence.min(0.7);
    }

    (confidence * 100.0).round() / 100.0
}

/// Classifies PRD text into a complexity tier with confidence, feature
/// counts, and recommended agent count. `LOKI_COMPLEXITY` (one of the four
/// tier names, case-insensitive) forces that tier with confidence 1.0;
/// features are still computed and returned for observability.
pub fn classify(prd_text: &str) -> Classification {
    if let Ok(override_value) = env::var("LOKI_COMPLEXITY") {
        if let Some(tier) = Tier::parse(override_value.trim()) {
            let features = extract_features(prd_text);
            return Classification {
                tier,
                confidence: 1.0,
                features,
                agent_count: tier.recommended_agent_count(),
                override_applied: true,
            };
        }
    }

    let features = extract_features(prd_text);
    let tier = score_tier(&features, prd_text);
    Classification {
        tier,
        confidence: compute_confidence(&features),
        agent_count: tier.recommended_agent_count(),
        override_applied: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn empty_prd_is_simple() {
        let result = classify("");
        assert_eq!(result.tier, Tier::Simple);
        assert!(!result.override_applied);
    }

    #[test]
    fn keyword_rich_prd_trends_toward_complex() {
        let prd = "We need kubernetes, docker, ci/cd, terraform, postgresql, \
                    redis, oauth, stripe, webhook, e2e playwright tests, rbac, sso";
        let result = classify(prd);
        assert!(matches!(result.tier, Tier::Complex | Tier::Enterprise));
    }

    #[test]
    fn enterprise_keyword_forces_enterprise_tier() {
        let result = classify("This system requires SOC2 compliance and audit logging.");
        assert_eq!(result.tier, Tier::Enterprise);
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let features = extract_features("docker docker docker kubernetes");
        assert_eq!(features["deployment_complexity"], 2);
    }

    #[test]
    #[serial]
    fn env_override_forces_tier_with_full_confidence() {
        std::env::set_var("LOKI_COMPLEXITY", "Enterprise");
        let result = classify("a trivial landing page");
        std::env::remove_var("LOKI_COMPLEXITY");

        assert_eq!(result.tier, Tier::Enterprise);
        assert_eq!(result.confidence, 1.0);
        assert!(result.override_applied);
    }

    #[test]
    fn agent_counts_match_tiers() {
        assert_eq!(classify("").agent_count, 3);
    }
}
