//! Importance scoring: the signals that raise or lower how much weight a
//! memory gets during retrieval, plus the decay that erodes it over time
//! and the boost that resists decay when a memory proves useful.

use chrono::{DateTime, Utc};
use loki_contracts::{clamp, Outcome};

/// Inputs to the importance calculation, gathered from whichever entity is
/// being scored. Fields that don't apply to a given entity kind are `None`.
#[derive(Debug, Clone, Default)]
pub struct ImportanceSignals<'a> {
    pub outcome: Option<Outcome>,
    pub errors_resolved: usize,
    pub access_count: u64,
    pub confidence: Option<f64>,
    pub task_type: Option<&'a str>,
    pub phase: Option<&'a str>,
    pub category: Option<&'a str>,
}

/// Recomputes importance from a starting value (or 0.5 if this is the
/// first scoring pass) and the supplied signals, applying each adjustment
/// in the fixed order the spec requires: outcome, error resolution, access
/// frequency, confidence blend, then task-type relevance.
pub fn calculate_importance(current: Option<f64>, signals: &ImportanceSignals) -> f64 {
    let mut base = current.unwrap_or(0.5);

    match signals.outcome {
        Some(Outcome::Success) => base = clamp(base + 0.1, 0.0, 1.0),
        Some(Outcome::Failure) => base = clamp(base - 0.1, 0.0, 1.0),
        Some(Outcome::Partial) | None => {}
    }

    if signals.errors_resolved > 0 && matches!(signals.outcome, Some(Outcome::Success)) {
        base = clamp(base + 0.05 * signals.errors_resolved.min(3) as f64, 0.0, 1.0);
    }

    if signals.access_count > 0 {
        let access_boost = 0.05 * (1.0 + signals.access_count as f64).ln();
        base = clamp(base + access_boost, 0.0, 1.0);
    }

    if let Some(confidence) = signals.confidence {
        base = (base + confidence) / 2.0;
    }

    if let Some(task_type) = signals.task_type {
        let task_type = task_type.to_ascii_lowercase();
        if let Some(phase) = signals.phase {
            let phase = phase.to_ascii_lowercase();
            if !phase.is_empty() && (task_type.contains(&phase) || phase.contains(&task_type)) {
                base = clamp(base + 0.1, 0.0, 1.0);
            }
        }
        if let Some(category) = signals.category {
            let category = category.to_ascii_lowercase();
            if !category.is_empty() && (task_type.contains(&category) || category.contains(&task_type)) {
                base = clamp(base + 0.1, 0.0, 1.0);
            }
        }
    }

    round3(clamp(base, 0.0, 1.0))
}

/// Exponential decay toward a floor of 0.01, referenced from the entity's
/// most recent access/use time.
pub fn apply_decay(current_importance: f64, reference_time: DateTime<Utc>, now: DateTime<Utc>, decay_rate: f64, half_life_days: f64) -> f64 {
    let days_elapsed = (now - reference_time).num_milliseconds() as f64 / 86_400_000.0;
    if days_elapsed <= 0.0 {
        return current_importance;
    }
    let decay_factor = (-decay_rate * days_elapsed / half_life_days).exp();
    round3(f64::max(0.01, current_importance * decay_factor))
}

/// Diminishing-returns boost applied whenever a memory is retrieved:
/// `boost * (1 - importance)`, so well-established memories barely move
/// while rarely-used ones climb quickly.
pub fn boost_on_retrieval(current_importance: f64, boost: f64) -> f64 {
    let effective = boost * (1.0 - current_importance);
    round3(clamp(current_importance + effective, 0.0, 1.0))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn success_outcome_boosts_importance() {
        let signals = ImportanceSignals {
            outcome: Some(Outcome::Success),
            ..Default::default()
        };
        assert_eq!(calculate_importance(Some(0.5), &signals), 0.6);
    }

    #[test]
    fn failure_outcome_penalizes_importance() {
        let signals = ImportanceSignals {
            outcome: Some(Outcome::Failure),
            ..Default::default()
        };
        assert_eq!(calculate_importance(Some(0.5), &signals), 0.4);
    }

    #[test]
    fn error_resolution_boost_only_applies_on_success() {
        let resolved_on_success = ImportanceSignals {
            outcome: Some(Outcome::Success),
            errors_resolved: 5,
            ..Default::default()
        };
        // 0.5 + 0.1 (success) + 0.05*min(5,3)=0.15 -> 0.75
        assert_eq!(calculate_importance(Some(0.5), &resolved_on_success), 0.75);

        let resolved_on_failure = ImportanceSignals {
            outcome: Some(Outcome::Failure),
            errors_resolved: 5,
            ..Default::default()
        };
        // only the -0.1 outcome penalty applies
        assert_eq!(calculate_importance(Some(0.5), &resolved_on_failure), 0.4);
    }

    #[test]
    fn confidence_blend_happens_after_access_boost() {
        let signals = ImportanceSignals {
            access_count: 1,
            confidence: Some(0.9),
            ..Default::default()
        };
        // base=0.5, access_boost=0.05*ln(2)=0.0347 -> 0.5347, blend with 0.9 -> 0.7173... round3
        let result = calculate_importance(Some(0.5), &signals);
        assert!((result - 0.717).abs() < 0.001);
    }

    #[test]
    fn importance_never_exceeds_bounds() {
        let signals = ImportanceSignals {
            outcome: Some(Outcome::Success),
            task_type: Some("debugging"),
            phase: Some("debugging"),
            category: Some("debugging"),
            ..Default::default()
        };
        assert!(calculate_importance(Some(0.99), &signals) <= 1.0);
    }

    #[test]
    fn decay_floors_at_point_zero_one() {
        let now = Utc::now();
        let ref_time = now - Duration::days(3650);
        let decayed = apply_decay(0.9, ref_time, now, 0.1, 30.0);
        assert_eq!(decayed, 0.01);
    }

    #[test]
    fn decay_is_noop_with_no_elapsed_time() {
        let now = Utc::now();
        assert_eq!(apply_decay(0.5, now, now, 0.1, 30.0), 0.5);
    }

    #[test]
    fn boost_has_diminishing_returns_near_one() {
        let low = boost_on_retrieval(0.1, 0.1);
        let high = boost_on_retrieval(0.95, 0.1);
        assert!(low - 0.1 > high - 0.95);
    }
}
