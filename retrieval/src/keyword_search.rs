//! Substring-overlap relevance scoring, used when no embedding engine or
//! vector index is wired up. Each collection has its own field-weighted
//! formula rather than one generic bag-of-words score.

use loki_contracts::{AntiPattern, Episode, Pattern, Skill};

fn tokenize(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(|w| w.to_string()).collect()
}

fn hits(words: &[String], text: &str) -> f64 {
    let text = text.to_lowercase();
    words.iter().filter(|w| text.contains(w.as_str())).count() as f64
}

/// `1·goal_hits + 0.5·phase_hits`.
pub fn episodic_score(query: &str, episode: &Episode) -> f64 {
    let words = tokenize(query);
    hits(&words, &episode.goal) + 0.5 * hits(&words, &episode.phase)
}

/// `1·pattern_hits + 0.5·category_hits + 0.3·correct_approach_hits`, then
/// multiplied by the pattern's own confidence — carried over from the
/// original scoring even though the task-aware merge step applies a
/// confidence multiplier of its own.
pub fn semantic_score(query: &str, pattern: &Pattern) -> f64 {
    let words = tokenize(query);
    let raw = hits(&words, &pattern.pattern) + 0.5 * hits(&words, &pattern.category) + 0.3 * hits(&words, &pattern.correct_approach);
    raw * pattern.confidence
}

/// `2·name_hits + 1·description_hits + 0.5·steps_hits`.
pub fn skills_score(query: &str, skill: &Skill) -> f64 {
    let words = tokenize(query);
    let steps_text = skill.steps.join(" ");
    2.0 * hits(&words, &skill.name) + hits(&words, &skill.description) + 0.5 * hits(&words, &steps_text)
}

/// `2·what_fails_hits + 1·why_hits + 1·prevention_hits`.
pub fn anti_pattern_score(query: &str, anti: &AntiPattern) -> f64 {
    let words = tokenize(query);
    2.0 * hits(&words, &anti.what_fails) + hits(&words, &anti.why) + hits(&words, &anti.prevention)
}
