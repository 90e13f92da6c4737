use chrono::{DateTime, Utc};
use loki_contracts::{AntiPattern, Episode, Pattern, Skill};
use serde::Serialize;

/// Which collection a retrieved item came from, matching the weight table's
/// column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Episodic,
    Semantic,
    Skills,
    AntiPatterns,
}

impl Source {
    pub fn as_str_key(self) -> &'static str {
        match self {
            Source::Episodic => "episodic",
            Source::Semantic => "semantic",
            Source::Skills => "skills",
            Source::AntiPatterns => "anti_patterns",
        }
    }
}

/// The entity payload a `RetrievedItem` carries, tagged by collection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Episode(Episode),
    Pattern(Pattern),
    Skill(Skill),
    AntiPattern(AntiPattern),
}

impl Payload {
    pub fn id(&self) -> &str {
        match self {
            Payload::Episode(e) => &e.id,
            Payload::Pattern(p) => &p.id,
            Payload::Skill(s) => &s.id,
            Payload::AntiPattern(a) => &a.id,
        }
    }

    pub fn importance(&self) -> f64 {
        match self {
            Payload::Episode(e) => e.importance,
            Payload::Pattern(p) => p.importance,
            Payload::Skill(s) => s.importance,
            Payload::AntiPattern(a) => a.importance,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Payload::Pattern(p) => p.confidence,
            _ => 1.0,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Payload::Episode(e) => e.timestamp,
            Payload::Pattern(p) => p.last_used,
            Payload::Skill(s) => s.last_used,
            Payload::AntiPattern(a) => a.last_used,
        }
    }
}

/// A candidate pulled from one of the four collections, carrying the
/// relevance signal it was found with before task-aware weighting.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub source: Source,
    pub base_relevance: f64,
    pub payload: Payload,
}

/// A fully scored item, ready to present or to feed into a token budget.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedItem {
    pub source: Source,
    pub payload: Payload,
    pub base_relevance: f64,
    pub weighted_score: f64,
    pub namespace: Option<String>,
}

impl RetrievedItem {
    pub fn id(&self) -> &str {
        self.payload.id()
    }
}
