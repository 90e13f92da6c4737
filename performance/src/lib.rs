//! Rolling per-agent-type quality and duration tracking.
//!
//! Running averages plus a 20-entry recent-score ring buffer feed a trend
//! signal the composer uses to prefer consistently improving agent types.

pub mod error;
pub mod tracker;

pub use error::{PerformanceError, PerformanceResult};
pub use tracker::{AgentPerformance, PerformanceTracker, DEFAULT_STORAGE_PATH};
