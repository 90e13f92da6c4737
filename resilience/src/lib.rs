//! Resilience primitives shared across the coordination runtime.
//!
//! Retry-with-backoff, a circuit breaker, and structured logging helpers.
//! Everything here is infrastructure, not business logic — components reach
//! for it when they talk to something that can fail transiently (a child
//! process, an LLM request, a file lock).

pub mod circuit_breaker;
pub mod retry;
pub mod structured_logging;

pub use circuit_breaker::*;
pub use retry::*;
pub use structured_logging::*;
