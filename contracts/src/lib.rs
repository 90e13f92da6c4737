//! Shared entity types, identifiers and error taxonomy for the loki coordination runtime.
//!
//! Every other crate in the workspace depends on this one for the data model
//! described by the core spec: episodes, patterns, skills, agents, reputation,
//! consensus rounds and task items. Nothing here touches the filesystem or the
//! network; it is pure data plus the small amount of shared arithmetic (id
//! generation, namespace paths) that every tier needs identically.

pub mod entities;
pub mod error;
pub mod ids;
pub mod namespace;

pub use entities::*;
pub use error::{ContractError, ContractResult};
pub use ids::{generate_id, IdPrefix};
pub use namespace::Namespace;
