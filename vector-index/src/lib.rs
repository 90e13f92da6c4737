//! In-memory cosine-similarity vector index with flat-file persistence.
//!
//! No external linear-algebra crate — vectors are plain `Vec<f32>` and
//! similarity is a dot product over lazily-normalized copies. Persistence
//! writes a dense little-endian matrix file plus a JSON sidecar instead of
//! an `.npz`, since nothing downstream needs numpy's format.

pub mod error;
pub mod index;
pub mod persistence;

pub use error::{VectorIndexError, VectorIndexResult};
pub use index::{IndexStats, SearchHit, VectorIndex, DEFAULT_DIMENSION};
pub use persistence::{load, save};
