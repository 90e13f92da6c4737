use thiserror::Error;

pub type RetrievalResult<T> = Result<T, RetrievalError>;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Memory(#[from] loki_memory::MemoryError),

    #[error(transparent)]
    VectorIndex(#[from] loki_vector_index::VectorIndexError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
