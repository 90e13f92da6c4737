use thiserror::Error;

pub type VectorIndexResult<T> = Result<T, VectorIndexError>;

#[derive(Debug, Error)]
pub enum VectorIndexError {
    #[error("embedding dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embeddings batch has {embeddings} vectors but {ids} ids were supplied")]
    BatchLengthMismatch { ids: usize, embeddings: usize },

    #[error("embeddings batch has {embeddings} vectors but {metadata} metadata entries were supplied")]
    MetadataLengthMismatch { embeddings: usize, metadata: usize },

    #[error("index file not found: {0}")]
    NotFound(String),

    #[error("corrupt index file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
