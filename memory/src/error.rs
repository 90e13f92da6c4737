use thiserror::Error;

pub type MemoryResult<T> = Result<T, MemoryError>;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {kind}: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize {kind} at {path}: {source}")]
    Deserialize {
        kind: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("path `{0}` escapes the memory root")]
    PathEscape(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Contract(#[from] loki_contracts::ContractError),
}
