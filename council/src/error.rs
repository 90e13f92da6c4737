use thiserror::Error;

pub type CouncilResult<T> = Result<T, CouncilError>;

#[derive(Debug, Error)]
pub enum CouncilError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
