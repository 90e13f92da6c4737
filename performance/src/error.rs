use thiserror::Error;

pub type PerformanceResult<T> = Result<T, PerformanceError>;

#[derive(Debug, Error)]
pub enum PerformanceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
