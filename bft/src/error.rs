use thiserror::Error;

pub type BftResult<T> = Result<T, BftError>;

#[derive(Debug, Error)]
pub enum BftError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
