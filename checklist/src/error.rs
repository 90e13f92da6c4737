use thiserror::Error;

pub type ChecklistResult<T> = Result<T, ChecklistError>;

#[derive(Debug, Error)]
pub enum ChecklistError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("checklist not found at {0}")]
    NotFound(String),
}
