use thiserror::Error;

pub type ContractResult<T> = Result<T, ContractError>;

/// Errors raised while constructing or validating shared entities.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("invalid namespace `{0}`: must be non-empty and contain no path separators")]
    InvalidNamespace(String),

    #[error("value out of range: {field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("unknown complexity tier `{0}`")]
    UnknownTier(String),

    #[error("unknown task status `{0}`")]
    UnknownStatus(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
