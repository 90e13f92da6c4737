use thiserror::Error;

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Memory(#[from] loki_memory::MemoryError),

    #[error(transparent)]
    Retrieval(#[from] loki_retrieval::RetrievalError),

    #[error(transparent)]
    Council(#[from] loki_council::error::CouncilError),

    #[error(transparent)]
    Bft(#[from] loki_bft::BftError),

    #[error(transparent)]
    Performance(#[from] loki_performance::PerformanceError),

    #[error(transparent)]
    Checklist(#[from] loki_checklist::error::ChecklistError),

    #[error("agent dispatch failed: {0}")]
    Executor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("no task queue entry for id {0}")]
    UnknownTask(String),
}
