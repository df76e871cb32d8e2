use fieldwright_core::CoreError;
use fieldwright_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unresolvable host type: {0}")]
    UnresolvableType(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// A failure of the host content system itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("host rejected the request: {0}")]
    Rejected(String),

    #[error("still in use: {0}")]
    InUse(String),

    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// Why one batch item failed. Never aborts the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("unknown field type: {0}")]
    UnknownType(String),

    #[error("validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error(transparent)]
    Host(#[from] HostError),
}
