use thiserror::Error;

/// Contract-level failures. Implementation crates return `anyhow::Result` and
/// attach one of these at the boundary, so callers can `downcast_ref::<Error>()`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Scope violation: {0}")]
    ScopeViolation(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Unknown variant '{variant}'. Allowed: {allowed:?}")]
    UnknownVariant { variant: String, allowed: Vec<String> },

    #[error("Schema drift: {0}")]
    SchemaDrift(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
