use thiserror::Error;

/// Errors raised by the reconciliation core.
///
/// Lookup misses and unresolved API versions are normally reported as
/// outcomes rather than errors; the variants exist for callers (like the
/// `show` command) that want to stop on them.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("could not resolve an API version for resource type '{0}'")]
    ApiVersion(String),

    #[error("resource '{0}' already has an operation in flight")]
    Busy(String),

    #[error("invalid operation transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

pub type TagResult<T> = std::result::Result<T, TagError>;
