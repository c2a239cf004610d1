use thiserror::Error;

/// Errors raised by a subscription registry backend.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subscription endpoint must be a non-empty string")]
    InvalidEndpoint,

    /// Any storage-layer failure. Not retried internally.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error type for the push subsystem.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("push sending is not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("transport error: {0}")]
    Transport(String),
}
