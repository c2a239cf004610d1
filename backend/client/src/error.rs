use thiserror::Error;

/// Failures surfaced to callers of the subscription lifecycle.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("push messaging is not supported on this platform")]
    Unsupported,

    #[error("notification permission was denied")]
    PermissionDenied,

    #[error("invalid application server key: {0}")]
    InvalidKey(String),

    #[error("platform push API failed: {0}")]
    Platform(String),

    /// The registry answered with a non-success status.
    #[error("subscription registry rejected the request ({status}): {body}")]
    RegistryRejected { status: u16, body: String },

    #[error("could not reach the subscription registry: {0}")]
    Transport(String),

    #[error("prompt state store failed: {0}")]
    Store(String),
}
