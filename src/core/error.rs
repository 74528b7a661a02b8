use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("No matching variant: {0}")]
    NoVariant(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Reload failed: {0}")]
    Reload(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Short machine-readable tag, used in error envelopes and gateway replies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::PermissionDenied(_) => "PermissionDenied",
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::TypeMismatch(_) => "TypeMismatch",
            Self::PreconditionFailed(_) => "PreconditionFailed",
            Self::NoVariant(_) => "NoVariant",
            Self::Serialization(_) => "SerializationError",
            Self::Backend(_) => "BackendUnavailable",
            Self::Reload(_) => "ReloadFailed",
            Self::Internal(_) => "Internal",
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {}", err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
