use corotasks_core::AsyncError;
use thiserror::Error;

/// Errors raised while naming or resolving assets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The path is empty or contains a `..` segment.
    #[error("invalid asset path: {0}")]
    InvalidPath(String),
    /// No object could be resolved for the reference.
    #[error("asset not found: {0}")]
    NotFound(String),
    /// The resolved object has another concrete type than requested.
    #[error("asset {path} is not a {expected}")]
    TypeMismatch { path: String, expected: &'static str },
}

impl From<AssetError> for AsyncError {
    fn from(error: AssetError) -> Self {
        AsyncError::other(error)
    }
}
