//! Errors reported by remote content clients.

use thiserror::Error;

/// Result type for content client operations.
pub type ContentResult<T> = Result<T, ContentError>;

/// Transport and API failures of a directory fetch.
///
/// Clonable so one failed fetch can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("http {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("fetch abandoned: {0}")]
    Cancelled(String),
}

impl ContentError {
    /// Returns true for failures a later re-run might not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ContentError::RateLimited(_)
                | ContentError::Transport(_)
                | ContentError::Timeout(_)
                | ContentError::Cancelled(_)
        ) || matches!(self, ContentError::Http { status, .. } if *status >= 500)
    }
}

impl From<serde_json::Error> for ContentError {
    fn from(err: serde_json::Error) -> Self {
        ContentError::Decode(err.to_string())
    }
}
