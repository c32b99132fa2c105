//! Error types for glob sessions.

use repoglob_glob::PatternError;
use repoglob_types::ContentError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Result type for repoglob operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can end or spoil a glob session.
#[derive(Debug, Error)]
pub enum Error {
    /// A remote fetch failed. Recoverable: re-running the session retries it.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// `stat` on a path that no listing produced.
    #[error("no stat entry for {0}: path was never listed")]
    UnknownPath(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Missing or malformed options, reported before any network activity.
    #[error("invalid options: {0}")]
    Config(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("failed to build client: {0}")]
    Client(String),
}

impl Error {
    /// True for adapter/matcher contract violations (bugs, not runtime conditions).
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::UnknownPath(_) | Error::Lifecycle(_))
    }

    /// The remote failure behind this error, if any.
    pub fn as_content(&self) -> Option<&ContentError> {
        match self {
            Error::Content(err) => Some(err),
            _ => None,
        }
    }
}
