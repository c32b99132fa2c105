//! Remote content clients.
//!
//! A [`ContentClient`] answers one question: what is in this directory of
//! this repository at this ref. [`GithubClient`] asks the GitHub contents
//! API; [`testing::MemoryClient`] answers from an in-memory tree.

mod github;
pub mod testing;

use async_trait::async_trait;
use repoglob_types::{ContentListing, ContentRequest, ContentResult};

pub use github::GithubClient;

/// Lists directories of a remote repository.
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Fetch the listing named by `request`.
    ///
    /// Entries come back in the remote's order. A path naming a file is
    /// `ContentError::NotADirectory`.
    async fn list_directory(&self, request: &ContentRequest) -> ContentResult<ContentListing>;
}
