//! repoglob: glob patterns over a remote repository tree.
//!
//! This crate provides:
//!
//! - **Session**: one glob run from options to matched remote records
//! - **RemoteFs**: the `GlobFs` adapter that answers `stat` and `readdir`
//!   from cached GitHub directory listings
//! - **Cache**: append-only per-repository caches, shared process-wide
//! - **Lifecycle**: coalesces concurrent fetches of the same directory
//! - **Clients**: the GitHub contents API and an in-memory tree
//! - **Config**: session options and client settings

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod path_key;
pub mod session;
pub mod vfs;

pub use cache::{CacheStore, RepositoryCache};
pub use client::{ContentClient, GithubClient};
pub use config::{ClientConfig, Credentials, RunOptions};
pub use error::{Error, Result};
pub use lifecycle::{BlockGuard, Claim, Lifecycle, LifecycleError, Release, Subscription};
pub use path_key::{FetchKey, api_path, base_path, fetch_key, normalize, parent_dir, request_key};
pub use session::{RunMeta, RunOutcome, Session, SessionStats, run};
pub use vfs::{RemoteFs, RemoteStat};

// Record types, for callers that only depend on this crate
pub use repoglob_types::{
    ContentError, ContentListing, ContentRequest, ContentResult, EntryKind, RemoteEntry,
    RepoTarget, StatEntry,
};
