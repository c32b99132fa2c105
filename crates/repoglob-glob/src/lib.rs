//! repoglob-glob: glob matching and an async glob walker.
//!
//! Provides:
//! - **glob_match** / **Pattern**: single-component glob matching with braces
//! - **GlobPath**: a pattern split into directory segments with `**` support
//! - **GlobWalker**: expands a `GlobPath` over any `GlobFs`
//!
//! The walker only ever asks two questions of the filesystem: "what is this
//! path" (`stat`) and "what is in this directory" (`readdir`). Consumers
//! implement `GlobFs` to point the walker at local disks, in-memory trees,
//! or remote repositories.

pub mod glob;
mod glob_path;
mod walker;

pub use glob::{Pattern, contains_glob, expand_braces, glob_match};
pub use glob_path::{GlobPath, PathSegment, PatternError, join};
pub use walker::{GlobOptions, GlobOutput, GlobWalker};

use async_trait::async_trait;
use std::sync::Arc;

/// Metadata the walker needs about one path.
pub trait GlobStat: Send {
    /// True if this path is a directory that can be listed.
    fn is_dir(&self) -> bool;

    /// True if this path is a regular file.
    fn is_file(&self) -> bool;
}

/// The two-method filesystem the walker runs over.
///
/// Paths are absolute and `/`-separated regardless of host platform.
/// Both methods are async and produce exactly one result per call.
#[async_trait]
pub trait GlobFs: Send + Sync {
    /// Stat result type.
    type Stat: GlobStat;

    /// Error type for both operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Describe a path the walker has already seen in a listing (or the
    /// walk's base directory).
    async fn stat(&self, path: &str) -> Result<Self::Stat, Self::Error>;

    /// List the child names of a directory.
    async fn readdir(&self, path: &str) -> Result<Arc<[String]>, Self::Error>;
}
