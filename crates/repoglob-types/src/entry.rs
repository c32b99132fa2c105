//! Remote records: what a directory listing returns and what a request names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::stat::{EntryKind, StatEntry};

/// The full remote record for one path, as returned by the contents API.
///
/// The well-known fields are typed; everything else the remote sends
/// (`sha`, `url`, `download_url`, `_links`, ...) is kept verbatim in `extra`
/// so callers get the complete record back with their matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name (last path component).
    pub name: String,
    /// Repository-relative path, without a leading `/`.
    pub path: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Node kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Remaining fields of the remote record.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl RemoteEntry {
    /// Build a record with no extra fields.
    pub fn new(path: impl Into<String>, kind: EntryKind, size: u64) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            name,
            path,
            size,
            kind,
            extra: Map::new(),
        }
    }

    /// Stat metadata derived from this record.
    pub fn stat(&self) -> StatEntry {
        StatEntry {
            kind: self.kind,
            size: self.size,
        }
    }

    /// Absolute path of this record in the virtual tree (`/` + `path`).
    pub fn absolute_path(&self) -> String {
        format!("/{}", self.path.trim_matches('/'))
    }
}

/// A successful directory listing plus response metadata.
#[derive(Debug, Clone, Default)]
pub struct ContentListing {
    /// Entries in the order the remote returned them.
    pub entries: Vec<RemoteEntry>,
    /// Value of the rate-limit-remaining header, when the response carried one.
    pub rate_limit_remaining: Option<u64>,
}

/// Repository identity plus optional branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    /// Branch, tag, or commit. `None` means the remote's default branch.
    #[serde(default)]
    pub branch: Option<String>,
}

impl RepoTarget {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: None,
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// `owner/repo`, the cache store key.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// One directory-listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub owner: String,
    pub repo: String,
    /// Repository-relative directory path; the root is the empty string.
    pub path: String,
    pub branch: Option<String>,
}

impl ContentRequest {
    pub fn new(target: &RepoTarget, path: impl Into<String>) -> Self {
        Self {
            owner: target.owner.clone(),
            repo: target.repo.clone(),
            path: path.into(),
            branch: target.branch.clone(),
        }
    }
}
