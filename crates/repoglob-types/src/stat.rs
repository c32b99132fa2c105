//! Stat metadata for nodes of the virtual tree.

use serde::{Deserialize, Serialize};

/// Kind of node, as reported by the remote contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    #[serde(rename = "dir")]
    Directory,
    Symlink,
    Submodule,
}

/// Metadata for one node of the virtual tree.
///
/// Written once per path and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatEntry {
    /// Kind of node.
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
}

impl StatEntry {
    /// A directory entry with size 0.
    pub const fn directory() -> Self {
        Self {
            kind: EntryKind::Directory,
            size: 0,
        }
    }

    /// A regular file of the given size.
    pub const fn file(size: u64) -> Self {
        Self {
            kind: EntryKind::File,
            size,
        }
    }

    /// Returns true if this entry is a regular file.
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    /// Returns true if this entry is a directory.
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}
