//! In-memory content client for tests and offline use.
//!
//! Serves a fixed tree and records every request, with knobs for latency,
//! failures, stalls, and rate-limit headers.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use repoglob_types::{ContentError, ContentListing, ContentRequest, ContentResult, EntryKind, RemoteEntry};

use super::ContentClient;

#[derive(Debug, Default)]
struct Tree {
    /// Directory API path ("" for the root) to its entries, in insertion order.
    listings: HashMap<String, Vec<RemoteEntry>>,
    kinds: HashMap<String, EntryKind>,
}

impl Tree {
    fn new() -> Self {
        let mut tree = Self::default();
        tree.listings.insert(String::new(), Vec::new());
        tree
    }

    /// Insert `path`, creating missing parent directories.
    fn insert(&mut self, path: &str, kind: EntryKind, size: u64) {
        let path = path.trim_matches('/');
        if path.is_empty() || self.kinds.contains_key(path) {
            return;
        }
        let parent = match path.rsplit_once('/') {
            Some((parent, _)) => {
                self.insert(parent, EntryKind::Directory, 0);
                parent.to_string()
            }
            None => String::new(),
        };
        self.kinds.insert(path.to_string(), kind);
        if kind == EntryKind::Directory {
            self.listings.entry(path.to_string()).or_default();
        }
        self.listings
            .entry(parent)
            .or_default()
            .push(RemoteEntry::new(path, kind, size));
    }
}

/// A [`ContentClient`] over an in-memory tree.
#[derive(Debug)]
pub struct MemoryClient {
    tree: Mutex<Tree>,
    latency: Option<Duration>,
    failures: Mutex<HashMap<String, ContentError>>,
    stalled: Mutex<HashSet<String>>,
    rate_limits: Mutex<VecDeque<u64>>,
    requests: Mutex<Vec<ContentRequest>>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self {
            tree: Mutex::new(Tree::new()),
            latency: None,
            failures: Mutex::default(),
            stalled: Mutex::default(),
            rate_limits: Mutex::default(),
            requests: Mutex::default(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryClient {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository holding `paths`. A trailing `/` marks a directory; everything
    /// else is a zero-byte file. Parents are created as needed.
    pub fn with_paths(paths: &[&str]) -> Self {
        let client = Self::new();
        {
            let mut tree = lock(&client.tree);
            for path in paths {
                if path.ends_with('/') {
                    tree.insert(path, EntryKind::Directory, 0);
                } else {
                    tree.insert(path, EntryKind::File, 0);
                }
            }
        }
        client
    }

    pub fn add_file(&self, path: &str, size: u64) {
        lock(&self.tree).insert(path, EntryKind::File, size);
    }

    pub fn add_dir(&self, path: &str) {
        lock(&self.tree).insert(path, EntryKind::Directory, 0);
    }

    /// Delay every response by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail listings of `path` with `error` until healed.
    pub fn fail(&self, path: &str, error: ContentError) {
        lock(&self.failures).insert(key(path), error);
    }

    pub fn heal(&self, path: &str) {
        lock(&self.failures).remove(&key(path));
        lock(&self.stalled).remove(&key(path));
    }

    /// Never answer listings of `path`.
    pub fn stall(&self, path: &str) {
        lock(&self.stalled).insert(key(path));
    }

    /// Rate-limit values reported by successive successful responses.
    pub fn report_rate_limits(&self, values: impl IntoIterator<Item = u64>) {
        lock(&self.rate_limits).extend(values);
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requested API paths, in arrival order.
    pub fn requested(&self) -> Vec<String> {
        lock(&self.requests).iter().map(|r| r.path.clone()).collect()
    }

    /// Requested branches, in arrival order.
    pub fn requested_branches(&self) -> Vec<Option<String>> {
        lock(&self.requests).iter().map(|r| r.branch.clone()).collect()
    }
}

#[async_trait]
impl ContentClient for MemoryClient {
    async fn list_directory(&self, request: &ContentRequest) -> ContentResult<ContentListing> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        let path = key(&request.path);

        let stalled = lock(&self.stalled).contains(&path);
        if stalled {
            std::future::pending::<()>().await;
        }

        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        let failure = lock(&self.failures).get(&path).cloned();
        if let Some(err) = failure {
            return Err(err);
        }

        let entries = {
            let tree = lock(&self.tree);
            match tree.kinds.get(&path) {
                Some(kind) if *kind != EntryKind::Directory => {
                    return Err(ContentError::NotADirectory(path));
                }
                _ => match tree.listings.get(&path) {
                    Some(entries) => entries.clone(),
                    None => return Err(ContentError::NotFound(path)),
                },
            }
        };

        Ok(ContentListing {
            entries,
            rate_limit_remaining: lock(&self.rate_limits).pop_front(),
        })
    }
}
