//! Append-only caches of everything fetched from a repository.
//!
//! A [`CacheStore`] maps a repository and branch to a [`RepositoryCache`].
//! Each repository cache holds three maps (stat entries, directory listings,
//! raw remote records) and the [`Lifecycle`] that coordinates fetches into
//! it. Nothing is ever evicted. Fetched facts are never overwritten; only
//! synthetic seeds give way to the fetched entry for the same path.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};

use repoglob_glob::join;
use repoglob_types::{RemoteEntry, RepoTarget, StatEntry};

use crate::lifecycle::Lifecycle;
use crate::path_key::{FetchKey, normalize};

static SHARED: LazyLock<CacheStore> = LazyLock::new(CacheStore::new);

/// Handle to a set of repository caches. Clones share the same caches.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    repos: Arc<Mutex<HashMap<RepoTarget, Arc<RepositoryCache>>>>,
}

impl CacheStore {
    /// A fresh, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store used when a session is given no store.
    pub fn shared() -> Self {
        SHARED.clone()
    }

    /// The cache for `target`, created on first use.
    ///
    /// Each branch gets its own cache: the same path may be a file on one
    /// branch and a directory on another.
    pub fn get(&self, target: &RepoTarget) -> Arc<RepositoryCache> {
        let mut repos = self.repos.lock().unwrap_or_else(PoisonError::into_inner);
        repos
            .entry(target.clone())
            .or_insert_with(|| {
                tracing::debug!(
                    repo = %target.slug(),
                    branch = target.branch.as_deref().unwrap_or("(default)"),
                    "creating repository cache"
                );
                Arc::new(RepositoryCache::new(target.clone()))
            })
            .clone()
    }

    /// Number of repository/branch caches held.
    pub fn len(&self) -> usize {
        self.repos.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both handles point at the same caches.
    pub fn same_store(&self, other: &CacheStore) -> bool {
        Arc::ptr_eq(&self.repos, &other.repos)
    }
}

#[derive(Debug, Default)]
struct CacheMaps {
    stats: HashMap<String, StatEntry>,
    listings: HashMap<FetchKey, Arc<[String]>>,
    entries: HashMap<String, Arc<RemoteEntry>>,
    /// Stat entries inserted by `seed_stat` and not yet confirmed by a listing.
    seeded: HashSet<String>,
}

/// Everything known about one branch of one repository.
#[derive(Debug)]
pub struct RepositoryCache {
    target: RepoTarget,
    maps: RwLock<CacheMaps>,
    lifecycle: Lifecycle,
}

impl RepositoryCache {
    pub fn new(target: RepoTarget) -> Self {
        Self {
            target,
            maps: RwLock::new(CacheMaps::default()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn target(&self) -> &RepoTarget {
        &self.target
    }

    /// Coordinator for fetches into this cache.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Insert a synthetic stat entry unless `path` already has one.
    ///
    /// A seed is provisional: the first listing that reports `path` replaces
    /// it. Returns true if the entry was inserted.
    pub fn seed_stat(&self, path: &str, stat: StatEntry) -> bool {
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        let path = normalize(path);
        if maps.stats.contains_key(&path) {
            return false;
        }
        maps.stats.insert(path.clone(), stat);
        maps.seeded.insert(path);
        true
    }

    /// Install a directory listing together with its children's stat entries
    /// and raw records.
    ///
    /// All three maps are written under one lock, so readers see either none
    /// or all of it. Fetched entries that already exist are kept as they are;
    /// seeded stat entries are replaced. Returns the listing now cached under
    /// `key`.
    pub fn record_listing(&self, key: FetchKey, dir: &str, entries: &[RemoteEntry]) -> Arc<[String]> {
        let dir = normalize(dir);
        let names: Arc<[String]> = entries.iter().map(|entry| entry.name.clone()).collect();

        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        for entry in entries {
            let path = join(&dir, &entry.name);
            if maps.seeded.remove(&path) {
                maps.stats.insert(path.clone(), entry.stat());
            } else {
                maps.stats.entry(path.clone()).or_insert_with(|| entry.stat());
            }
            maps.entries
                .entry(path)
                .or_insert_with(|| Arc::new(entry.clone()));
        }
        maps.listings.entry(key).or_insert(names).clone()
    }

    pub fn lookup_stat(&self, path: &str) -> Option<StatEntry> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.stats.get(&normalize(path)).copied()
    }

    pub fn lookup_listing(&self, key: &FetchKey) -> Option<Arc<[String]>> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.listings.get(key).cloned()
    }

    pub fn lookup_entry(&self, path: &str) -> Option<Arc<RemoteEntry>> {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.entries.get(&normalize(path)).cloned()
    }

    /// True if `path` holds a seed no listing has confirmed yet.
    pub fn is_seeded(&self, path: &str) -> bool {
        let maps = self.maps.read().unwrap_or_else(PoisonError::into_inner);
        maps.seeded.contains(&normalize(path))
    }

    /// Number of directory listings held.
    pub fn listing_count(&self) -> usize {
        self.maps.read().unwrap_or_else(PoisonError::into_inner).listings.len()
    }
}
