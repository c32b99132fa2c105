//! One glob invocation from pattern to resolved remote records.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use repoglob_glob::{GlobFs, GlobPath, GlobWalker};
use repoglob_types::{RemoteEntry, RepoTarget, StatEntry};
use serde::Serialize;

use crate::cache::{CacheStore, RepositoryCache};
use crate::client::{ContentClient, GithubClient};
use crate::config::{ClientConfig, RunOptions};
use crate::error::{Error, Result};
use crate::path_key::parent_dir;
use crate::vfs::RemoteFs;

/// Counters for one session.
///
/// The rate limit starts unbounded and only ever moves down.
#[derive(Debug)]
pub struct SessionStats {
    rate_limit: AtomicU64,
    cache_hits: AtomicUsize,
    api_calls: AtomicUsize,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            rate_limit: AtomicU64::new(u64::MAX),
            cache_hits: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
        }
    }
}

impl SessionStats {
    /// Fold a rate-limit-remaining report into the session minimum.
    pub fn observe_rate_limit(&self, remaining: u64) {
        self.rate_limit.fetch_min(remaining, Ordering::Relaxed);
    }

    /// A listing served from cache or from another caller's fetch.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// A request actually sent to the remote.
    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn meta(&self) -> RunMeta {
        let limit = self.rate_limit.load(Ordering::Relaxed);
        RunMeta {
            limit: (limit != u64::MAX).then_some(limit),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            api_calls: self.api_calls.load(Ordering::Relaxed),
        }
    }
}

/// Counters reported with every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMeta {
    /// Lowest rate-limit headroom reported during the session; `None` until
    /// a response reports one.
    pub limit: Option<u64>,
    /// Listings served without a request of their own.
    pub cache_hits: usize,
    /// Requests sent to the remote.
    pub api_calls: usize,
}

/// What a session produced.
///
/// `entries` holds every match that could be resolved even when `error` is
/// set. The repository root matches no record and is never included.
#[derive(Debug)]
pub struct RunOutcome {
    pub error: Option<Error>,
    /// Remote records of the matched paths, in matcher order.
    pub entries: Vec<Arc<RemoteEntry>>,
    pub meta: RunMeta,
}

impl RunOutcome {
    fn failed(error: Error) -> Self {
        Self {
            error: Some(error),
            entries: Vec::new(),
            meta: RunMeta::default(),
        }
    }

    /// Discard partial results on error.
    pub fn into_result(self) -> Result<(Vec<Arc<RemoteEntry>>, RunMeta)> {
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.entries, self.meta)),
        }
    }
}

/// Match `options.pattern` against the remote repository.
///
/// Option errors are reported before any request is made.
pub async fn run(options: RunOptions) -> RunOutcome {
    match Session::new(options) {
        Ok(session) => session.run().await,
        Err(err) => RunOutcome::failed(err),
    }
}

/// A configured session: resolved client, cache, and pattern.
pub struct Session {
    target: RepoTarget,
    pattern: GlobPath,
    cache: Arc<RepositoryCache>,
    client: Arc<dyn ContentClient>,
    fetch_timeout: Option<Duration>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("pattern", &self.pattern.as_str())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Validate options and resolve the client and cache. Makes no requests.
    pub fn new(options: RunOptions) -> Result<Self> {
        options.validate()?;
        let pattern = GlobPath::new(&options.pattern)?;
        let target = options.target();

        let client: Arc<dyn ContentClient> = match options.client {
            Some(client) => client,
            None => {
                let config = ClientConfig::load()?;
                Arc::new(GithubClient::from_config(&config, options.authenticate)?)
            }
        };

        let store = options.cache.unwrap_or_else(CacheStore::shared);
        let cache = store.get(&target);

        Ok(Self {
            target,
            pattern,
            cache,
            client,
            fetch_timeout: options.fetch_timeout,
        })
    }

    /// Walk the pattern and resolve every match to its remote record.
    pub async fn run(self) -> RunOutcome {
        self.cache.seed_stat("/", StatEntry::directory());
        let base = self.pattern.base_path();
        if self.cache.seed_stat(&base, StatEntry::directory()) {
            tracing::debug!(base = %base, "seeded glob base directory");
        }

        let stats = Arc::new(SessionStats::default());
        let fs = RemoteFs::new(self.cache.clone(), self.client.clone(), stats.clone())
            .with_fetch_timeout(self.fetch_timeout);

        let output = GlobWalker::new(&fs, self.pattern.clone()).with_cwd("/").run().await;
        let mut error = output.error;

        let mut entries = Vec::with_capacity(output.matches.len());
        for path in &output.matches {
            if let Some(entry) = self.cache.lookup_entry(path) {
                entries.push(entry);
                continue;
            }
            match resolve_unlisted(&fs, path).await {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => tracing::debug!(path = %path, "match has no remote record"),
                Err(err) => {
                    error.get_or_insert(err);
                }
            }
        }

        let meta = stats.meta();
        tracing::info!(
            owner = %self.target.owner,
            repo = %self.target.repo,
            pattern = %self.pattern.as_str(),
            matches = entries.len(),
            api_calls = meta.api_calls,
            cache_hits = meta.cache_hits,
            limit = ?meta.limit,
            failed = error.is_some(),
            "glob session finished"
        );

        RunOutcome { error, entries, meta }
    }
}

/// Record for a match the walk never listed: a seeded base directory that
/// `**` matched. Lists its parent to find it. The root has no record.
async fn resolve_unlisted(fs: &RemoteFs, path: &str) -> Result<Option<Arc<RemoteEntry>>> {
    let Some(parent) = parent_dir(path) else {
        return Ok(None);
    };
    fs.readdir(&parent).await?;
    Ok(fs.cache().lookup_entry(path))
}
