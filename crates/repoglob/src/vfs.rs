//! `GlobFs` over a remote repository.
//!
//! `stat` is answered purely from the cache. `readdir` is answered from the
//! cache, by waiting on an in-flight fetch of the same directory, or by
//! fetching it. Fetched listings are recorded before the fetch is released.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use repoglob_glob::{GlobFs, GlobStat};
use repoglob_types::{ContentError, ContentRequest, StatEntry};

use crate::cache::RepositoryCache;
use crate::client::ContentClient;
use crate::error::{Error, Result};
use crate::lifecycle::{BlockGuard, Claim, LifecycleError, Release};
use crate::path_key::{FetchKey, api_path, normalize, request_key};
use crate::session::SessionStats;

/// A cached `StatEntry` as the walker sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteStat(pub StatEntry);

impl GlobStat for RemoteStat {
    fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    fn is_file(&self) -> bool {
        self.0.is_file()
    }
}

/// One branch of a remote repository as a two-method filesystem.
///
/// Requests target whatever repository and branch `cache` belongs to.
pub struct RemoteFs {
    cache: Arc<RepositoryCache>,
    client: Arc<dyn ContentClient>,
    stats: Arc<SessionStats>,
    fetch_timeout: Option<Duration>,
}

impl RemoteFs {
    pub fn new(cache: Arc<RepositoryCache>, client: Arc<dyn ContentClient>, stats: Arc<SessionStats>) -> Self {
        Self {
            cache,
            client,
            stats,
            fetch_timeout: None,
        }
    }

    /// Fail fetches that take longer than `timeout`; waiters get the timeout error.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<RepositoryCache> {
        &self.cache
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Cached listing for `key`, counted as a hit.
    async fn cached(&self, key: &FetchKey) -> Option<Arc<[String]>> {
        let names = self.cache.lookup_listing(key)?;
        self.stats.record_cache_hit();
        // Hits complete on a later turn, same as fetches
        tokio::task::yield_now().await;
        Some(names)
    }

    async fn fetch(&self, request: &ContentRequest, dir: &str, guard: BlockGuard<'_>) -> Result<Arc<[String]>> {
        // Another fetch may have landed between the cache check and the claim
        if let Some(names) = self.cached(guard.key()).await {
            guard.release(Release::Completed);
            return Ok(names);
        }

        self.stats.record_api_call();
        tracing::debug!(owner = %request.owner, repo = %request.repo, path = %dir, "fetching directory");

        let result = match self.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, self.client.list_directory(request))
                .await
                .unwrap_or_else(|_| Err(ContentError::Timeout(dir.to_string()))),
            None => self.client.list_directory(request).await,
        };

        match result {
            Ok(listing) => {
                if let Some(remaining) = listing.rate_limit_remaining {
                    self.stats.observe_rate_limit(remaining);
                }
                let names = self.cache.record_listing(guard.key().clone(), dir, &listing.entries);
                let waiters = guard.release(Release::Completed);
                if waiters > 0 {
                    tracing::debug!(path = %dir, waiters, "released coalesced readers");
                }
                Ok(names)
            }
            Err(err) => {
                tracing::warn!(path = %dir, error = %err, "directory fetch failed");
                guard.release(Release::Failed(err.clone()));
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl GlobFs for RemoteFs {
    type Stat = RemoteStat;
    type Error = Error;

    async fn stat(&self, path: &str) -> Result<RemoteStat> {
        let path = normalize(path);
        let found = self.cache.lookup_stat(&path);
        tokio::task::yield_now().await;
        found.map(RemoteStat).ok_or(Error::UnknownPath(path))
    }

    async fn readdir(&self, path: &str) -> Result<Arc<[String]>> {
        let dir = normalize(path);
        let request = ContentRequest::new(self.cache.target(), api_path(&dir));
        let key = request_key(&request);

        if let Some(names) = self.cached(&key).await {
            tracing::trace!(path = %dir, "listing cache hit");
            return Ok(names);
        }

        let claim = self.cache.lifecycle().claim(&key);
        match claim {
            Claim::Leader(guard) => self.fetch(&request, &dir, guard).await,
            Claim::Follower(subscription) => {
                tracing::debug!(path = %dir, "joining in-flight fetch");
                match subscription.wait().await {
                    Release::Completed => match self.cached(&key).await {
                        Some(names) => Ok(names),
                        None => Err(LifecycleError::Unrecorded(key).into()),
                    },
                    Release::Failed(err) => Err(err.into()),
                }
            }
        }
    }
}
