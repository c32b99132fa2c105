//! In-flight fetch coordination.
//!
//! At most one request per fetch key is outstanding. The first caller blocks
//! the key and performs the fetch; later callers register a waiter and are
//! woken, in registration order, when the fetch is released. The fetcher
//! records its result in the cache before releasing, so a woken waiter always
//! finds the listing in place.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use repoglob_types::ContentError;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::path_key::FetchKey;

/// How an in-flight fetch ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// The result was recorded in the cache.
    Completed,
    /// The fetch failed; every waiter gets the same error.
    Failed(ContentError),
}

/// Misuse of the coordination protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("fetch already in flight for {0}")]
    AlreadyBlocked(FetchKey),
    #[error("no fetch in flight for {0}")]
    NotBlocking(FetchKey),
    #[error("fetch for {0} completed without recording a listing")]
    Unrecorded(FetchKey),
}

/// Continuation run once when a key is released.
pub type Waiter = Box<dyn FnOnce(&Release) + Send>;

/// Tracks blocked fetch keys and the waiters parked on each.
#[derive(Default)]
pub struct Lifecycle {
    blocked: Mutex<HashMap<FetchKey, Vec<Waiter>>>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<FetchKey, Vec<Waiter>>> {
        self.blocked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while a fetch for `key` is outstanding.
    pub fn is_blocking(&self, key: &FetchKey) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    /// Mark `key` as in flight. Callers check `is_blocking` first.
    pub fn block(&self, key: &FetchKey) -> Result<(), LifecycleError> {
        let mut blocked = self.lock();
        if blocked.contains_key(key) {
            return Err(LifecycleError::AlreadyBlocked(key.clone()));
        }
        blocked.insert(key.clone(), Vec::new());
        Ok(())
    }

    /// Run `callback` once the in-flight fetch for `key` is released.
    ///
    /// Only valid while `key` is blocked.
    pub fn on_release<F>(&self, key: &FetchKey, callback: F) -> Result<(), LifecycleError>
    where
        F: FnOnce(&Release) + Send + 'static,
    {
        match self.lock().get_mut(key) {
            Some(waiters) => {
                waiters.push(Box::new(callback));
                Ok(())
            }
            None => Err(LifecycleError::NotBlocking(key.clone())),
        }
    }

    /// Future-flavoured `on_release`.
    pub fn subscribe(&self, key: &FetchKey) -> Result<Subscription, LifecycleError> {
        let (waiter, subscription) = Subscription::channel(key);
        self.on_release(key, waiter)?;
        Ok(subscription)
    }

    /// Unblock `key` and run its waiters in registration order.
    ///
    /// Waiters run after the internal lock is dropped, so they may call back
    /// into the lifecycle. Returns how many waiters were notified.
    pub fn release(&self, key: &FetchKey, outcome: Release) -> usize {
        let waiters = self.lock().remove(key).unwrap_or_default();
        let notified = waiters.len();
        for waiter in waiters {
            waiter(&outcome);
        }
        notified
    }

    /// Block `key` or, if it is already blocked, subscribe to it, as one step.
    pub fn claim(&self, key: &FetchKey) -> Claim<'_> {
        let mut blocked = self.lock();
        match blocked.get_mut(key) {
            Some(waiters) => {
                let (waiter, subscription) = Subscription::channel(key);
                waiters.push(waiter);
                Claim::Follower(subscription)
            }
            None => {
                blocked.insert(key.clone(), Vec::new());
                Claim::Leader(BlockGuard {
                    lifecycle: self,
                    key: key.clone(),
                    released: false,
                })
            }
        }
    }
}

/// Outcome of [`Lifecycle::claim`].
#[derive(Debug)]
pub enum Claim<'a> {
    /// The caller blocked the key and must fetch, then release.
    Leader(BlockGuard<'a>),
    /// Another caller is fetching; wait for its release.
    Follower(Subscription),
}

/// Ownership of a blocked key.
///
/// Dropping the guard without calling [`BlockGuard::release`] releases the
/// key as failed, so waiters are never stranded by a cancelled fetch.
#[derive(Debug)]
pub struct BlockGuard<'a> {
    lifecycle: &'a Lifecycle,
    key: FetchKey,
    released: bool,
}

impl BlockGuard<'_> {
    pub fn key(&self) -> &FetchKey {
        &self.key
    }

    /// Release the key with `outcome`. Returns how many waiters were notified.
    pub fn release(mut self, outcome: Release) -> usize {
        self.released = true;
        self.lifecycle.release(&self.key, outcome)
    }
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(key = %self.key, "in-flight fetch dropped before release");
            self.lifecycle.release(
                &self.key,
                Release::Failed(ContentError::Cancelled(self.key.to_string())),
            );
        }
    }
}

/// A pending notification for one released key.
#[derive(Debug)]
pub struct Subscription {
    key: FetchKey,
    rx: oneshot::Receiver<Release>,
}

impl Subscription {
    fn channel(key: &FetchKey) -> (Waiter, Subscription) {
        let (tx, rx) = oneshot::channel();
        let waiter: Waiter = Box::new(move |outcome: &Release| {
            // Explicitly ignored: the subscriber may have stopped waiting
            let _ = tx.send(outcome.clone());
        });
        let subscription = Subscription {
            key: key.clone(),
            rx,
        };
        (waiter, subscription)
    }

    /// Wait for the release.
    ///
    /// If the lifecycle is torn down without releasing, reports `Cancelled`.
    pub async fn wait(self) -> Release {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Release::Failed(ContentError::Cancelled(self.key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_key::fetch_key;
    use std::sync::Arc;

    fn key(path: &str) -> FetchKey {
        fetch_key([("owner", "o"), ("repo", "r"), ("path", path)])
    }

    #[test]
    fn block_and_release() {
        let lifecycle = Lifecycle::new();
        let k = key("docs");
        assert!(!lifecycle.is_blocking(&k));
        lifecycle.block(&k).unwrap();
        assert!(lifecycle.is_blocking(&k));
        assert_eq!(lifecycle.release(&k, Release::Completed), 0);
        assert!(!lifecycle.is_blocking(&k));
        // Blockable again after release
        lifecycle.block(&k).unwrap();
    }

    #[test]
    fn double_block_is_rejected() {
        let lifecycle = Lifecycle::new();
        let k = key("docs");
        lifecycle.block(&k).unwrap();
        assert_eq!(lifecycle.block(&k), Err(LifecycleError::AlreadyBlocked(k.clone())));
    }

    #[test]
    fn subscribe_requires_blocking() {
        let lifecycle = Lifecycle::new();
        let k = key("docs");
        let err = lifecycle.on_release(&k, |_| {}).unwrap_err();
        assert_eq!(err, LifecycleError::NotBlocking(k));
    }

    #[test]
    fn waiters_run_once_in_order() {
        let lifecycle = Lifecycle::new();
        let k = key("docs");
        let seen = Arc::new(Mutex::new(Vec::new()));
        lifecycle.block(&k).unwrap();

        for i in 0..3 {
            let seen = seen.clone();
            lifecycle
                .on_release(&k, move |outcome| {
                    seen.lock().unwrap().push((i, outcome.clone()));
                })
                .unwrap();
        }

        assert_eq!(lifecycle.release(&k, Release::Completed), 3);
        // A second release finds nothing to notify
        assert_eq!(lifecycle.release(&k, Release::Completed), 0);

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(0, Release::Completed), (1, Release::Completed), (2, Release::Completed)]
        );
    }

    #[test]
    fn waiter_may_reenter() {
        let lifecycle = Arc::new(Lifecycle::new());
        let k = key("docs");
        lifecycle.block(&k).unwrap();

        let inner = lifecycle.clone();
        let inner_key = k.clone();
        lifecycle
            .on_release(&k, move |_| {
                // Lock is not held while waiters run
                inner.block(&inner_key).unwrap();
            })
            .unwrap();

        lifecycle.release(&k, Release::Completed);
        assert!(lifecycle.is_blocking(&k));
    }

    #[tokio::test]
    async fn claim_elects_one_leader() {
        let lifecycle = Lifecycle::new();
        let k = key("src");

        let Claim::Leader(guard) = lifecycle.claim(&k) else {
            panic!("first claim should lead");
        };
        let Claim::Follower(first) = lifecycle.claim(&k) else {
            panic!("second claim should follow");
        };
        let Claim::Follower(second) = lifecycle.claim(&k) else {
            panic!("third claim should follow");
        };

        let failure = Release::Failed(ContentError::NotFound("src".into()));
        assert_eq!(guard.release(failure.clone()), 2);
        assert_eq!(first.wait().await, failure);
        assert_eq!(second.wait().await, failure);
        assert!(!lifecycle.is_blocking(&k));
    }

    #[tokio::test]
    async fn dropped_guard_releases_as_cancelled() {
        let lifecycle = Lifecycle::new();
        let k = key("src");

        let guard = lifecycle.claim(&k);
        let Claim::Follower(waiting) = lifecycle.claim(&k) else {
            panic!("second claim should follow");
        };
        drop(guard);

        assert!(matches!(waiting.wait().await, Release::Failed(ContentError::Cancelled(_))));
        assert!(!lifecycle.is_blocking(&k));
    }

    #[tokio::test]
    async fn subscription_future_resolves() {
        let lifecycle = Lifecycle::new();
        let k = key("src");
        lifecycle.block(&k).unwrap();
        let subscription = lifecycle.subscribe(&k).unwrap();
        lifecycle.release(&k, Release::Completed);
        assert_eq!(subscription.wait().await, Release::Completed);
    }
}
