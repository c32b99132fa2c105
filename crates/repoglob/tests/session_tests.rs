//! Integration tests for glob sessions.
//!
//! Tests verify:
//! - matched paths resolve to their remote records
//! - a shared cache serves repeat sessions without requests
//! - branches of one repository never share records
//! - concurrent sessions on one cache fetch each directory once
//! - failing listings surface as the session error without stranding waiters
//! - the reported rate limit is the session minimum

use std::sync::Arc;
use std::time::Duration;

use repoglob::client::testing::MemoryClient;
use repoglob::{CacheStore, ContentError, EntryKind, Error, RepoTarget, RunOptions, run};

// ============================================================================
// Test Helpers
// ============================================================================

fn sample_tree() -> Arc<MemoryClient> {
    Arc::new(MemoryClient::with_paths(&[
        "a.txt",
        "b.md",
        "sub/c.txt",
        "sub/deep/d.txt",
    ]))
}

fn options(client: &Arc<MemoryClient>, cache: &CacheStore, pattern: &str) -> RunOptions {
    RunOptions::new("o", "r", pattern)
        .with_client(client.clone())
        .with_cache(cache.clone())
}

fn paths(entries: &[Arc<repoglob::RemoteEntry>]) -> Vec<&str> {
    entries.iter().map(|e| e.path.as_str()).collect()
}

// ============================================================================
// Matching
// ============================================================================

#[tokio::test]
async fn test_root_wildcard_single_fetch() {
    let client = Arc::new(MemoryClient::with_paths(&["a.txt", "b.md", "sub/"]));
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/*.txt")).await;

    assert!(outcome.error.is_none(), "{:?}", outcome.error);
    assert_eq!(paths(&outcome.entries), ["a.txt"]);
    assert_eq!(outcome.entries[0].kind, EntryKind::File);
    assert_eq!(outcome.meta.api_calls, 1);
    assert_eq!(outcome.meta.cache_hits, 0);
    assert_eq!(outcome.meta.limit, None);
}

#[tokio::test]
async fn test_globstar_resolves_nested_records() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let (entries, meta) = run(options(&client, &cache, "/**/*.txt"))
        .await
        .into_result()
        .unwrap();

    assert_eq!(paths(&entries), ["a.txt", "sub/c.txt", "sub/deep/d.txt"]);
    // One request per directory, however many branches reached it
    assert_eq!(meta.api_calls, 3);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_literal_prefix_starts_at_base() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/sub/*.txt")).await;

    assert!(outcome.error.is_none());
    assert_eq!(paths(&outcome.entries), ["sub/c.txt"]);
    assert_eq!(client.requested(), ["sub"]);
}

#[tokio::test]
async fn test_directory_matches_carry_records() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/*/")).await;

    assert!(outcome.error.is_none());
    assert_eq!(paths(&outcome.entries), ["sub"]);
    assert_eq!(outcome.entries[0].kind, EntryKind::Directory);
}

#[tokio::test]
async fn test_trailing_globstar_includes_base_record() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/sub/**")).await;

    assert!(outcome.error.is_none());
    assert_eq!(
        paths(&outcome.entries),
        ["sub", "sub/c.txt", "sub/deep", "sub/deep/d.txt"]
    );
    assert_eq!(outcome.entries[0].kind, EntryKind::Directory);
    // The base record comes from its parent listing
    assert_eq!(client.requested(), ["sub", "sub/deep", ""]);
    assert_eq!(outcome.meta.api_calls, 3);
}

#[tokio::test]
async fn test_root_globstar_has_no_root_record() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/**")).await;

    assert!(outcome.error.is_none());
    assert_eq!(
        paths(&outcome.entries),
        ["a.txt", "b.md", "sub", "sub/c.txt", "sub/deep", "sub/deep/d.txt"]
    );
}

#[tokio::test]
async fn test_branch_is_forwarded() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/*.md").with_branch("gh-pages")).await;

    assert_eq!(paths(&outcome.entries), ["b.md"]);
    assert_eq!(client.requested_branches(), [Some("gh-pages".to_string())]);
}

// ============================================================================
// Caching and Coalescing
// ============================================================================

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let first = run(options(&client, &cache, "/*.txt")).await;
    let second = run(options(&client, &cache, "/*.txt")).await;

    assert_eq!(first.meta.api_calls, 1);
    assert_eq!(second.meta.api_calls, 0);
    assert_eq!(second.meta.cache_hits, 1);
    assert_eq!(paths(&first.entries), paths(&second.entries));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_second_globstar_run_hits_every_listing() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let first = run(options(&client, &cache, "/**/*.txt")).await;
    let second = run(options(&client, &cache, "/**/*.txt")).await;

    assert_eq!(first.meta.api_calls, 3);
    assert_eq!(first.meta.cache_hits, 0);
    assert_eq!(second.meta.api_calls, 0);
    // One hit per directory: `/`, `/sub` and `/sub/deep`
    assert_eq!(second.meta.cache_hits, 3);
    assert_eq!(paths(&first.entries), paths(&second.entries));
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_branches_do_not_share_records() {
    let main = Arc::new(MemoryClient::with_paths(&["x"]));
    let pages = Arc::new(MemoryClient::with_paths(&["x/y.txt"]));
    let cache = CacheStore::new();

    let on_main = run(options(&main, &cache, "/*")).await;
    let on_pages = run(options(&pages, &cache, "/*/").with_branch("gh-pages")).await;

    assert_eq!(paths(&on_main.entries), ["x"]);
    assert_eq!(on_main.entries[0].kind, EntryKind::File);
    assert!(on_pages.error.is_none(), "{:?}", on_pages.error);
    assert_eq!(paths(&on_pages.entries), ["x"]);
    assert_eq!(on_pages.entries[0].kind, EntryKind::Directory);
    assert_eq!(pages.calls(), 1);
}

#[tokio::test]
async fn test_listing_corrects_seeded_base() {
    let client = sample_tree();
    let cache = CacheStore::new();

    // Seeds `/a.txt` as a directory, then fails to list it
    let failed = run(options(&client, &cache, "/a.txt/*")).await;
    assert!(matches!(
        failed.error,
        Some(Error::Content(ContentError::NotADirectory(_)))
    ));

    let dirs = run(options(&client, &cache, "/*/")).await;

    assert!(dirs.error.is_none());
    assert_eq!(paths(&dirs.entries), ["sub"]);
}

#[tokio::test]
async fn test_separate_stores_do_not_share() {
    let client = sample_tree();

    run(options(&client, &CacheStore::new(), "/*.txt")).await;
    let again = run(options(&client, &CacheStore::new(), "/*.txt")).await;

    assert_eq!(again.meta.api_calls, 1);
    assert_eq!(client.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_sessions_coalesce() {
    let client = Arc::new(
        MemoryClient::with_paths(&["a.txt", "sub/c.txt", "sub/deep/d.txt"])
            .with_latency(Duration::from_millis(5)),
    );
    let cache = CacheStore::new();

    let (one, two) = tokio::join!(
        run(options(&client, &cache, "/**/*.txt")),
        run(options(&client, &cache, "/**/*.txt")),
    );

    assert!(one.error.is_none() && two.error.is_none());
    assert_eq!(paths(&one.entries), paths(&two.entries));
    assert_eq!(client.calls(), 3);
    assert_eq!(one.meta.api_calls + two.meta.api_calls, 3);
    assert_eq!(cache.get(&RepoTarget::new("o", "r")).lifecycle().in_flight(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_failing_directory_reaches_every_branch() {
    let client = Arc::new(MemoryClient::with_paths(&[
        "a.txt",
        "other/e.txt",
        "sub/c.txt",
    ]));
    client.fail("sub", ContentError::Transport("connection reset".into()));
    let cache = CacheStore::new();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        run(options(&client, &cache, "/**/*.txt")),
    )
    .await
    .expect("session must not hang");

    assert!(matches!(
        outcome.error,
        Some(Error::Content(ContentError::Transport(_)))
    ));
    // Other branches still resolve
    assert_eq!(paths(&outcome.entries), ["a.txt", "other/e.txt"]);
    // `/sub` is reached by two pattern states and listed once
    assert_eq!(client.requested().iter().filter(|p| *p == "sub").count(), 1);
    assert_eq!(cache.get(&RepoTarget::new("o", "r")).lifecycle().in_flight(), 0);
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let client = sample_tree();
    client.fail("", ContentError::Unauthorized("Bad credentials".into()));
    let cache = CacheStore::new();

    let failed = run(options(&client, &cache, "/*.txt")).await;
    assert!(failed.into_result().is_err());

    client.heal("");
    let retried = run(options(&client, &cache, "/*.txt")).await;
    assert!(retried.error.is_none());
    assert_eq!(retried.meta.api_calls, 1);
}

#[tokio::test]
async fn test_missing_base_reports_not_found() {
    let client = sample_tree();
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/nope/*.txt")).await;

    assert!(matches!(
        outcome.error,
        Some(Error::Content(ContentError::NotFound(_)))
    ));
    assert!(outcome.entries.is_empty());
}

#[tokio::test]
async fn test_invalid_pattern_makes_no_request() {
    let client = sample_tree();
    let outcome = run(options(&client, &CacheStore::new(), "/../x")).await;

    assert!(matches!(outcome.error, Some(Error::Pattern(_))));
    assert_eq!(client.calls(), 0);
}

// ============================================================================
// Metadata and Options
// ============================================================================

#[tokio::test]
async fn test_rate_limit_is_session_minimum() {
    let client = sample_tree();
    client.report_rate_limits([50, 40, 45]);
    let cache = CacheStore::new();

    let outcome = run(options(&client, &cache, "/**")).await;

    assert_eq!(outcome.meta.api_calls, 3);
    assert_eq!(outcome.meta.limit, Some(40));

    // A fully cached session never sees a header
    let cached = run(options(&client, &cache, "/**")).await;
    assert_eq!(cached.meta.limit, None);
}

#[tokio::test]
async fn test_options_from_json_aliases() {
    let client = sample_tree();
    let options: RunOptions =
        serde_json::from_str(r#"{"user": "o", "repo": "r", "glob": "/*.md"}"#).unwrap();

    let outcome = run(options.with_client(client.clone()).with_cache(CacheStore::new())).await;

    assert_eq!(paths(&outcome.entries), ["b.md"]);
}
