//! Canonical paths and fetch keys.
//!
//! Every cache lookup goes through here, so `/a/b/`, `/a/b` and `a/b` all land
//! on the same entry and two logically identical fetches share one key.

use std::collections::BTreeMap;
use std::fmt;

use repoglob_glob::{GlobPath, PatternError};
use repoglob_types::ContentRequest;
use serde_json::Value as JsonValue;

/// Version tag of the fetch key layout. Bump when the field set changes so
/// old and new keys can never alias.
pub const KEY_SCHEMA: &str = "v1";

/// Normalize a `/`-separated path.
///
/// Ensures a leading `/`, drops trailing and repeated separators, keeps the
/// root as `/`. Idempotent.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for part in path.split('/').filter(|part| !part.is_empty()) {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Repository-relative form of a path, as the contents API wants it.
///
/// The root is the empty string.
pub fn api_path(path: &str) -> String {
    normalize(path).trim_start_matches('/').to_string()
}

/// Parent directory of a path, or `None` for the root.
pub fn parent_dir(path: &str) -> Option<String> {
    let path = normalize(path);
    if path == "/" {
        return None;
    }
    path.rsplit_once('/').map(|(parent, _)| normalize(parent))
}

/// Canonical identifier for one directory fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchKey(String);

impl FetchKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a fetch key from named fields.
///
/// Fields are ordered by name, so insertion order never matters. Names and
/// values are JSON-quoted, so no value can forge a separator.
pub fn fetch_key<'a, I>(fields: I) -> FetchKey
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let sorted: BTreeMap<&str, &str> = fields.into_iter().collect();
    let body = sorted
        .iter()
        .map(|(name, value)| format!("{}:{}", JsonValue::from(*name), JsonValue::from(*value)))
        .collect::<Vec<_>>()
        .join(",");
    FetchKey(format!("{KEY_SCHEMA}:{{{body}}}"))
}

/// Fetch key for a directory request. An absent branch is left out.
pub fn request_key(request: &ContentRequest) -> FetchKey {
    let mut fields = vec![
        ("owner", request.owner.as_str()),
        ("repo", request.repo.as_str()),
        ("path", request.path.as_str()),
    ];
    if let Some(branch) = &request.branch {
        fields.push(("branch", branch.as_str()));
    }
    fetch_key(fields)
}

/// The static directory prefix of a glob pattern.
pub fn base_path(pattern: &str) -> Result<String, PatternError> {
    Ok(GlobPath::new(pattern)?.base_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoglob_types::RepoTarget;
    use rstest::rstest;

    #[rstest]
    #[case::root("/", "/")]
    #[case::empty("", "/")]
    #[case::plain("/a/b", "/a/b")]
    #[case::trailing("/a/b/", "/a/b")]
    #[case::relative("a/b", "/a/b")]
    #[case::doubled("//a///b//", "/a/b")]
    fn normalizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize(input), expected);
        assert_eq!(normalize(&normalize(input)), expected);
    }

    #[test]
    fn api_paths() {
        assert_eq!(api_path("/"), "");
        assert_eq!(api_path("/docs/"), "docs");
        assert_eq!(api_path("docs/api"), "docs/api");
    }

    #[rstest]
    #[case::root("/", None)]
    #[case::top("/a.txt", Some("/"))]
    #[case::nested("a/b/", Some("/a"))]
    fn parents(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(parent_dir(input).as_deref(), expected);
    }

    #[test]
    fn key_ignores_field_order() {
        let a = fetch_key([("owner", "o"), ("repo", "r"), ("path", "p")]);
        let b = fetch_key([("path", "p"), ("repo", "r"), ("owner", "o")]);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("v1:"));
    }

    #[test]
    fn key_values_cannot_collide() {
        // Naive `join("/")` would make these identical
        let a = fetch_key([("owner", "a/b"), ("repo", "c")]);
        let b = fetch_key([("owner", "a"), ("repo", "b/c")]);
        assert_ne!(a, b);

        let quoted = fetch_key([("path", "x\",\"y")]);
        let split = fetch_key([("path", "x"), ("y", "")]);
        assert_ne!(quoted, split);
    }

    #[test]
    fn branch_partitions_keys() {
        let target = RepoTarget::new("jekyll", "jekyll");
        let default = request_key(&ContentRequest::new(&target, "docs"));
        let pages = request_key(&ContentRequest::new(&target.clone().with_branch("gh-pages"), "docs"));
        assert_ne!(default, pages);
        assert_eq!(default, request_key(&ContentRequest::new(&target, "docs")));
    }

    #[test]
    fn base_path_of_patterns() {
        assert_eq!(base_path("/*.txt").unwrap(), "/");
        assert_eq!(base_path("/src/**/*.rs").unwrap(), "/src");
        assert!(base_path("").is_err());
    }
}
