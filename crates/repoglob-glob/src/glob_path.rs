//! Path patterns: a glob split into per-directory segments.
//!
//! - `/*.txt` matches `.txt` files in the root directory
//! - `src/**/*.rs` matches `.rs` files anywhere under `src`
//! - `docs/*/` matches directories directly under `docs`

use thiserror::Error;

use crate::glob::{Pattern, contains_glob};

/// Errors when parsing path patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
    #[error("invalid pattern: {0}")]
    Invalid(String),
}

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Literal name: `src`, `main.rs`
    Literal(String),
    /// Name pattern with wildcards: `*.rs`, `test_?`
    Pattern(Pattern),
    /// `**`: zero or more directory levels
    Globstar,
}

impl PathSegment {
    /// Returns true if this segment selects `name`.
    ///
    /// Dotfiles only match wildcard segments that start with a literal `.`,
    /// unless `dot` is set.
    pub fn matches(&self, name: &str, dot: bool) -> bool {
        match self {
            PathSegment::Literal(lit) => lit == name,
            PathSegment::Pattern(pat) => {
                if name.starts_with('.') && !dot && !pat.starts_with_dot() {
                    return false;
                }
                pat.matches(name)
            }
            PathSegment::Globstar => dot || !name.starts_with('.'),
        }
    }
}

/// A parsed path pattern with globstar support.
///
/// ```
/// use repoglob_glob::GlobPath;
///
/// let pattern = GlobPath::new("/src/**/*.rs").unwrap();
/// assert!(pattern.is_anchored());
/// assert_eq!(pattern.base_path(), "/src");
/// assert_eq!(pattern.segments().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct GlobPath {
    source: String,
    segments: Vec<PathSegment>,
    anchored: bool,
    dir_only: bool,
}

impl GlobPath {
    /// Parse a pattern.
    ///
    /// A leading `/` anchors the pattern at the filesystem root; otherwise it
    /// is resolved against the walker's working directory. A trailing `/`
    /// restricts matches to directories. Consecutive `**` collapse.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.trim().is_empty() {
            return Err(PatternError::Empty);
        }

        if brace_spans_separator(pattern) {
            return Err(PatternError::Invalid(format!(
                "brace alternatives cannot contain `/` in {pattern}"
            )));
        }

        let anchored = pattern.starts_with('/');
        let dir_only = pattern.len() > 1 && pattern.ends_with('/');
        let mut segments = Vec::new();

        for part in pattern.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(PatternError::Invalid(format!(
                        "`..` is not supported in {pattern}"
                    )));
                }
                "**" => {
                    if segments.last() != Some(&PathSegment::Globstar) {
                        segments.push(PathSegment::Globstar);
                    }
                }
                part if contains_glob(part) || part.contains('\\') => {
                    segments.push(PathSegment::Pattern(Pattern::new(part)));
                }
                part => segments.push(PathSegment::Literal(part.to_string())),
            }
        }

        if segments.is_empty() {
            return Err(PatternError::Invalid(format!("{pattern} names no entries")));
        }

        Ok(GlobPath {
            source: pattern.to_string(),
            segments,
            anchored,
            dir_only,
        })
    }

    /// The pattern text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Check if the pattern is anchored (starts with `/`).
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Check if the pattern only matches directories (ends with `/`).
    pub fn is_dir_only(&self) -> bool {
        self.dir_only
    }

    /// Number of leading literal segments that form the base directory.
    ///
    /// The final segment never counts: it is always matched against a
    /// listing of its parent, even when it is a literal name.
    pub fn base_len(&self) -> usize {
        let dirs = &self.segments[..self.segments.len() - 1];
        dirs.iter()
            .take_while(|seg| matches!(seg, PathSegment::Literal(_)))
            .count()
    }

    /// The static directory prefix of the pattern, as an absolute path.
    ///
    /// ```
    /// use repoglob_glob::GlobPath;
    ///
    /// assert_eq!(GlobPath::new("/*.txt").unwrap().base_path(), "/");
    /// assert_eq!(GlobPath::new("a/b/*/c").unwrap().base_path(), "/a/b");
    /// assert_eq!(GlobPath::new("docs/README.md").unwrap().base_path(), "/docs");
    /// ```
    pub fn base_path(&self) -> String {
        self.base_path_from("/")
    }

    /// The static directory prefix resolved against `cwd` when unanchored.
    pub fn base_path_from(&self, cwd: &str) -> String {
        let mut base = if self.anchored { String::from("/") } else { cwd.to_string() };
        for seg in &self.segments[..self.base_len()] {
            if let PathSegment::Literal(name) = seg {
                base = join(&base, name);
            }
        }
        base
    }
}

/// True if a closed `{...}` group contains a `/`.
///
/// Braces expand within one path component, so such a group would be split
/// apart before it could expand. Unclosed groups are literal and allowed.
fn brace_spans_separator(pattern: &str) -> bool {
    // One flag per open group: has it seen a `/`
    let mut open: Vec<bool> = Vec::new();
    let mut escaped = false;

    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => open.push(false),
            '}' => {
                if open.pop() == Some(true) {
                    return true;
                }
            }
            '/' => open.iter_mut().for_each(|seen| *seen = true),
            _ => {}
        }
    }

    false
}

/// Join a directory path and a child name with exactly one `/`.
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
