//! Async glob walker, generic over `GlobFs`.
//!
//! Expands a pattern breadth-first. Every directory of one round is listed
//! concurrently, so sibling directories are requested at the same time.
//! Pattern states that share a directory (`**` produces these) share one
//! listing, and no directory is listed twice in a walk.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;

use crate::glob_path::{GlobPath, PathSegment, join};
use crate::{GlobFs, GlobStat};

/// Options for a walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobOptions {
    /// Let wildcards and `**` match names starting with `.`.
    pub dot: bool,
    /// Drop directories from the results.
    pub nodir: bool,
}

/// Result of a walk.
///
/// `error` holds the first failure. Listing failures drop only the branches
/// that needed that listing, so `matches` may still be populated next to an
/// error.
#[derive(Debug)]
pub struct GlobOutput<E> {
    /// Matched absolute paths, sorted.
    pub matches: Vec<String>,
    pub error: Option<E>,
}

impl<E> GlobOutput<E> {
    fn empty(error: Option<E>) -> Self {
        Self {
            matches: Vec::new(),
            error,
        }
    }
}

/// Expands one pattern over a `GlobFs`.
///
/// # Examples
/// ```ignore
/// use repoglob_glob::{GlobPath, GlobWalker};
///
/// let output = GlobWalker::new(&my_fs, GlobPath::new("/src/**/*.rs")?)
///     .run()
///     .await;
/// for path in output.matches {
///     println!("{path}");
/// }
/// ```
pub struct GlobWalker<'a, F: GlobFs> {
    fs: &'a F,
    pattern: GlobPath,
    cwd: String,
    options: GlobOptions,
}

/// How one directory expansion went wrong.
enum StepError<E> {
    /// `readdir` failed: drop this directory's states, keep walking.
    Listing(String, E),
    /// `stat` failed on a listed path: stop the walk.
    Fatal(E),
}

struct Step {
    dir: String,
    listing: Arc<[String]>,
    /// (path, is_dir) pairs selected by a final segment.
    candidates: Vec<(String, bool)>,
    /// Directory states for the next round.
    next: Vec<(String, usize)>,
}

/// Bookkeeping shared across rounds.
#[derive(Default)]
struct Frontier {
    seen: HashSet<(String, usize)>,
    pending: Vec<(String, usize)>,
    matches: BTreeSet<String>,
    listings: HashMap<String, Arc<[String]>>,
    unlistable: HashSet<String>,
}

impl<'a, F: GlobFs> GlobWalker<'a, F> {
    /// Create a walker for `pattern`, rooted at `/`.
    pub fn new(fs: &'a F, pattern: GlobPath) -> Self {
        Self {
            fs,
            pattern,
            cwd: String::from("/"),
            options: GlobOptions::default(),
        }
    }

    /// Directory that unanchored patterns are resolved against.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_options(mut self, options: GlobOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the walk to completion.
    pub async fn run(self) -> GlobOutput<F::Error> {
        let base = self.pattern.base_path_from(&self.cwd);

        match self.fs.stat(&base).await {
            Ok(stat) if stat.is_dir() => {}
            Ok(_) => return GlobOutput::empty(None),
            Err(err) => return GlobOutput::empty(Some(err)),
        }

        let mut frontier = Frontier::default();
        self.enqueue(&mut frontier, base, self.pattern.base_len());

        let mut first_error = None;

        while !frontier.pending.is_empty() {
            // Group this round's states by directory
            let mut round: BTreeMap<String, Vec<usize>> = BTreeMap::new();
            for (dir, idx) in frontier.pending.drain(..) {
                if !frontier.unlistable.contains(&dir) {
                    round.entry(dir).or_default().push(idx);
                }
            }
            tracing::trace!(pattern = %self.pattern.as_str(), dirs = round.len(), "glob round");

            let expansions = round.into_iter().map(|(dir, idxs)| {
                let known = frontier.listings.get(&dir).cloned();
                self.expand(dir, idxs, known)
            });
            let steps = join_all(expansions).await;

            let mut fatal = false;
            for step in steps {
                match step {
                    Ok(step) => {
                        frontier.listings.insert(step.dir, step.listing);
                        for (path, is_dir) in step.candidates {
                            self.accept(&mut frontier, path, is_dir);
                        }
                        for (dir, idx) in step.next {
                            self.enqueue(&mut frontier, dir, idx);
                        }
                    }
                    Err(StepError::Listing(dir, err)) => {
                        frontier.unlistable.insert(dir);
                        first_error.get_or_insert(err);
                    }
                    Err(StepError::Fatal(err)) => {
                        first_error.get_or_insert(err);
                        fatal = true;
                    }
                }
            }

            if fatal {
                break;
            }
        }

        GlobOutput {
            matches: frontier.matches.into_iter().collect(),
            error: first_error,
        }
    }

    /// Queue directory state `(dir, idx)` unless it was already visited.
    ///
    /// A globstar state also queues the state past it, since `**` may match
    /// zero directories.
    fn enqueue(&self, frontier: &mut Frontier, dir: String, idx: usize) {
        let segments = self.pattern.segments();

        if idx >= segments.len() {
            // Reached through a trailing `**`: the directory itself matches
            self.accept(frontier, dir, true);
            return;
        }

        if !frontier.seen.insert((dir.clone(), idx)) {
            return;
        }

        if segments[idx] == PathSegment::Globstar {
            self.enqueue(frontier, dir.clone(), idx + 1);
        }
        frontier.pending.push((dir, idx));
    }

    fn accept(&self, frontier: &mut Frontier, path: String, is_dir: bool) {
        if self.pattern.is_dir_only() && !is_dir {
            return;
        }
        if self.options.nodir && is_dir {
            return;
        }
        frontier.matches.insert(path);
    }

    /// Apply every state in `idxs` to one listing of `dir`.
    async fn expand(
        &self,
        dir: String,
        idxs: Vec<usize>,
        known: Option<Arc<[String]>>,
    ) -> Result<Step, StepError<F::Error>> {
        let segments = self.pattern.segments();

        let listing = match known {
            Some(listing) => listing,
            None => match self.fs.readdir(&dir).await {
                Ok(listing) => listing,
                Err(err) => return Err(StepError::Listing(dir, err)),
            },
        };

        let mut candidates = Vec::new();
        let mut next = Vec::new();
        for name in listing.iter() {
            let selecting: Vec<usize> = idxs
                .iter()
                .copied()
                .filter(|&idx| segments[idx].matches(name, self.options.dot))
                .collect();
            if selecting.is_empty() {
                continue;
            }

            let child = join(&dir, name);
            let is_dir = self
                .fs
                .stat(&child)
                .await
                .map_err(StepError::Fatal)?
                .is_dir();

            for idx in selecting {
                let last = idx + 1 == segments.len();
                match &segments[idx] {
                    PathSegment::Globstar => {
                        // Descend without consuming the globstar; past-it
                        // states come from `enqueue`
                        if last {
                            candidates.push((child.clone(), is_dir));
                        }
                        if is_dir {
                            next.push((child.clone(), idx));
                        }
                    }
                    _ if last => candidates.push((child.clone(), is_dir)),
                    _ => {
                        if is_dir {
                            next.push((child.clone(), idx + 1));
                        }
                    }
                }
            }
        }

        Ok(Step {
            dir,
            listing,
            candidates,
            next,
        })
    }
}
