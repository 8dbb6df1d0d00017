//! Pattern expansion against a live filesystem.
//!
//! A pattern is one of:
//!
//! - a directory marker (`src/`): every regular file beneath it, recursively;
//! - a literal file (`README.md`) that exists under the root;
//! - a glob (`src/**/*.rs`), matched against root-relative paths.
//!
//! Every candidate then passes the root's `.gitignore` rules (unless ignored
//! files are explicitly included) and an optional host exclude list.
//! Expansion never fails: unreadable entries and bad globs contribute
//! nothing.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{debug, trace, warn};
use walkdir::{DirEntry, WalkDir};

/// VCS metadata directory never descended into.
const VCS_DIR: &str = ".git";

/// Characters that make a path component a glob.
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Build the ignore matcher from `<root>/.gitignore`.
///
/// A missing file yields an empty matcher; an unreadable or partly invalid
/// one is logged and applied as far as it parsed.
fn build_gitignore(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let gitignore_path = root.join(".gitignore");

    if gitignore_path.is_file()
        && let Some(err) = builder.add(&gitignore_path)
    {
        warn!(path = %gitignore_path.display(), error = %err, "Failed to load .gitignore");
    }

    match builder.build() {
        Ok(gi) => gi,
        Err(e) => {
            warn!(error = %e, "Failed to build gitignore matcher, using empty matcher");
            Gitignore::empty()
        }
    }
}

/// Expands include/exclude patterns for a single project root.
#[derive(Debug)]
pub struct PatternMatcher {
    root: PathBuf,
    gitignore: Gitignore,
    include_ignored: bool,
    excludes: Option<GlobSet>,
}

impl PatternMatcher {
    /// Create a matcher for `root`, reading its `.gitignore` once.
    pub fn new(root: impl Into<PathBuf>, include_ignored: bool) -> Self {
        let root = root.into();
        let gitignore = build_gitignore(&root);
        Self {
            root,
            gitignore,
            include_ignored,
            excludes: None,
        }
    }

    /// Also drop candidates whose root-relative path matches any of these
    /// globs. Invalid globs are logged and skipped.
    pub fn with_excludes<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut added = 0;
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    added += 1;
                }
                Err(e) => warn!(pattern, error = %e, "Skipping invalid exclude glob"),
            }
        }
        self.excludes = if added == 0 {
            None
        } else {
            match builder.build() {
                Ok(set) => Some(set),
                Err(e) => {
                    warn!(error = %e, "Failed to build exclude globs, excluding nothing");
                    None
                }
            }
        };
        self
    }

    /// The root this matcher expands against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expand every pattern and union the results.
    pub fn expand<S: AsRef<str>>(&self, patterns: &[S]) -> BTreeSet<PathBuf> {
        let mut out = BTreeSet::new();
        for pattern in patterns {
            self.expand_into(pattern.as_ref(), &mut out);
        }
        out
    }

    /// Expand a single pattern into `out`.
    pub fn expand_into(&self, pattern: &str, out: &mut BTreeSet<PathBuf>) {
        let Some(pattern) = self.normalize(pattern) else {
            return;
        };
        let before = out.len();

        if let Some(dir) = pattern.strip_suffix('/') {
            let dir = dir.trim_end_matches('/');
            let start = if dir.is_empty() {
                self.root.clone()
            } else {
                self.root.join(dir)
            };
            if start.is_dir() {
                self.walk_files(&start, |path| {
                    if self.accepts(&path) {
                        out.insert(path);
                    }
                });
            }
        } else if self.root.join(&pattern).is_file() {
            let path = self.root.join(&pattern);
            if self.accepts(&path) {
                out.insert(path);
            }
        } else if pattern.contains(GLOB_META) {
            self.expand_glob(&pattern, out);
        }

        if out.len() == before {
            debug!(root = %self.root.display(), pattern = %pattern, "Pattern matched no files");
        } else {
            trace!(pattern = %pattern, matched = out.len() - before, "Expanded pattern");
        }
    }

    /// Every accepted file under the root.
    pub fn all_files(&self) -> BTreeSet<PathBuf> {
        let mut out = BTreeSet::new();
        self.walk_files(&self.root, |path| {
            if self.accepts(&path) {
                out.insert(path);
            }
        });
        out
    }

    /// Whether `path` (absolute under the root, or root-relative) is matched
    /// by the root's ignore rules, directly or through a parent directory.
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if relative.has_root()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }

    fn accepts(&self, path: &Path) -> bool {
        if !self.include_ignored && self.is_ignored(path, false) {
            trace!(path = %path.display(), "Dropping ignored file");
            return false;
        }
        if let Some(excludes) = &self.excludes {
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if excludes.is_match(relative) {
                trace!(path = %path.display(), "Dropping excluded file");
                return false;
            }
        }
        true
    }

    fn expand_glob(&self, pattern: &str, out: &mut BTreeSet<PathBuf>) {
        let matcher: GlobMatcher = match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                debug!(pattern, error = %e, "Invalid glob pattern");
                return;
            }
        };

        let start = self.root.join(literal_prefix(pattern));
        if !start.is_dir() {
            return;
        }
        self.walk_files(&start, |path| {
            let relative = path.strip_prefix(&self.root).unwrap_or(path.as_path());
            if matcher.is_match(relative) && self.accepts(&path) {
                out.insert(path);
            }
        });
    }

    /// Walk regular files beneath `start` in name order, without following
    /// symlinked directories.
    fn walk_files(&self, start: &Path, mut visit: impl FnMut(PathBuf)) {
        let walker = WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.prunes(entry));

        for entry in walker {
            match entry {
                Ok(entry) if is_regular_file(&entry) => visit(entry.into_path()),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Skipping unreadable entry"),
            }
        }
    }

    fn prunes(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        if entry.file_name() == VCS_DIR {
            return true;
        }
        !self.include_ignored && self.is_ignored(entry.path(), true)
    }

    /// Canonical form: `/` separators, no leading `./`, root-relative when
    /// an absolute pattern points inside the root.
    ///
    /// Patterns that could name files outside the root (absolute paths
    /// elsewhere, or any `..` component) yield `None`.
    fn normalize(&self, pattern: &str) -> Option<String> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return None;
        }
        let mut normalized = if std::path::MAIN_SEPARATOR == '\\' {
            trimmed.replace('\\', "/")
        } else {
            trimmed.to_string()
        };

        if Path::new(&normalized).is_absolute() {
            let Ok(relative) = Path::new(&normalized).strip_prefix(&self.root) else {
                debug!(
                    root = %self.root.display(),
                    pattern = %normalized,
                    "Skipping absolute pattern outside the root"
                );
                return None;
            };
            let mut rel = relative.to_string_lossy().replace('\\', "/");
            if normalized.ends_with('/') {
                rel.push('/');
            }
            normalized = rel;
        }

        let mut rest = normalized.as_str();
        while let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        }
        if rest.is_empty() {
            // "./" alone names the root directory.
            return normalized.ends_with('/').then(|| "/".to_string());
        }
        if Path::new(rest)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            debug!(pattern = %rest, "Skipping pattern that leaves the root");
            return None;
        }
        Some(rest.to_string())
    }
}

fn is_regular_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
}

/// Leading directory components of a glob that contain no glob syntax.
fn literal_prefix(pattern: &str) -> PathBuf {
    let components: Vec<&str> = pattern.split('/').collect();
    let mut prefix = PathBuf::new();
    // The last component names files, never a directory to start from.
    for component in &components[..components.len().saturating_sub(1)] {
        if component.contains(GLOB_META) || component.is_empty() {
            break;
        }
        prefix.push(component);
    }
    prefix
}
