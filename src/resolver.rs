//! Resolution of scope selectors into concrete log files.
//!
//! Logs are laid out as `<root>/<channel-or-user>/<YYYY-MM-DD>.log`. A selector
//! becomes a glob over the directory level (`*`, `#chan`, `user`), every
//! matching directory contributes its `*.log` files (user patterns never
//! match `#` directories), and each candidate is
//! canonicalized and kept only if it still lies below the canonical root.
//! Candidates escaping the root (symlinks) are dropped without an error so
//! nothing about the surrounding filesystem is revealed.

use crate::error::Result;
use crate::scope::ScopeSelector;
use globset::{GlobBuilder, GlobMatcher};
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_EXTENSION: &str = ".log";

/// Directory under which all searchable files of one user/network reside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRoot {
    path: PathBuf,
}

impl LogRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A resolved log file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogFileRef {
    /// Canonical location, always a descendant of the canonical log root
    pub path: PathBuf,
    /// Channel or user name, taken from the parent directory
    pub name: String,
    /// Date token, taken from the file name without `.log`
    pub date: String,
}

impl LogFileRef {
    fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// Directory-level pattern derived from a selector.
enum DirPattern {
    Glob(GlobMatcher),
    /// Fallback for names that are not valid glob syntax (e.g. an unclosed
    /// `[`), which then only match themselves
    Literal(String),
}

impl DirPattern {
    fn for_selector(selector: &ScopeSelector) -> Self {
        let pattern = match selector {
            ScopeSelector::All => "*",
            ScopeSelector::Channel(name) | ScopeSelector::User(name) => name.as_str(),
        };

        match GlobBuilder::new(pattern).literal_separator(true).build() {
            Ok(glob) => DirPattern::Glob(glob.compile_matcher()),
            Err(err) => {
                debug!("scope pattern {pattern:?} is not a valid glob ({err}), matching literally");
                DirPattern::Literal(pattern.to_string())
            }
        }
    }

    fn matches(&self, name: &str, selector: &ScopeSelector) -> bool {
        // A user pattern must never select a channel directory
        if matches!(selector, ScopeSelector::User(_)) && name.starts_with('#') {
            return false;
        }
        match self {
            DirPattern::Glob(matcher) => matcher.is_match(name),
            DirPattern::Literal(literal) => name == literal,
        }
    }
}

/// Expands scope selectors into newest-first lists of log files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `selector` below a single root.
    ///
    /// # Errors
    /// * `InvalidName` if the selector's name contains a path separator
    pub fn resolve(&self, root: &LogRoot, selector: &ScopeSelector) -> Result<Vec<LogFileRef>> {
        self.resolve_all(std::slice::from_ref(root), selector)
    }

    /// Resolve `selector` below every root, merging the results.
    ///
    /// Files are deduplicated by canonical path and ordered by file name
    /// descending, which for `YYYY-MM-DD.log` names is newest first.
    pub fn resolve_all(
        &self,
        roots: &[LogRoot],
        selector: &ScopeSelector,
    ) -> Result<Vec<LogFileRef>> {
        selector.validate()?;
        let pattern = DirPattern::for_selector(selector);

        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for root in roots {
            for file in collect_root(root, &pattern, selector) {
                if seen.insert(file.path.clone()) {
                    files.push(file);
                }
            }
        }

        // Path order first so ties on the file name stay deterministic
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.sort_by(|a, b| b.file_name().cmp(a.file_name()));

        debug!(
            "resolved {} log files for scope {selector} across {} roots",
            files.len(),
            roots.len()
        );
        Ok(files)
    }
}

fn collect_root(root: &LogRoot, pattern: &DirPattern, selector: &ScopeSelector) -> Vec<LogFileRef> {
    let canonical_root = match fs::canonicalize(root.path()) {
        Ok(path) => path,
        Err(err) => {
            debug!("log root {} unavailable: {err}", root.path().display());
            return Vec::new();
        }
    };

    let entries = match fs::read_dir(&canonical_root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot list log root {}: {err}", canonical_root.display());
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let Some(name) = visible_name(&entry.file_name()) else {
            continue;
        };
        if !pattern.matches(&name, selector) {
            continue;
        }
        collect_dir(&canonical_root, &entry.path(), &name, &mut files);
    }
    files
}

fn collect_dir(canonical_root: &Path, dir: &Path, name: &str, files: &mut Vec<LogFileRef>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let Some(file_name) = visible_name(&entry.file_name()) else {
            continue;
        };
        let Some(date) = file_name.strip_suffix(LOG_EXTENSION) else {
            continue;
        };
        if date.is_empty() {
            continue;
        }

        let candidate = entry.path();
        let canonical = match fs::canonicalize(&candidate) {
            Ok(path) => path,
            Err(err) => {
                debug!("skipping {}: {err}", candidate.display());
                continue;
            }
        };
        if !canonical.starts_with(canonical_root) {
            debug!("dropping {} outside the log root", candidate.display());
            continue;
        }
        if !canonical.is_file() {
            continue;
        }

        files.push(LogFileRef {
            path: canonical,
            name: name.to_string(),
            date: date.to_string(),
        });
    }
}

/// UTF-8 names that are not hidden; shell globs never match dot files.
fn visible_name(name: &std::ffi::OsStr) -> Option<String> {
    let name = name.to_str()?;
    if name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}
