//! Directory traversal.
//!
//! Walks the root depth-first with [`ignore::WalkBuilder`]. Within each
//! directory, subdirectories are visited before files and both are sorted
//! case-insensitively, so the resulting tree (and therefore the report) does
//! not depend on the order the filesystem lists entries in.
//!
//! Only a missing or non-directory root is an error. Everything that goes
//! wrong below the root is recorded as a skip and the walk continues.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use ignore::{DirEntry, WalkBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::TraversalConfig;
use crate::extract::extract_file;
use crate::filter::{ExclusionPolicy, SkipReason};
use crate::tokens::TokenCounter;
use crate::tree::{name_order, to_slash, DirState, DirectoryNode, FileRecord};

/// Errors that stop a walk before it starts.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One line of the skipped-files ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Root-relative path with `/` separators.
    pub path: String,
    pub reason: SkipReason,
    /// Directory entries (depth-limited or unreadable) are not counted as
    /// skipped files.
    pub is_dir: bool,
}

/// Counters accumulated during a walk.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Absolute root path.
    pub root: PathBuf,
    pub files_included: usize,
    pub files_skipped: BTreeMap<SkipReason, usize>,
    pub files_truncated: usize,
    /// Bytes of included files.
    pub bytes_read: u64,
    pub estimated_tokens: usize,
    pub dirs_not_expanded: usize,
    pub dirs_unreadable: usize,
    pub timestamp: DateTime<Local>,
    pub elapsed: Duration,
}

impl RunSummary {
    fn new(root: PathBuf, timestamp: DateTime<Local>) -> Self {
        Self {
            root,
            files_included: 0,
            files_skipped: BTreeMap::new(),
            files_truncated: 0,
            bytes_read: 0,
            estimated_tokens: 0,
            dirs_not_expanded: 0,
            dirs_unreadable: 0,
            timestamp,
            elapsed: Duration::ZERO,
        }
    }

    /// Total skipped files across all reasons.
    pub fn total_skipped(&self) -> usize {
        self.files_skipped.values().sum()
    }

    /// Skipped files for one reason.
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.files_skipped.get(&reason).copied().unwrap_or(0)
    }

    /// Every candidate file the walk reached.
    pub fn candidates_seen(&self) -> usize {
        self.files_included + self.total_skipped()
    }

    fn record(&mut self, record: &FileRecord) {
        match record.skip {
            None => {
                self.files_included += 1;
                self.bytes_read += record.size;
                self.estimated_tokens += record.tokens;
                if record.truncated {
                    self.files_truncated += 1;
                }
            }
            Some(reason) => *self.files_skipped.entry(reason).or_insert(0) += 1,
        }
    }
}

/// Everything a walk produces.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub tree: DirectoryNode,
    pub summary: RunSummary,
    /// Skipped entries in traversal order.
    pub skipped: Vec<SkippedEntry>,
}

/// Configured traversal over one root.
///
/// # Examples
///
/// ```no_run
/// use projmark::config::TraversalConfig;
/// use projmark::walker::Walker;
///
/// let config = TraversalConfig::new("./project");
/// let policy = config.exclusion_policy().unwrap();
/// let outcome = Walker::new(&config, &policy).run().unwrap();
/// println!("{} files included", outcome.summary.files_included);
/// ```
pub struct Walker<'a> {
    config: &'a TraversalConfig,
    policy: &'a ExclusionPolicy,
    counter: TokenCounter,
    timestamp: Option<DateTime<Local>>,
}

impl<'a> Walker<'a> {
    pub fn new(config: &'a TraversalConfig, policy: &'a ExclusionPolicy) -> Self {
        Self {
            config,
            policy,
            counter: TokenCounter::new(config.encoding),
            timestamp: None,
        }
    }

    /// Fix the timestamp recorded in the summary instead of using the clock.
    pub fn timestamp(mut self, at: DateTime<Local>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Walk the tree.
    pub fn run(self) -> Result<WalkOutcome, WalkError> {
        let started = Instant::now();
        let root = &self.config.root;

        let metadata = fs::metadata(root).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                WalkError::NotFound { path: root.clone() }
            } else {
                WalkError::Io {
                    path: root.clone(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(WalkError::NotADirectory { path: root.clone() });
        }
        fs::read_dir(root).map_err(|source| WalkError::Io {
            path: root.clone(),
            source,
        })?;

        let absolute = root.canonicalize().unwrap_or_else(|_| root.clone());
        let reserved = reserved_paths(self.config, &absolute);
        let timestamp = self.timestamp.unwrap_or_else(Local::now);

        let mut state = WalkState {
            config: self.config,
            policy: self.policy,
            counter: &self.counter,
            summary: RunSummary::new(absolute.clone(), timestamp),
            ledger: Vec::new(),
            root: DirectoryNode::new(root_name(&absolute), PathBuf::new(), 0),
            open: Vec::new(),
        };

        for result in self.builder(reserved).build() {
            match result {
                Ok(entry) => state.visit(entry),
                Err(err) => state.visit_error(&err),
            }
        }
        state.close_to(1);

        let WalkState {
            mut summary,
            ledger,
            root: tree,
            ..
        } = state;
        summary.elapsed = started.elapsed();

        info!(
            root = %summary.root.display(),
            included = summary.files_included,
            skipped = summary.total_skipped(),
            bytes = summary.bytes_read,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "walk complete"
        );

        Ok(WalkOutcome {
            tree,
            summary,
            skipped: ledger,
        })
    }

    /// Sorted walk with excluded directories and reserved paths pruned.
    ///
    /// Directories one level past `max_depth` are still yielded so they can
    /// be shown as not expanded.
    fn builder(&self, reserved: Vec<PathBuf>) -> WalkBuilder {
        let root = self.config.root.clone();
        let policy = self.policy.clone();

        let mut builder = WalkBuilder::new(&self.config.root);
        builder
            .standard_filters(false)
            .follow_links(self.config.follow_symlinks)
            .max_depth(self.config.max_depth.map(|max| max.saturating_add(1)))
            .sort_by_file_path(entry_order)
            .filter_entry(move |entry| {
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                if reserved.iter().any(|path| path == relative) {
                    debug!(path = %to_slash(relative), "skipping output path");
                    return false;
                }
                if !entry.file_type().is_some_and(|t| t.is_dir()) {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                match policy.check_directory(&name, relative).reason() {
                    Some(reason) => {
                        debug!(path = %to_slash(relative), %reason, "pruned directory");
                        false
                    }
                    None => true,
                }
            });
        builder
    }
}

/// Display name of a root directory: its last component, or the whole path
/// for roots like `/`.
pub fn root_name(root: &Path) -> String {
    root.file_name().map_or_else(
        || root.to_string_lossy().into_owned(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Walk `config.root` with `policy`, stamping the summary with the clock.
pub fn walk(config: &TraversalConfig, policy: &ExclusionPolicy) -> Result<WalkOutcome, WalkError> {
    Walker::new(config, policy).run()
}

/// Directories before files, then case-insensitive names.
fn entry_order(a: &Path, b: &Path) -> Ordering {
    let name = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    b.is_dir()
        .cmp(&a.is_dir())
        .then_with(|| name_order(&name(a), &name(b)))
}

/// Root-relative forms of the output file and reserved paths that lie
/// under `root`.
fn reserved_paths(config: &TraversalConfig, root: &Path) -> Vec<PathBuf> {
    config
        .output
        .iter()
        .chain(&config.reserved)
        .filter_map(|path| resolve(path))
        .filter_map(|path| path.strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|relative| !relative.as_os_str().is_empty())
        .collect()
}

/// Canonical form of a path that may not exist yet.
fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = path.canonicalize() {
        return Some(canonical);
    }
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    resolve(parent).map(|parent| parent.join(name))
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithPath { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        _ => None,
    }
}

struct WalkState<'a> {
    config: &'a TraversalConfig,
    policy: &'a ExclusionPolicy,
    counter: &'a TokenCounter,
    summary: RunSummary,
    ledger: Vec<SkippedEntry>,
    root: DirectoryNode,
    /// Directories still receiving children, outermost first. The node at
    /// index `i` sits at depth `i + 1`.
    open: Vec<DirectoryNode>,
}

impl WalkState<'_> {
    fn parent(&mut self) -> &mut DirectoryNode {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    /// Close open directories until the next entry at `depth` has its
    /// parent on top.
    fn close_to(&mut self, depth: usize) {
        while self.open.len() >= depth.max(1) {
            let Some(node) = self.open.pop() else { break };
            self.parent().add_directory(node);
        }
    }

    fn visit(&mut self, entry: DirEntry) {
        let depth = entry.depth();
        if depth == 0 {
            return;
        }
        let Some(file_type) = entry.file_type() else {
            return;
        };
        self.close_to(depth);

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.into_path();

        if file_type.is_dir() {
            self.open_dir(name, depth);
        } else if file_type.is_file() {
            self.visit_file(name, &path);
        } else if file_type.is_symlink() {
            // links are only reported as links when not followed
            match fs::metadata(&path) {
                Ok(target) if target.is_dir() => {
                    debug!(path = %path.display(), "not following symlinked directory");
                }
                Ok(target) if target.is_file() => self.visit_file(name, &path),
                Ok(_) => trace!(path = %path.display(), "ignoring special file"),
                // dangling
                Err(_) => self.visit_file(name, &path),
            }
        } else {
            trace!(path = %path.display(), "ignoring special file");
        }
    }

    fn visit_error(&mut self, err: &ignore::Error) {
        if is_loop(err) {
            warn!(error = %err, "symlink loop, not descending");
            return;
        }
        let Some(path) = error_path(err) else {
            warn!(error = %err, "walk error");
            return;
        };
        let relative = path
            .strip_prefix(&self.config.root)
            .unwrap_or(path)
            .to_path_buf();

        if self.open.last().is_some_and(|dir| dir.relative_path == relative) {
            warn!(path = %path.display(), error = %err, "cannot list directory");
            if let Some(dir) = self.open.last_mut() {
                dir.state = DirState::Unreadable;
            }
            self.summary.dirs_unreadable += 1;
            self.ledger.push(SkippedEntry {
                path: to_slash(&relative),
                reason: SkipReason::Unreadable,
                is_dir: true,
            });
        } else if fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink()) {
            // a dangling link met while following links
            let Some(name) = path.file_name() else {
                return;
            };
            let name = name.to_string_lossy().into_owned();
            let path = path.to_path_buf();
            self.close_to(relative.components().count());
            self.visit_file(name, &path);
        } else {
            warn!(path = %path.display(), error = %err, "walk error");
        }
    }

    fn open_dir(&mut self, name: String, depth: usize) {
        let relative = self.parent().relative_path.join(&name);

        if self.config.max_depth.is_some_and(|max| depth > max) {
            debug!(path = %to_slash(&relative), depth, "depth limit reached");
            let node = DirectoryNode::unexpanded(name, relative, depth, DirState::DepthLimited);
            self.summary.dirs_not_expanded += 1;
            self.record_dir(&node, SkipReason::DepthExceeded);
            self.parent().add_directory(node);
            return;
        }

        self.open.push(DirectoryNode::new(name, relative, depth));
    }

    fn visit_file(&mut self, name: String, path: &Path) {
        let relative = self.parent().relative_path.join(&name);

        let record = match self.exhausted_budget() {
            Some(reason) => FileRecord::skipped(name, relative, 0, reason),
            None => match self.policy.check_file(&name, &relative).reason() {
                Some(reason) => FileRecord::skipped(name, relative, 0, reason),
                None => extract_file(path, &relative, self.config, self.counter),
            },
        };

        self.summary.record(&record);
        if let Some(reason) = record.skip {
            debug!(path = %record.display_path(), %reason, "skipped file");
            self.ledger.push(SkippedEntry {
                path: record.display_path(),
                reason,
                is_dir: false,
            });
        } else {
            trace!(path = %record.display_path(), lines = record.line_count, "included file");
        }
        self.parent().add_file(record);
    }

    fn exhausted_budget(&self) -> Option<SkipReason> {
        if self.summary.files_included >= self.config.max_files {
            Some(SkipReason::FileCountBudgetExhausted)
        } else if self.summary.bytes_read >= self.config.max_total_size {
            Some(SkipReason::TotalSizeBudgetExhausted)
        } else {
            None
        }
    }

    fn record_dir(&mut self, node: &DirectoryNode, reason: SkipReason) {
        self.ledger.push(SkippedEntry {
            path: node.display_path(),
            reason,
            is_dir: true,
        });
    }
}
