//! Run configuration.
//!
//! [`TraversalConfig`] is assembled in three layers: built-in defaults, an
//! optional TOML file (`--config`, or `.projmark.toml` in the project root),
//! and explicit overrides from the builder or command line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::filter::{ExclusionPolicy, ExclusionRules, FilterError, IGNORE_FILE_NAME};
use crate::tokens::Encoding;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 1000;
pub const DEFAULT_MAX_LINES: usize = 500;
pub const DEFAULT_MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;

/// Config file picked up from the project root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = ".projmark.toml";

/// Errors in configuration, detected before any traversal starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer")]
    NonPositive { name: &'static str },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Directory to walk.
    pub root: PathBuf,
    /// Name lists for the exclusion policy, caller additions included.
    pub rules: ExclusionRules,
    /// Deepest directory level whose children are listed (root = 0).
    pub max_depth: Option<usize>,
    /// Files larger than this are skipped unread.
    pub max_file_size: u64,
    /// Maximum number of included files.
    pub max_files: usize,
    /// Lines kept per file.
    pub max_lines: usize,
    /// Maximum bytes of included content across the run.
    pub max_total_size: u64,
    /// Honour `.projmarkignore` in the root.
    pub use_ignore_file: bool,
    /// Descend into symlinked directories.
    pub follow_symlinks: bool,
    /// Encoding for the token estimate.
    pub encoding: Encoding,
    /// Report destination; derived from the root name when absent.
    pub output: Option<PathBuf>,
    /// Paths the walk never reports, such as the default report directory.
    pub reserved: Vec<PathBuf>,
}

impl TraversalConfig {
    /// Default settings for walking `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rules: ExclusionRules::default(),
            max_depth: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_files: DEFAULT_MAX_FILES,
            max_lines: DEFAULT_MAX_LINES,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            use_ignore_file: true,
            follow_symlinks: false,
            encoding: Encoding::default(),
            output: None,
            reserved: Vec::new(),
        }
    }

    /// Reject non-positive limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("max-file-size", self.max_file_size == 0),
            ("max-files", self.max_files == 0),
            ("max-lines", self.max_lines == 0),
            ("max-total-size", self.max_total_size == 0),
        ];
        match checks.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(ConfigError::NonPositive { name: *name }),
            None => Ok(()),
        }
    }

    /// Layer a config file over the current settings.
    pub fn apply_file(&mut self, file: &FileConfig) {
        let limits = &file.limits;
        if limits.max_depth.is_some() {
            self.max_depth = limits.max_depth;
        }
        if let Some(size) = limits.max_file_size {
            self.max_file_size = size;
        }
        if let Some(files) = limits.max_files {
            self.max_files = files;
        }
        if let Some(lines) = limits.max_lines {
            self.max_lines = lines;
        }
        if let Some(total) = limits.max_total_size {
            self.max_total_size = total;
        }

        let rules = &file.rules;
        if rules.replace_defaults {
            self.rules = ExclusionRules::empty();
        }
        self.rules.add_exclude_dirs(rules.exclude_dirs.iter().cloned());
        self.rules.add_exclude_files(rules.exclude_files.iter().cloned());
        self.rules
            .add_sensitive_patterns(rules.sensitive_patterns.iter().cloned());
        self.rules.add_allow_extensions(rules.allow_extensions.iter().cloned());
        self.rules.add_allow_names(rules.allow_names.iter().cloned());
        self.rules.add_deny_extensions(rules.deny_extensions.iter().cloned());
    }

    /// Build the exclusion policy, loading the root's ignore file if enabled
    /// and present.
    pub fn exclusion_policy(&self) -> Result<ExclusionPolicy, ConfigError> {
        let policy = ExclusionPolicy::new(self.rules.clone());
        let ignore_path = self.root.join(IGNORE_FILE_NAME);
        if self.use_ignore_file && ignore_path.is_file() {
            tracing::debug!(path = %ignore_path.display(), "loading ignore file");
            return Ok(policy.with_ignore_file(&self.root, &ignore_path)?);
        }
        Ok(policy)
    }
}

/// Contents of a TOML config file.
///
/// ```toml
/// [limits]
/// max_depth = 4
/// max_lines = 200
///
/// [rules]
/// exclude_dirs = ["fixtures"]
/// sensitive_patterns = ["license_key"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub limits: LimitsSection,
    pub rules: RulesSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsSection {
    pub max_depth: Option<usize>,
    pub max_file_size: Option<u64>,
    pub max_files: Option<usize>,
    pub max_lines: Option<usize>,
    pub max_total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesSection {
    /// Start from empty lists instead of the built-in ones.
    pub replace_defaults: bool,
    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub sensitive_patterns: Vec<String>,
    pub allow_extensions: Vec<String>,
    pub allow_names: Vec<String>,
    pub deny_extensions: Vec<String>,
}

impl FileConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse config text; `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load `.projmark.toml` from `root` if it exists.
    pub fn discover(root: &Path) -> Result<Option<Self>, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        tracing::debug!(path = %path.display(), "using project config file");
        Self::load(&path).map(Some)
    }
}
