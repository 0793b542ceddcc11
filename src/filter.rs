//! Exclusion policy.
//!
//! Decides, from names alone, which directories are pruned before descent
//! and which files are skipped before their content is read. The lists the
//! decisions are based on live in [`ExclusionRules`] so they can be printed,
//! extended from a config file, or replaced wholesale.
//!
//! A file is checked in a fixed order and the first matching rule wins:
//! exact name, project ignore file, sensitive-name heuristic, extension.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::Serialize;
use thiserror::Error;

/// Name of the optional gitignore-style file read from the project root.
pub const IGNORE_FILE_NAME: &str = ".projmarkignore";

/// Directories never descended into.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    // version control
    ".git",
    ".hg",
    ".svn",
    // dependency caches and virtualenvs
    "node_modules",
    "bower_components",
    "vendor",
    "venv",
    ".venv",
    "env",
    ".env",
    "renv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    ".hypothesis",
    ".tox",
    // build output
    "dist",
    "build",
    "target",
    "out",
    ".next",
    ".nuxt",
    "_site",
    ".jekyll-cache",
    ".gradle",
    ".parcel-cache",
    // editor state
    ".idea",
    ".vscode",
    ".vs",
    // temporary and coverage
    "tmp",
    "temp",
    "coverage",
    ".nyc_output",
];

/// Files skipped by exact name.
const DEFAULT_EXCLUDE_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
    "Gemfile.lock",
    "go.sum",
    "bun.lockb",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];

/// Lowercase substrings marking a file name as likely to hold secrets.
const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    ".env",
    "secret",
    "credential",
    "password",
    "passwd",
    "private_key",
    "privatekey",
    "api_key",
    "apikey",
    "access_token",
    "auth_token",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    ".pem",
    ".p12",
    ".pfx",
    ".keystore",
    ".jks",
    ".htpasswd",
    ".netrc",
    ".pgpass",
    ".npmrc",
    ".pypirc",
];

/// Extensions recognised as text or code.
const DEFAULT_ALLOW_EXTENSIONS: &[&str] = &[
    // python
    "py",
    "pyi",
    "pyx",
    "pxd",
    // web
    "js",
    "mjs",
    "cjs",
    "ts",
    "jsx",
    "tsx",
    "vue",
    "svelte",
    "html",
    "htm",
    "css",
    "scss",
    "sass",
    "less",
    // backend
    "java",
    "c",
    "h",
    "cc",
    "cpp",
    "hpp",
    "cs",
    "go",
    "rs",
    "php",
    "rb",
    "sql",
    "proto",
    "graphql",
    // shell and scripts
    "sh",
    "bash",
    "zsh",
    "fish",
    "ps1",
    "bat",
    "cmd",
    // data and config
    "json",
    "yaml",
    "yml",
    "toml",
    "ini",
    "cfg",
    "conf",
    "env",
    "xml",
    "lock",
    // documentation
    "md",
    "qmd",
    "rst",
    "tex",
    "txt",
    // other languages
    "scala",
    "kt",
    "kts",
    "swift",
    "m",
    "mm",
    "r",
    "pl",
    "pm",
    "groovy",
    "gradle",
    "clj",
    "cls",
    "ex",
    "exs",
    "lua",
    "dart",
    "zig",
    "hs",
    "ml",
    "erl",
    "nix",
];

/// Extension-less names recognised as text, compared lowercase with any
/// leading dot removed.
const DEFAULT_ALLOW_NAMES: &[&str] = &[
    "dockerfile",
    "containerfile",
    "makefile",
    "jenkinsfile",
    "vagrantfile",
    "gemfile",
    "rakefile",
    "procfile",
    "brewfile",
    "justfile",
    "gitignore",
    "dockerignore",
    "editorconfig",
    "pylintrc",
    "env",
    "license",
    "notice",
    "authors",
    "codeowners",
];

/// Binary, archive, and media extensions.
const DEFAULT_DENY_EXTENSIONS: &[&str] = &[
    "png",
    "jpg",
    "jpeg",
    "gif",
    "bmp",
    "ico",
    "webp",
    "tiff",
    "svg",
    "psd",
    "pdf",
    "zip",
    "tar",
    "gz",
    "tgz",
    "bz2",
    "xz",
    "7z",
    "rar",
    "jar",
    "war",
    "exe",
    "dll",
    "so",
    "dylib",
    "a",
    "o",
    "obj",
    "class",
    "pyc",
    "pyo",
    "wasm",
    "mp3",
    "mp4",
    "wav",
    "avi",
    "mov",
    "mkv",
    "flac",
    "ogg",
    "ttf",
    "otf",
    "woff",
    "woff2",
    "eot",
    "db",
    "sqlite",
    "bin",
    "dat",
    "iso",
    "dmg",
];

/// Bytes inspected by [`looks_binary`].
const BINARY_SAMPLE_LEN: usize = 8 * 1024;

/// Share of control bytes above which a sample is treated as binary.
const CONTROL_BYTE_RATIO: f64 = 0.30;

/// Errors raised while building an [`ExclusionPolicy`].
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid ignore file {path}: {source}")]
    IgnoreFile {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

/// Why an entry was left out of the report.
///
/// Variant order is the order in which the skipped-files ledger groups
/// entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExcludedDir,
    ExcludedFile,
    ExcludedExtension,
    SensitiveNamePattern,
    BinaryContent,
    TooLarge,
    Unreadable,
    FileCountBudgetExhausted,
    TotalSizeBudgetExhausted,
    DepthExceeded,
}

impl SkipReason {
    /// Every reason, in ledger order.
    pub const ALL: [SkipReason; 10] = [
        SkipReason::ExcludedDir,
        SkipReason::ExcludedFile,
        SkipReason::ExcludedExtension,
        SkipReason::SensitiveNamePattern,
        SkipReason::BinaryContent,
        SkipReason::TooLarge,
        SkipReason::Unreadable,
        SkipReason::FileCountBudgetExhausted,
        SkipReason::TotalSizeBudgetExhausted,
        SkipReason::DepthExceeded,
    ];

    /// Stable snake_case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ExcludedDir => "excluded_dir",
            SkipReason::ExcludedFile => "excluded_file",
            SkipReason::ExcludedExtension => "excluded_extension",
            SkipReason::SensitiveNamePattern => "sensitive_name_pattern",
            SkipReason::BinaryContent => "binary_content",
            SkipReason::TooLarge => "too_large",
            SkipReason::Unreadable => "unreadable",
            SkipReason::FileCountBudgetExhausted => "file_count_budget_exhausted",
            SkipReason::TotalSizeBudgetExhausted => "total_size_budget_exhausted",
            SkipReason::DepthExceeded => "depth_exceeded",
        }
    }

    /// Human-readable explanation used in the ledger headings.
    pub fn description(self) -> &'static str {
        match self {
            SkipReason::ExcludedDir => "excluded directory",
            SkipReason::ExcludedFile => "excluded by name",
            SkipReason::ExcludedExtension => "unsupported file type",
            SkipReason::SensitiveNamePattern => "name looks sensitive",
            SkipReason::BinaryContent => "binary content",
            SkipReason::TooLarge => "larger than the file size limit",
            SkipReason::Unreadable => "could not be read",
            SkipReason::FileCountBudgetExhausted => "file count limit reached",
            SkipReason::TotalSizeBudgetExhausted => "total size limit reached",
            SkipReason::DepthExceeded => "below the depth limit",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of filesystem entry being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// Outcome of running an entry through the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    Accept,
    Reject(SkipReason),
}

impl FilterResult {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterResult::Accept)
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<SkipReason> {
        match self {
            FilterResult::Accept => None,
            FilterResult::Reject(reason) => Some(*reason),
        }
    }
}

/// The name lists the policy consults.
///
/// Extensions are stored lowercase without a leading dot; sensitive patterns
/// and allow-listed names are stored lowercase. Directory and file names are
/// matched exactly, case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionRules {
    pub exclude_dirs: BTreeSet<String>,
    pub exclude_files: BTreeSet<String>,
    pub sensitive_patterns: BTreeSet<String>,
    pub allow_extensions: BTreeSet<String>,
    pub allow_names: BTreeSet<String>,
    pub deny_extensions: BTreeSet<String>,
}

impl Default for ExclusionRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        rules.add_exclude_dirs(DEFAULT_EXCLUDE_DIRS.iter().copied());
        rules.add_exclude_files(DEFAULT_EXCLUDE_FILES.iter().copied());
        rules.add_sensitive_patterns(DEFAULT_SENSITIVE_PATTERNS.iter().copied());
        rules.add_allow_extensions(DEFAULT_ALLOW_EXTENSIONS.iter().copied());
        rules.add_allow_names(DEFAULT_ALLOW_NAMES.iter().copied());
        rules.add_deny_extensions(DEFAULT_DENY_EXTENSIONS.iter().copied());
        rules
    }
}

impl ExclusionRules {
    /// Rules with every list empty. Nothing is excluded by name and no
    /// extension is allowed.
    pub fn empty() -> Self {
        Self {
            exclude_dirs: BTreeSet::new(),
            exclude_files: BTreeSet::new(),
            sensitive_patterns: BTreeSet::new(),
            allow_extensions: BTreeSet::new(),
            allow_names: BTreeSet::new(),
            deny_extensions: BTreeSet::new(),
        }
    }

    pub fn add_exclude_dirs<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs.extend(names.into_iter().map(Into::into));
    }

    pub fn add_exclude_files<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_files.extend(names.into_iter().map(Into::into));
    }

    pub fn add_sensitive_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sensitive_patterns
            .extend(patterns.into_iter().map(|p| p.into().to_lowercase()));
    }

    pub fn add_allow_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_extensions
            .extend(extensions.into_iter().map(|e| normalize_extension(&e.into())));
    }

    pub fn add_allow_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_names
            .extend(names.into_iter().map(|n| normalize_name(&n.into())));
    }

    pub fn add_deny_extensions<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny_extensions
            .extend(extensions.into_iter().map(|e| normalize_extension(&e.into())));
    }

    /// Exact, case-sensitive directory name match.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// Exact, case-sensitive file name match.
    pub fn is_excluded_file(&self, name: &str) -> bool {
        self.exclude_files.contains(name)
    }

    /// Case-insensitive substring match against the sensitive patterns.
    pub fn is_sensitive(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.sensitive_patterns
            .iter()
            .any(|pattern| lower.contains(pattern.as_str()))
    }

    /// Whether the file type is recognised as text by its extension or name.
    pub fn is_allowed_type(&self, name: &str) -> bool {
        match extension_of(name) {
            Some(ext) if self.deny_extensions.contains(&ext) => false,
            Some(ext) if self.allow_extensions.contains(&ext) => true,
            _ => self.allow_names.contains(&normalize_name(name)),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn normalize_name(name: &str) -> String {
    name.trim_start_matches('.').to_lowercase()
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Exclusion rules plus the optional project ignore file.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    rules: ExclusionRules,
    ignore: Option<Gitignore>,
}

impl ExclusionPolicy {
    pub fn new(rules: ExclusionRules) -> Self {
        Self {
            rules,
            ignore: None,
        }
    }

    /// Load gitignore-style patterns from `file`, anchored at `root`.
    pub fn with_ignore_file(mut self, root: &Path, file: &Path) -> Result<Self, FilterError> {
        let mut builder = GitignoreBuilder::new(root);
        if let Some(source) = builder.add(file) {
            return Err(FilterError::IgnoreFile {
                path: file.to_path_buf(),
                source,
            });
        }
        let gitignore = builder.build().map_err(|source| FilterError::IgnoreFile {
            path: file.to_path_buf(),
            source,
        })?;
        self.ignore = Some(gitignore);
        Ok(self)
    }

    /// Classify an entry by its base name, root-relative path, and kind.
    pub fn classify(&self, name: &str, relative: &Path, kind: EntryKind) -> FilterResult {
        match kind {
            EntryKind::Directory => self.check_directory(name, relative),
            EntryKind::File => self.check_file(name, relative),
        }
    }

    /// Directories are either accepted or pruned with `ExcludedDir`.
    pub fn check_directory(&self, name: &str, relative: &Path) -> FilterResult {
        if self.rules.is_excluded_dir(name) || self.is_ignored(relative, true) {
            FilterResult::Reject(SkipReason::ExcludedDir)
        } else {
            FilterResult::Accept
        }
    }

    pub fn check_file(&self, name: &str, relative: &Path) -> FilterResult {
        if self.rules.is_excluded_file(name) || self.is_ignored(relative, false) {
            return FilterResult::Reject(SkipReason::ExcludedFile);
        }
        if self.rules.is_sensitive(name) {
            return FilterResult::Reject(SkipReason::SensitiveNamePattern);
        }
        if !self.rules.is_allowed_type(name) {
            return FilterResult::Reject(SkipReason::ExcludedExtension);
        }
        FilterResult::Accept
    }

    fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        self.ignore
            .as_ref()
            .is_some_and(|gi| gi.matched(relative, is_dir).is_ignore())
    }
}

impl Default for ExclusionPolicy {
    fn default() -> Self {
        Self::new(ExclusionRules::default())
    }
}

/// Heuristic binary detection over the first few kilobytes: any NUL byte,
/// or too many control characters other than common whitespace and escape.
pub fn looks_binary(content: &[u8]) -> bool {
    let sample = &content[..content.len().min(BINARY_SAMPLE_LEN)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }
    let control = sample.iter().filter(|&&b| is_control_byte(b)).count();
    control as f64 / sample.len() as f64 > CONTROL_BYTE_RATIO
}

fn is_control_byte(b: u8) -> bool {
    (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file(policy: &ExclusionPolicy, name: &str) -> FilterResult {
        policy.check_file(name, Path::new(name))
    }

    #[test]
    fn test_default_dirs_pruned() {
        let policy = ExclusionPolicy::default();
        for name in ["node_modules", ".git", "__pycache__", "target", ".venv"] {
            assert_eq!(
                policy.check_directory(name, Path::new(name)),
                FilterResult::Reject(SkipReason::ExcludedDir),
                "{name}"
            );
        }
        assert!(policy.check_directory("src", Path::new("src")).is_accept());
    }

    #[test]
    fn test_dir_match_is_case_sensitive() {
        let policy = ExclusionPolicy::default();
        assert!(policy
            .check_directory("Node_Modules", Path::new("Node_Modules"))
            .is_accept());
    }

    #[test]
    fn test_caller_dirs_extend_defaults() {
        let mut rules = ExclusionRules::default();
        rules.add_exclude_dirs(["generated"]);
        let policy = ExclusionPolicy::new(rules);
        assert!(!policy
            .check_directory("generated", Path::new("generated"))
            .is_accept());
        assert!(!policy.check_directory(".git", Path::new(".git")).is_accept());
    }

    #[test]
    fn test_code_files_accepted() {
        let policy = ExclusionPolicy::default();
        for name in ["main.rs", "a.py", "README.md", "Makefile", "Dockerfile", ".gitignore"] {
            assert_eq!(file(&policy, name), FilterResult::Accept, "{name}");
        }
    }

    #[test]
    fn test_exact_name_exclusion() {
        let policy = ExclusionPolicy::default();
        assert_eq!(
            file(&policy, "package-lock.json"),
            FilterResult::Reject(SkipReason::ExcludedFile)
        );
        assert_eq!(
            file(&policy, "Cargo.lock"),
            FilterResult::Reject(SkipReason::ExcludedFile)
        );
    }

    #[test]
    fn test_lock_and_quarto_files_are_text() {
        let policy = ExclusionPolicy::default();
        for name in ["flake.lock", "analysis.qmd", "Report.QMD"] {
            assert_eq!(file(&policy, name), FilterResult::Accept, "{name}");
        }
        // well-known lock files are still dropped by exact name
        assert_eq!(
            file(&policy, "yarn.lock"),
            FilterResult::Reject(SkipReason::ExcludedFile)
        );
    }

    #[test]
    fn test_sensitive_beats_allowed_extension() {
        let policy = ExclusionPolicy::default();
        for name in ["secret.env", "client_secret.json", "Credentials.yaml", ".env", "id_rsa"] {
            assert_eq!(
                file(&policy, name),
                FilterResult::Reject(SkipReason::SensitiveNamePattern),
                "{name}"
            );
        }
    }

    #[test]
    fn test_exact_name_beats_sensitive() {
        let mut rules = ExclusionRules::default();
        rules.add_exclude_files(["secrets.py"]);
        let policy = ExclusionPolicy::new(rules);
        assert_eq!(
            file(&policy, "secrets.py"),
            FilterResult::Reject(SkipReason::ExcludedFile)
        );
    }

    #[test]
    fn test_extension_rules() {
        let policy = ExclusionPolicy::default();
        assert_eq!(
            file(&policy, "logo.png"),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
        assert_eq!(
            file(&policy, "data.parquet"),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
        assert_eq!(
            file(&policy, "NOEXTENSION"),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
        assert_eq!(file(&policy, "Main.JAVA"), FilterResult::Accept);
    }

    #[test]
    fn test_deny_beats_allow() {
        let mut rules = ExclusionRules::default();
        rules.add_allow_extensions([".png"]);
        let policy = ExclusionPolicy::new(rules);
        assert_eq!(
            file(&policy, "logo.png"),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
    }

    #[test]
    fn test_classify_dispatches_on_kind() {
        let policy = ExclusionPolicy::default();
        assert_eq!(
            policy.classify("build", Path::new("build"), EntryKind::Directory),
            FilterResult::Reject(SkipReason::ExcludedDir)
        );
        // a file named like an excluded directory is judged as a file
        assert_eq!(
            policy.classify("build", Path::new("build"), EntryKind::File),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
    }

    #[test]
    fn test_ignore_file() {
        let dir = TempDir::new().unwrap();
        let ignore_path = dir.path().join(IGNORE_FILE_NAME);
        fs::write(&ignore_path, "*.gen.ts\nfixtures/\n").unwrap();

        let policy = ExclusionPolicy::default()
            .with_ignore_file(dir.path(), &ignore_path)
            .unwrap();

        assert_eq!(
            policy.check_file("api.gen.ts", Path::new("src/api.gen.ts")),
            FilterResult::Reject(SkipReason::ExcludedFile)
        );
        assert!(policy.check_file("api.ts", Path::new("src/api.ts")).is_accept());
        assert_eq!(
            policy.check_directory("fixtures", Path::new("tests/fixtures")),
            FilterResult::Reject(SkipReason::ExcludedDir)
        );
    }

    #[test]
    fn test_empty_rules_reject_everything_by_type() {
        let policy = ExclusionPolicy::new(ExclusionRules::empty());
        assert_eq!(
            file(&policy, "main.rs"),
            FilterResult::Reject(SkipReason::ExcludedExtension)
        );
        assert!(policy.check_directory(".git", Path::new(".git")).is_accept());
    }

    #[test]
    fn test_looks_binary() {
        assert!(!looks_binary(b""));
        assert!(!looks_binary(b"fn main() {}\n\tlet x = 1;\r\n"));
        assert!(looks_binary(b"PK\x03\x04\x00\x00"));
        assert!(looks_binary(&[0x01, 0x02, 0x03, b'a']));
        assert!(!looks_binary("h\u{e9}llo w\u{f6}rld".as_bytes()));
    }

    #[test]
    fn test_skip_reason_names() {
        assert_eq!(SkipReason::TooLarge.to_string(), "too_large");
        assert_eq!(
            serde_json::to_string(&SkipReason::SensitiveNamePattern).unwrap(),
            "\"sensitive_name_pattern\""
        );
        let mut sorted = SkipReason::ALL;
        sorted.sort();
        assert_eq!(sorted, SkipReason::ALL);
    }
}
