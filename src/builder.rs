//! Fluent builder API for projmark.
//!
//! Provides both a builder and plain functions over the engine. Settings are
//! layered: built-in defaults, then a config file, then the values set on
//! the builder.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::{FileConfig, TraversalConfig};
use crate::errors::ProjmarkError;
use crate::output::{
    default_output_path, prepare_output, render_report, render_structure, summary_json,
    write_report, DEFAULT_OUTPUT_DIR,
};
use crate::tokens::Encoding;
use crate::tree::DirectoryNode;
use crate::walker::{root_name, WalkOutcome, Walker};

/// Builder for a project report.
///
/// # Examples
///
/// ```no_run
/// use projmark::builder::Projmark;
///
/// let result = Projmark::new("./project")
///     .max_depth(3)
///     .exclude_dirs(["fixtures"])
///     .run()
///     .unwrap();
///
/// println!("{}", result.render());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Projmark {
    root: PathBuf,
    config_file: Option<PathBuf>,
    max_depth: Option<usize>,
    max_file_size: Option<u64>,
    max_files: Option<usize>,
    max_lines: Option<usize>,
    max_total_size: Option<u64>,
    exclude_dirs: Vec<String>,
    exclude_files: Vec<String>,
    use_ignore_file: Option<bool>,
    follow_symlinks: Option<bool>,
    encoding: Option<Encoding>,
    output: Option<PathBuf>,
    timestamp: Option<DateTime<Local>>,
}

impl Projmark {
    /// Create a new builder for the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Read settings from this TOML file instead of `<root>/.projmark.toml`.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set maximum directory depth (root = 0).
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn max_files(mut self, files: usize) -> Self {
        self.max_files = Some(files);
        self
    }

    pub fn max_lines(mut self, lines: usize) -> Self {
        self.max_lines = Some(lines);
        self
    }

    pub fn max_total_size(mut self, bytes: u64) -> Self {
        self.max_total_size = Some(bytes);
        self
    }

    /// Extra directory names to prune, on top of the configured ones.
    pub fn exclude_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Extra file names to skip, on top of the configured ones.
    pub fn exclude_files<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_files.extend(names.into_iter().map(Into::into));
        self
    }

    /// Honour `.projmarkignore` in the root (default: true).
    pub fn use_ignore_file(mut self, enabled: bool) -> Self {
        self.use_ignore_file = Some(enabled);
        self
    }

    /// Descend into symlinked directories (default: false).
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.follow_symlinks = Some(enabled);
        self
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Where [`Projmark::write`] puts the report.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Fix the report timestamp, making the output reproducible.
    pub fn timestamp(mut self, at: DateTime<Local>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Resolve the effective configuration.
    pub fn config(&self) -> Result<TraversalConfig, ProjmarkError> {
        let mut config = TraversalConfig::new(&self.root);

        let file = match &self.config_file {
            Some(path) => Some(FileConfig::load(path)?),
            None => FileConfig::discover(&self.root)?,
        };
        if let Some(file) = &file {
            config.apply_file(file);
        }

        if self.max_depth.is_some() {
            config.max_depth = self.max_depth;
        }
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(files) = self.max_files {
            config.max_files = files;
        }
        if let Some(lines) = self.max_lines {
            config.max_lines = lines;
        }
        if let Some(total) = self.max_total_size {
            config.max_total_size = total;
        }
        config.rules.add_exclude_dirs(self.exclude_dirs.iter().cloned());
        config.rules.add_exclude_files(self.exclude_files.iter().cloned());
        if let Some(enabled) = self.use_ignore_file {
            config.use_ignore_file = enabled;
        }
        if let Some(enabled) = self.follow_symlinks {
            config.follow_symlinks = enabled;
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if self.output.is_some() {
            config.output = self.output.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Walk the project without writing anything.
    pub fn run(self) -> Result<ProjmarkResult, ProjmarkError> {
        let config = self.config()?;
        run_with(config, self.timestamp)
    }

    /// Walk the project and write the report, to the configured output or
    /// to `ref/project_docs_<name>_<timestamp>.md` under the current
    /// directory.
    ///
    /// The destination is checked before the walk starts.
    pub fn write(self) -> Result<ProjmarkResult, ProjmarkError> {
        let base = std::env::current_dir()?;
        self.write_from(&base)
    }

    /// [`write`](Self::write) with `base` in place of the working directory.
    fn write_from(self, base: &Path) -> Result<ProjmarkResult, ProjmarkError> {
        let mut config = self.config()?;
        check_root(&config.root)?;

        let now = self.timestamp.unwrap_or_else(Local::now);
        let path = resolve_output(&mut config, base, now);
        prepare_output(&path)?;

        let mut result = run_with(config, Some(now))?;
        write_report(&path, &result.render())?;
        tracing::info!(path = %path.display(), "report written");
        result.output = Some(path);
        Ok(result)
    }
}

/// Settle the report destination. A defaulted destination reserves its
/// `ref` directory so reports inside the root are never read back.
fn resolve_output(config: &mut TraversalConfig, base: &Path, now: DateTime<Local>) -> PathBuf {
    if let Some(path) = &config.output {
        return path.clone();
    }
    let absolute = config
        .root
        .canonicalize()
        .unwrap_or_else(|_| config.root.clone());
    let path = default_output_path(&root_name(&absolute), base, now);
    config.reserved.push(base.join(DEFAULT_OUTPUT_DIR));
    config.output = Some(path.clone());
    path
}

fn check_root(root: &Path) -> Result<(), ProjmarkError> {
    if !root.exists() {
        return Err(ProjmarkError::PathNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ProjmarkError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

fn run_with(
    config: TraversalConfig,
    timestamp: Option<DateTime<Local>>,
) -> Result<ProjmarkResult, ProjmarkError> {
    let policy = config.exclusion_policy()?;
    let mut walker = Walker::new(&config, &policy);
    if let Some(at) = timestamp {
        walker = walker.timestamp(at);
    }
    let outcome = walker.run()?;
    Ok(ProjmarkResult {
        config,
        outcome,
        output: None,
    })
}

/// Result of a projmark run.
#[derive(Debug)]
pub struct ProjmarkResult {
    /// Configuration the run used.
    pub config: TraversalConfig,
    pub outcome: WalkOutcome,
    /// Where the report was written, if it was.
    pub output: Option<PathBuf>,
}

impl ProjmarkResult {
    /// Full report text.
    pub fn render(&self) -> String {
        render_report(&self.outcome)
    }

    /// Directory-structure section only.
    pub fn render_tree(&self) -> String {
        render_structure(&self.outcome)
    }

    /// Machine-readable summary.
    pub fn summary_json(&self) -> Result<String, ProjmarkError> {
        Ok(summary_json(&self.outcome, self.output.as_deref())?)
    }

    pub fn tree(&self) -> &DirectoryNode {
        &self.outcome.tree
    }
}

// ============================================================================
// Functional API
// ============================================================================

/// Render the report for a path with default settings.
///
/// # Examples
///
/// ```no_run
/// use projmark::builder::report_from_path;
///
/// let report = report_from_path("./project").unwrap();
/// assert!(report.starts_with("# Project Summary"));
/// ```
pub fn report_from_path(root: impl AsRef<Path>) -> Result<String, ProjmarkError> {
    Ok(Projmark::new(root.as_ref()).run()?.render())
}

/// Build the annotated tree for a path with default settings.
pub fn tree_from_path(root: impl AsRef<Path>) -> Result<DirectoryNode, ProjmarkError> {
    Ok(Projmark::new(root.as_ref()).run()?.outcome.tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SkipReason;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(
            dir.path().join("src/main.rs"),
            r#"
fn main() {
    println!("Hello");
}
"#,
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
        fs::write(dir.path().join("secret.env"), "TOKEN=1\n").unwrap();

        dir
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_projmark_builder() {
        let dir = create_test_project();

        let result = Projmark::new(dir.path())
            .encoding(Encoding::Heuristic)
            .run()
            .unwrap();

        assert_eq!(result.outcome.summary.files_included, 2);
        assert_eq!(
            result.outcome.summary.skipped(SkipReason::SensitiveNamePattern),
            1
        );
        assert!(result.render().contains("File: src/main.rs"));
        assert!(result.output.is_none());
    }

    #[test]
    fn test_setters_override_config_file() {
        let dir = create_test_project();
        fs::write(
            dir.path().join(".projmark.toml"),
            "[limits]\nmax_lines = 9\nmax_files = 1\n",
        )
        .unwrap();

        let config = Projmark::new(dir.path()).max_files(5).config().unwrap();
        assert_eq!(config.max_lines, 9);
        assert_eq!(config.max_files, 5);
    }

    #[test]
    fn test_explicit_config_file() {
        let dir = create_test_project();
        let elsewhere = TempDir::new().unwrap();
        let path = elsewhere.path().join("custom.toml");
        fs::write(&path, "[rules]\nexclude_dirs = [\"src\"]\n").unwrap();

        let result = Projmark::new(dir.path())
            .config_file(&path)
            .encoding(Encoding::Heuristic)
            .run()
            .unwrap();
        assert!(!result.render().contains("main.rs"));
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let dir = create_test_project();
        let err = Projmark::new(dir.path()).max_lines(0).run().unwrap_err();
        assert!(matches!(err, ProjmarkError::Config(_)));
    }

    #[test]
    fn test_exclude_setters_extend_defaults() {
        let dir = create_test_project();
        let result = Projmark::new(dir.path())
            .exclude_dirs(["src"])
            .exclude_files(["README.md"])
            .encoding(Encoding::Heuristic)
            .run()
            .unwrap();

        assert_eq!(result.outcome.summary.files_included, 0);
        assert_eq!(result.outcome.summary.skipped(SkipReason::ExcludedFile), 1);
        assert!(result.config.rules.is_excluded_dir("node_modules"));
    }

    #[test]
    fn test_write_to_explicit_output() {
        let dir = create_test_project();
        let out = TempDir::new().unwrap();
        let path = out.path().join("docs/report.md");

        let result = Projmark::new(dir.path())
            .output(&path)
            .timestamp(fixed_time())
            .encoding(Encoding::Heuristic)
            .write()
            .unwrap();

        assert_eq!(result.output.as_deref(), Some(path.as_path()));
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, result.render());
        assert!(written.contains("- Timestamp: 2024-01-02 03:04:05"));
    }

    #[test]
    fn test_write_missing_root_creates_nothing() {
        let out = TempDir::new().unwrap();
        let path = out.path().join("ref/report.md");

        let err = Projmark::new("/nonexistent/projmark/root")
            .output(&path)
            .write()
            .unwrap_err();

        assert!(matches!(err, ProjmarkError::PathNotFound(_)));
        assert!(!out.path().join("ref").exists());
    }

    #[test]
    fn test_default_output_inside_root_is_not_read_back() {
        let dir = create_test_project();
        let first = Projmark::new(dir.path())
            .timestamp(fixed_time())
            .encoding(Encoding::Heuristic)
            .write_from(dir.path())
            .unwrap();
        let first_path = first.output.clone().unwrap();
        assert!(first_path.starts_with(dir.path().join("ref")));
        assert!(first_path.exists());

        let later = Local.with_ymd_and_hms(2024, 1, 2, 4, 0, 0).unwrap();
        let second = Projmark::new(dir.path())
            .timestamp(later)
            .encoding(Encoding::Heuristic)
            .write_from(dir.path())
            .unwrap();

        assert_ne!(second.output, first.output);
        assert_eq!(
            second.outcome.summary.files_included,
            first.outcome.summary.files_included
        );
        assert_eq!(second.outcome.tree.files().len(), first.outcome.tree.files().len());
        assert!(!second.render().contains("project_docs_"));
    }

    #[test]
    fn test_resolve_output_keeps_explicit_path() {
        let dir = create_test_project();
        let explicit = dir.path().join("notes/report.md");
        let mut config = TraversalConfig::new(dir.path());
        config.output = Some(explicit.clone());

        let path = resolve_output(&mut config, dir.path(), fixed_time());
        assert_eq!(path, explicit);
        assert!(config.reserved.is_empty());
    }

    #[test]
    fn test_functional_api() {
        let dir = create_test_project();

        let report = report_from_path(dir.path()).unwrap();
        assert!(report.starts_with("# Project Summary"));

        let tree = tree_from_path(dir.path()).unwrap();
        assert_eq!(tree.files().len(), 3);
    }
}
