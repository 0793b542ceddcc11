//! Report assembly.
//!
//! Turns a [`WalkOutcome`] into the consolidated document, in four fixed
//! sections: run summary, directory structure, file contents, skipped files.
//! The tree and the file contents are both emitted in the walk's depth-first
//! order so they can be cross-referenced positionally.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;

use crate::filter::SkipReason;
use crate::tree::{format_number, format_size, render_tree, RenderOptions};
use crate::walker::{RunSummary, SkippedEntry, WalkOutcome};

/// Errors that can occur while producing the report file.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output path is a directory: {path}")]
    IsDirectory { path: PathBuf },

    #[error("cannot write to {path}: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Directory, relative to the invocation location, that default report
/// paths are placed in.
pub const DEFAULT_OUTPUT_DIR: &str = "ref";

const SEPARATOR_WIDTH: usize = 80;

// ============================================================================
// Text report
// ============================================================================

/// Render the complete report.
pub fn render_report(outcome: &WalkOutcome) -> String {
    let mut output = String::with_capacity(16 * 1024);

    push_summary(&mut output, &outcome.summary);
    output.push('\n');
    push_tree(&mut output, outcome);
    output.push('\n');
    push_contents(&mut output, outcome);
    output.push('\n');
    push_ledger(&mut output, &outcome.skipped);

    output
}

/// Render only the directory-structure section body.
pub fn render_structure(outcome: &WalkOutcome) -> String {
    render_tree(&outcome.tree, &RenderOptions::with_metadata())
}

fn push_summary(output: &mut String, summary: &RunSummary) {
    output.push_str("# Project Summary\n\n");
    output.push_str(&format!("- Root directory: {}\n", summary.root.display()));
    output.push_str(&format!(
        "- Files included: {}\n",
        format_number(summary.files_included)
    ));
    output.push_str(&format!(
        "- Files skipped: {}\n",
        format_number(summary.total_skipped())
    ));
    for (reason, count) in &summary.files_skipped {
        output.push_str(&format!("  - {}: {}\n", reason, format_number(*count)));
    }
    output.push_str(&format!(
        "- Truncated files: {}\n",
        format_number(summary.files_truncated)
    ));
    output.push_str(&format!(
        "- Bytes read: {} ({})\n",
        format_number(summary.bytes_read as usize),
        format_size(summary.bytes_read)
    ));
    output.push_str(&format!(
        "- Estimated tokens: {}\n",
        format_number(summary.estimated_tokens)
    ));
    if summary.dirs_not_expanded > 0 {
        output.push_str(&format!(
            "- Directories not expanded: {}\n",
            summary.dirs_not_expanded
        ));
    }
    if summary.dirs_unreadable > 0 {
        output.push_str(&format!(
            "- Unreadable directories: {}\n",
            summary.dirs_unreadable
        ));
    }
    output.push_str(&format!(
        "- Timestamp: {}\n",
        summary.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
}

fn push_tree(output: &mut String, outcome: &WalkOutcome) {
    output.push_str("## Directory Structure\n\n```text\n");
    output.push_str(&render_structure(outcome));
    output.push_str("```\n");
}

fn push_contents(output: &mut String, outcome: &WalkOutcome) {
    output.push_str("## File Contents\n");

    let separator = "=".repeat(SEPARATOR_WIDTH);
    let mut any = false;

    for record in outcome.tree.files() {
        let Some(lines) = record.lines() else {
            continue;
        };
        any = true;

        output.push('\n');
        output.push_str(&separator);
        output.push_str(&format!("\nFile: {}\n", record.display_path()));
        output.push_str(&separator);
        output.push('\n');
        for line in lines {
            output.push_str(line);
            output.push('\n');
        }
        if record.truncated {
            output.push_str(&format!(
                "\n... [Content truncated: showing first {} of {} lines] ...\n",
                record.line_count,
                record.total_lines.unwrap_or(record.line_count)
            ));
        }
    }

    if !any {
        output.push_str("\n_No files included._\n");
    }
}

fn push_ledger(output: &mut String, skipped: &[SkippedEntry]) {
    output.push_str("## Skipped Files\n");

    if skipped.is_empty() {
        output.push_str("\n_No files skipped._\n");
        return;
    }

    let mut groups: BTreeMap<SkipReason, Vec<&SkippedEntry>> = BTreeMap::new();
    for entry in skipped {
        groups.entry(entry.reason).or_default().push(entry);
    }

    for (reason, entries) in groups {
        output.push_str(&format!(
            "\n### {} ({}): {}\n\n",
            reason,
            entries.len(),
            reason.description()
        ));
        for entry in entries {
            if entry.is_dir {
                output.push_str(&format!("- {}/\n", entry.path));
            } else {
                output.push_str(&format!("- {}\n", entry.path));
            }
        }
    }
}

// ============================================================================
// JSON summary
// ============================================================================

#[derive(Serialize)]
struct JsonSummary<'a> {
    root: String,
    files_included: usize,
    files_skipped: usize,
    skipped_by_reason: &'a BTreeMap<SkipReason, usize>,
    files_truncated: usize,
    bytes_read: u64,
    estimated_tokens: usize,
    dirs_not_expanded: usize,
    dirs_unreadable: usize,
    timestamp: String,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    skipped: &'a [SkippedEntry],
}

/// Machine-readable run summary, including the ledger.
pub fn summary_json(outcome: &WalkOutcome, output: Option<&Path>) -> Result<String, OutputError> {
    let summary = &outcome.summary;
    let payload = JsonSummary {
        root: summary.root.display().to_string(),
        files_included: summary.files_included,
        files_skipped: summary.total_skipped(),
        skipped_by_reason: &summary.files_skipped,
        files_truncated: summary.files_truncated,
        bytes_read: summary.bytes_read,
        estimated_tokens: summary.estimated_tokens,
        dirs_not_expanded: summary.dirs_not_expanded,
        dirs_unreadable: summary.dirs_unreadable,
        timestamp: summary.timestamp.to_rfc3339(),
        elapsed_ms: summary.elapsed.as_millis() as u64,
        output: output.map(|p| p.display().to_string()),
        skipped: &outcome.skipped,
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

// ============================================================================
// Report file
// ============================================================================

/// `<base>/ref/project_docs_<root name>_<timestamp>.md`
pub fn default_output_path(root_name: &str, base: &Path, now: DateTime<Local>) -> PathBuf {
    base.join(DEFAULT_OUTPUT_DIR).join(format!(
        "project_docs_{}_{}.md",
        root_name,
        now.format("%Y%m%d_%H%M%S")
    ))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Check that `path` can be written, creating its parent directory.
/// Called before the walk so an unwritable destination fails fast.
pub fn prepare_output(path: &Path) -> Result<(), OutputError> {
    if path.is_dir() {
        return Err(OutputError::IsDirectory {
            path: path.to_path_buf(),
        });
    }
    let parent = parent_dir(path);
    let not_writable = |source| OutputError::NotWritable {
        path: path.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(parent).map_err(not_writable)?;
    tempfile::NamedTempFile::new_in(parent).map_err(not_writable)?;
    Ok(())
}

/// Write the report atomically: the destination either receives the whole
/// document or is left untouched.
pub fn write_report(path: &Path, contents: &str) -> Result<(), OutputError> {
    let not_writable = |source| OutputError::NotWritable {
        path: path.to_path_buf(),
        source,
    };
    let parent = parent_dir(path);
    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(not_writable)?;
    file.write_all(contents.as_bytes()).map_err(not_writable)?;
    file.flush().map_err(not_writable)?;
    file.persist(path).map_err(|e| not_writable(e.error))?;
    Ok(())
}
