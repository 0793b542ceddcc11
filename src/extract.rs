//! Content extraction for files the policy accepted.
//!
//! Every failure here is local to the file: it becomes a [`SkipReason`] on
//! the returned [`FileRecord`] and never aborts the run.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::TraversalConfig;
use crate::filter::{looks_binary, SkipReason};
use crate::tokens::TokenCounter;
use crate::tree::FileRecord;

/// Decoded text of a file, cut to the line limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    /// The first `max_lines` lines, without terminators.
    pub lines: Vec<String>,
    /// Lines in the whole file.
    pub total_lines: usize,
}

impl ExtractedText {
    pub fn is_truncated(&self) -> bool {
        self.total_lines > self.lines.len()
    }
}

/// Count lines the way [`str::lines`] does: a trailing newline does not
/// start an extra empty line.
pub fn count_lines(text: &str) -> usize {
    let newlines = bytecount::count(text.as_bytes(), b'\n');
    if text.is_empty() || text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Decode `bytes` as UTF-8 text and keep a prefix of at most `max_lines`
/// lines. Binary-looking or non-UTF-8 input is rejected with
/// [`SkipReason::BinaryContent`].
pub fn extract_text(bytes: &[u8], max_lines: usize) -> Result<ExtractedText, SkipReason> {
    if looks_binary(bytes) {
        return Err(SkipReason::BinaryContent);
    }
    let text = std::str::from_utf8(bytes).map_err(|_| SkipReason::BinaryContent)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    Ok(ExtractedText {
        lines: text.lines().take(max_lines).map(str::to_owned).collect(),
        total_lines: count_lines(text),
    })
}

/// Read and classify one accepted file.
///
/// `path` is used for I/O, `relative` for the record.
pub fn extract_file(
    path: &Path,
    relative: &Path,
    config: &TraversalConfig,
    counter: &TokenCounter,
) -> FileRecord {
    let name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot stat file");
            return FileRecord::skipped(name, relative, 0, SkipReason::Unreadable);
        }
    };

    if size > config.max_file_size {
        debug!(path = %path.display(), size, limit = config.max_file_size, "file too large");
        return FileRecord::skipped(name, relative, size, SkipReason::TooLarge);
    }

    let bytes = match read_bounded(path, config.max_file_size) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read file");
            return FileRecord::skipped(name, relative, size, SkipReason::Unreadable);
        }
    };

    // the file grew between stat and read
    if bytes.len() as u64 > config.max_file_size {
        debug!(path = %path.display(), "file grew past size limit while reading");
        return FileRecord::skipped(name, relative, bytes.len() as u64, SkipReason::TooLarge);
    }

    match extract_text(&bytes, config.max_lines) {
        Ok(text) => {
            let tokens = counter.count_lines(&text.lines);
            if text.is_truncated() {
                debug!(
                    path = %path.display(),
                    kept = text.lines.len(),
                    total = text.total_lines,
                    "truncated"
                );
            }
            FileRecord::included(
                name,
                relative,
                bytes.len() as u64,
                text.lines,
                text.total_lines,
                tokens,
            )
        }
        Err(reason) => {
            debug!(path = %path.display(), %reason, "content rejected");
            FileRecord::skipped(name, relative, size, reason)
        }
    }
}

/// Read at most `limit + 1` bytes so a growing file cannot exhaust memory.
fn read_bounded(path: &Path, limit: u64) -> std::io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    Ok(bytes)
}
