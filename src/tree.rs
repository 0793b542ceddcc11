//! Directory tree representation and rendering.
//!
//! The walker builds a [`DirectoryNode`] tree whose leaves are
//! [`FileRecord`]s. The tree is rendered with box-drawing characters, and
//! its depth-first order is the order of the file-contents section.

use std::cmp::Ordering;
use std::path::{Component, Path, PathBuf};

use crate::filter::SkipReason;

/// One processed file, included or skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// File name (not full path).
    pub name: String,
    /// Path relative to the traversal root.
    pub relative_path: PathBuf,
    /// Size in bytes from metadata (0 when metadata was unavailable).
    pub size: u64,
    /// Number of lines kept in `content`.
    pub line_count: usize,
    /// Line count of the whole file, when it was decoded.
    pub total_lines: Option<usize>,
    /// Whether `content` holds only a prefix of the file.
    pub truncated: bool,
    /// Estimated tokens of the kept content.
    pub tokens: usize,
    /// Kept lines, absent for skipped files.
    pub content: Option<Vec<String>>,
    /// Why the file was skipped.
    pub skip: Option<SkipReason>,
}

impl FileRecord {
    /// Record for a file whose content made it into the report.
    pub fn included(
        name: impl Into<String>,
        relative_path: impl Into<PathBuf>,
        size: u64,
        lines: Vec<String>,
        total_lines: usize,
        tokens: usize,
    ) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
            size,
            line_count: lines.len(),
            total_lines: Some(total_lines),
            truncated: total_lines > lines.len(),
            tokens,
            content: Some(lines),
            skip: None,
        }
    }

    /// Record for a file left out of the report.
    pub fn skipped(
        name: impl Into<String>,
        relative_path: impl Into<PathBuf>,
        size: u64,
        reason: SkipReason,
    ) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
            size,
            line_count: 0,
            total_lines: None,
            truncated: false,
            tokens: 0,
            content: None,
            skip: Some(reason),
        }
    }

    pub fn is_included(&self) -> bool {
        self.skip.is_none()
    }

    /// Kept lines, if the file was included.
    pub fn lines(&self) -> Option<&[String]> {
        self.content.as_deref()
    }

    /// Relative path with `/` separators.
    pub fn display_path(&self) -> String {
        to_slash(&self.relative_path)
    }
}

/// Whether a directory's children were listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    Expanded,
    /// Deeper than the depth limit; children not listed.
    DepthLimited,
    /// Listing the directory failed.
    Unreadable,
}

/// A child of a directory node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEntry {
    Directory(DirectoryNode),
    File(FileRecord),
}

/// A directory in the logical tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    /// Directory name (the root uses the project directory name).
    pub name: String,
    /// Path relative to the traversal root (empty for the root).
    pub relative_path: PathBuf,
    /// Root is depth 0.
    pub depth: usize,
    pub state: DirState,
    children: Vec<TreeEntry>,
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>, relative_path: impl Into<PathBuf>, depth: usize) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
            depth,
            state: DirState::Expanded,
            children: Vec::new(),
        }
    }

    /// Leaf marker for a directory whose children were not listed.
    pub fn unexpanded(
        name: impl Into<String>,
        relative_path: impl Into<PathBuf>,
        depth: usize,
        state: DirState,
    ) -> Self {
        Self {
            state,
            ..Self::new(name, relative_path, depth)
        }
    }

    pub fn add_directory(&mut self, node: DirectoryNode) {
        self.children.push(TreeEntry::Directory(node));
    }

    pub fn add_file(&mut self, record: FileRecord) {
        self.children.push(TreeEntry::File(record));
    }

    pub fn children(&self) -> &[TreeEntry] {
        &self.children
    }

    /// Relative path with `/` separators.
    pub fn display_path(&self) -> String {
        to_slash(&self.relative_path)
    }

    /// All file records in depth-first, directories-first order.
    pub fn files(&self) -> Vec<&FileRecord> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a FileRecord>) {
        for child in &self.children {
            match child {
                TreeEntry::Directory(node) => node.collect_files(out),
                TreeEntry::File(record) => out.push(record),
            }
        }
    }

    /// Count candidate files in this tree.
    pub fn file_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                TreeEntry::Directory(node) => node.file_count(),
                TreeEntry::File(_) => 1,
            })
            .sum()
    }

    /// Count directories below this one.
    pub fn directory_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| match c {
                TreeEntry::Directory(node) => 1 + node.directory_count(),
                TreeEntry::File(_) => 0,
            })
            .sum()
    }
}

/// Ordering used within each partition of a directory listing:
/// case-insensitive, exact name as tie-break.
pub fn name_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Render a relative path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Options for rendering the tree.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Show line counts of included files.
    pub show_lines: bool,
    /// Show file sizes.
    pub show_size: bool,
    /// Mark skipped files with their reason.
    pub show_skipped: bool,
}

impl RenderOptions {
    /// Create options with all metadata enabled.
    pub fn with_metadata() -> Self {
        Self {
            show_lines: true,
            show_size: true,
            show_skipped: true,
        }
    }

    /// Create minimal options (names and directory markers only).
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Box-drawing characters for tree rendering.
const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const VERTICAL: &str = "│   ";
const SPACE: &str = "    ";

/// Render a directory tree to a string with box-drawing characters.
///
/// # Examples
///
/// ```
/// use projmark::tree::{DirectoryNode, FileRecord, RenderOptions, render_tree};
///
/// let mut root = DirectoryNode::new("project", "", 0);
/// let lines = vec!["fn main() {}".to_string()];
/// root.add_file(FileRecord::included("main.rs", "main.rs", 12, lines, 1, 4));
///
/// let output = render_tree(&root, &RenderOptions::minimal());
/// assert_eq!(output, "project/\n└── main.rs\n");
/// ```
pub fn render_tree(root: &DirectoryNode, options: &RenderOptions) -> String {
    let mut output = String::with_capacity(4096);
    push_directory_line(&mut output, root);
    render_children(&mut output, root, "", options);
    output
}

fn render_children(
    output: &mut String,
    dir: &DirectoryNode,
    prefix: &str,
    options: &RenderOptions,
) {
    let child_count = dir.children.len();
    for (i, child) in dir.children.iter().enumerate() {
        let is_last = i + 1 == child_count;

        output.push_str(prefix);
        output.push_str(if is_last { LAST_BRANCH } else { BRANCH });

        match child {
            TreeEntry::Directory(node) => {
                push_directory_line(output, node);
                let continuation = if is_last { SPACE } else { VERTICAL };
                let new_prefix = format!("{}{}", prefix, continuation);
                render_children(output, node, &new_prefix, options);
            }
            TreeEntry::File(record) => push_file_line(output, record, options),
        }
    }
}

fn push_directory_line(output: &mut String, node: &DirectoryNode) {
    output.push_str(&node.name);
    output.push('/');
    match node.state {
        DirState::Expanded => {}
        DirState::DepthLimited => output.push_str(" [not expanded]"),
        DirState::Unreadable => output.push_str(" [unreadable]"),
    }
    output.push('\n');
}

fn push_file_line(output: &mut String, record: &FileRecord, options: &RenderOptions) {
    output.push_str(&record.name);

    let mut metadata = Vec::new();
    match record.skip {
        None => {
            if options.show_lines {
                match record.total_lines {
                    Some(total) if record.truncated => {
                        metadata.push(format!("{}/{} lines, truncated", record.line_count, total));
                    }
                    _ => metadata.push(format!("{} lines", record.line_count)),
                }
            }
            if options.show_size {
                metadata.push(format_size(record.size));
            }
        }
        Some(reason) => {
            if options.show_skipped {
                metadata.push(format!("skipped: {}", reason));
            }
        }
    }

    if !metadata.is_empty() {
        output.push_str(" [");
        output.push_str(&metadata.join(", "));
        output.push(']');
    }
    output.push('\n');
}

/// Format file size for display.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{}B", bytes)
    } else if bytes < MB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    }
}

/// Format number with thousands separators.
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
