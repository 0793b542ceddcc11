//! Projmark - Consolidate a project tree into one document for LLMs.
//!
//! Projmark walks a directory tree, decides for every entry whether to
//! descend, include, truncate or skip it, and produces a single bounded
//! report: a run summary, a directory map, the contents of the selected text
//! files, and a ledger of everything that was left out and why.
//!
//! # Quick Start
//!
//! ```no_run
//! use projmark::builder::Projmark;
//!
//! let result = Projmark::new("./my-project")
//!     .max_depth(4)
//!     .max_lines(200)
//!     .run()
//!     .unwrap();
//!
//! println!("Included {} files", result.outcome.summary.files_included);
//! println!("Estimated tokens: {}", result.outcome.summary.estimated_tokens);
//! ```
//!
//! # Modules
//!
//! - [`filter`] - Exclusion rules, skip reasons, binary detection
//! - [`walker`] - Deterministic traversal with depth and size budgets
//! - [`extract`] - Bounded reads, UTF-8 decoding, line truncation
//! - [`tree`] - Annotated tree types and rendering
//! - [`output`] - Report assembly and atomic writing
//! - [`config`] - Limits and TOML config files
//! - [`tokens`] - Token estimates for LLM context budgets
//! - [`builder`] - Fluent API over the engine
//! - [`logging`] - `tracing` subscriber setup for the binary

pub mod tokens;
pub mod filter;
pub mod errors;
pub mod tree;
pub mod config;
pub mod extract;
pub mod walker;
pub mod output;
pub mod builder;
pub mod logging;

// Re-export key types at crate root for convenience
pub use builder::{Projmark, ProjmarkResult};
pub use config::{ConfigError, TraversalConfig};
pub use errors::ProjmarkError;
pub use filter::{ExclusionPolicy, ExclusionRules, FilterError, SkipReason};
pub use output::OutputError;
pub use tree::{DirectoryNode, FileRecord, RenderOptions, TreeEntry};
pub use tokens::{Encoding, TokenCounter};
pub use walker::{RunSummary, SkippedEntry, WalkError, WalkOutcome};
