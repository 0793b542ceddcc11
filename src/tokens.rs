//! Token estimates for the included content.
//!
//! The report is meant to be pasted into a model's context window, so the
//! run summary carries a token estimate. Counting uses tiktoken-rs
//! encodings; if an encoding cannot be loaded, a ~4 bytes/token heuristic is
//! used instead.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Token encoding to estimate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    #[default]
    Cl100kBase,
    /// o200k_base: GPT-4o
    O200kBase,
    /// Skip tokenization and use the byte heuristic only.
    Heuristic,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
            Encoding::Heuristic => write!(f, "heuristic"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            "heuristic" | "none" => Ok(Encoding::Heuristic),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn load_bpe(encoding: Encoding) -> Option<&'static CoreBPE> {
    match encoding {
        Encoding::Cl100kBase => CL100K.get_or_init(|| tiktoken_rs::cl100k_base().ok()).as_ref(),
        Encoding::O200kBase => O200K.get_or_init(|| tiktoken_rs::o200k_base().ok()).as_ref(),
        Encoding::Heuristic => None,
    }
}

/// Rough estimate: one token per four bytes, rounded up.
fn heuristic_count(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Counts tokens with one encoding, resolved once at construction.
#[derive(Clone)]
pub struct TokenCounter {
    encoding: Encoding,
    bpe: Option<&'static CoreBPE>,
}

impl TokenCounter {
    pub fn new(encoding: Encoding) -> Self {
        let bpe = load_bpe(encoding);
        if bpe.is_none() && encoding != Encoding::Heuristic {
            tracing::warn!(%encoding, "tokenizer unavailable, using byte heuristic");
        }
        Self { encoding, bpe }
    }

    /// Estimate tokens in `text`.
    pub fn count(&self, text: &str) -> usize {
        match self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => heuristic_count(text),
        }
    }

    /// Estimate tokens of a file's kept lines as they appear in the report.
    pub fn count_lines(&self, lines: &[String]) -> usize {
        if lines.is_empty() {
            return 0;
        }
        self.count(&lines.join("\n"))
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoding", &self.encoding)
            .field("loaded", &self.bpe.is_some())
            .finish()
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new(Encoding::default())
    }
}
