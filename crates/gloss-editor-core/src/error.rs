//! Error types for annotation and analysis operations.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::{Range, TagId};

/// Boxed error returned by external collaborators (tokenizer, dictionary).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while editing or annotating the buffer.
///
/// None of these are fatal: stale references are absorbed by the caller and
/// external failures are reported once per user action.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EditorError {
    /// Range does not resolve in the current buffer.
    #[error("range {range} is out of bounds for buffer of {len} chars")]
    #[diagnostic(code(gloss::range))]
    Range { range: Range, len: usize },

    /// A token anchor already covers part of the range.
    #[error("range {range} overlaps anchor {existing}")]
    #[diagnostic(code(gloss::overlap))]
    Overlap { range: Range, existing: TagId },

    /// Tag id is unknown or has no live range.
    #[error("tag {0} not found")]
    #[diagnostic(code(gloss::not_found))]
    NotFound(TagId),

    /// Direct edits are disabled while analysis runs.
    #[error("buffer is locked while analysis runs")]
    #[diagnostic(code(gloss::locked), help("wait for the analysis pass to finish"))]
    Locked,

    /// Analysis is not reentrant.
    #[error("analysis already running")]
    #[diagnostic(code(gloss::analysis_running))]
    AnalysisRunning,

    /// The external tokenizer failed.
    #[error("tokenizer failed: {0}")]
    #[diagnostic(code(gloss::tokenizer))]
    Tokenizer(String),

    /// The external dictionary failed.
    #[error("dictionary lookup failed: {0}")]
    #[diagnostic(code(gloss::dictionary))]
    Dictionary(String),

    /// The interaction side dropped the queue before answering.
    #[error("UI call queue closed")]
    #[diagnostic(code(gloss::queue_closed))]
    QueueClosed,
}

impl EditorError {
    pub fn tokenizer(e: BoxError) -> Self {
        EditorError::Tokenizer(e.to_string())
    }

    pub fn dictionary(e: BoxError) -> Self {
        EditorError::Dictionary(e.to_string())
    }

    /// True for errors that only mean a referent went stale.
    pub fn is_stale(&self) -> bool {
        matches!(self, EditorError::Range { .. } | EditorError::NotFound(_))
    }
}
