//! gloss-editor-core: annotation tracking for selectively translated text.
//!
//! This crate provides:
//! - `TextBuffer` trait for text storage, with the ropey-backed `EditorRope`
//! - `TaggedBuffer` - tag ranges that follow edits, plus tag-aware replace
//! - `AnnotationStore` - token anchors and the single selection
//! - `SelectionController` / `SubstitutionEngine` - click, pick, substitute
//! - `AnalysisCoordinator` - background tokenization reconciled through the
//!   `UiTaskQueue`
//! - `Editor` - the interaction-thread facade a host UI drives

pub mod analysis;
pub mod autotranslate;
pub mod buffer;
pub mod editor;
pub mod error;
pub mod external;
pub mod filter;
pub mod gloss;
pub mod marks;
pub mod queue;
pub mod selection;
pub mod store;
pub mod substitute;
pub mod text;
pub mod types;

pub use analysis::{
    AnalysisCoordinator, AnalysisHost, AnalysisOutcome, AnalysisState, describe_outcome,
    reconcile_tokens,
};
pub use autotranslate::{split_into_words, translate_text, translate_word};
pub use buffer::{ReplaceInfo, TaggedBuffer};
pub use editor::Editor;
pub use error::{BoxError, EditorError};
pub use external::{Dictionary, DictionaryEntry, MapDictionary, Tokenizer};
pub use filter::{Settings, TokenFilter, is_japanese_text};
pub use gloss::{format_dictionary_gloss, format_english};
pub use marks::TagTable;
pub use queue::{UiFuture, UiHandle, UiTaskQueue};
pub use selection::{CandidatePrompt, Candidates, SelectionController};
pub use smol_str::SmolStr;
pub use store::{Anchor, AnnotationStore};
pub use substitute::SubstitutionEngine;
pub use text::{EditorRope, TextBuffer};
pub use types::{PUNCTUATION_POS, Position, Range, Tag, TagId, TagKind, Token};
