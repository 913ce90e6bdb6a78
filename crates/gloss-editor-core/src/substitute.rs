//! Tag-preserving substitution of the selected anchor's text.

use crate::error::EditorError;
use crate::filter::TokenFilter;
use crate::store::{Anchor, AnnotationStore};
use crate::text::TextBuffer;
use crate::types::{Range, TagId};

pub const WORD_SEPARATOR: char = ' ';
pub const COMPOUND_SEPARATOR: char = '-';

/// Separator to append after `replacement` when it lands before `following`.
///
/// `following` is the character currently after the replaced range.
pub fn separator_for(
    anchor: &Anchor,
    replacement: &str,
    following: Option<char>,
    word_start: &TokenFilter,
) -> Option<char> {
    if replacement == anchor.token.text {
        return None;
    }
    let next = anchor.next.as_ref()?;
    if next.is_punctuation() {
        return None;
    }
    match following {
        Some(c) if !c.is_whitespace() && c != COMPOUND_SEPARATOR => {}
        _ => return None,
    }
    Some(if word_start.matches(next) {
        WORD_SEPARATOR
    } else {
        COMPOUND_SEPARATOR
    })
}

/// Rewrites the selected anchor's text.
#[derive(Clone, Debug)]
pub struct SubstitutionEngine {
    word_start: TokenFilter,
}

impl SubstitutionEngine {
    pub fn new(word_start: TokenFilter) -> Self {
        Self { word_start }
    }

    pub fn word_start(&self) -> &TokenFilter {
        &self.word_start
    }

    /// Replace the text of anchor `tag` with `replacement`.
    ///
    /// Only acts on the currently selected anchor; anything else, including a
    /// stale selection, is a no-op returning `Ok(None)`. On success the anchor
    /// and selection span the inserted text, separator included.
    pub fn apply<B: TextBuffer>(
        &self,
        store: &mut AnnotationStore<B>,
        tag: TagId,
        replacement: &str,
    ) -> Result<Option<Range>, EditorError> {
        let Some((selected, old_range)) = store.current_selection() else {
            tracing::warn!(tag = %tag, "no live selection, ignoring substitution");
            return Ok(None);
        };
        if selected != tag {
            tracing::warn!(tag = %tag, selected = %selected, "tag is not the selected anchor");
            return Ok(None);
        }
        let Some(anchor) = store.anchor(tag) else {
            return Ok(None);
        };

        let following = store.buffer().char_at(old_range.end);
        let mut text = replacement.to_owned();
        if let Some(sep) = separator_for(anchor, replacement, following, &self.word_start) {
            text.push(sep);
        }

        let new_range = store.replace(old_range, &text)?;
        tracing::debug!(tag = %tag, %old_range, %new_range, text = %text, "substituted anchor text");
        Ok(Some(new_range))
    }
}
