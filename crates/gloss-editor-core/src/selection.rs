//! The single active annotation and its substitution candidates.

use std::fmt;

use smol_str::SmolStr;

use crate::error::EditorError;
use crate::external::Dictionary;
use crate::filter::Settings;
use crate::store::AnnotationStore;
use crate::text::TextBuffer;
use crate::types::{Range, TagId};

/// Candidate replacements for the activated anchor.
///
/// Ordered as the original text, then the phonetic hint if any, then the
/// dictionary glosses in relevance order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidates {
    pub tag: TagId,
    pub original: SmolStr,
    pub hint: Option<SmolStr>,
    pub glosses: Vec<String>,
}

impl Candidates {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str())
            .chain(self.hint.as_deref())
            .chain(self.glosses.iter().map(String::as_str))
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.iter().nth(index)
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.hint.is_some()) + self.glosses.len()
    }

    /// Always false: the original text is a candidate.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Label for the host's candidate picker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidatePrompt {
    NoWordSelected,
    NoTranslation,
    SelectTranslation,
}

impl fmt::Display for CandidatePrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoWordSelected => "No word selected",
            Self::NoTranslation => "No translation",
            Self::SelectTranslation => "Select translation",
        })
    }
}

/// Tracks the activated anchor's candidates.
///
/// The `Selected` tag itself lives in the [`AnnotationStore`]; this only
/// caches what was offered for it.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    candidates: Option<Candidates>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select anchor `tag` and compute its candidates.
    ///
    /// Dictionary glosses are only looked up for tokens passing the
    /// translatable filter. On any error the previous selection is kept.
    pub fn activate<B: TextBuffer>(
        &mut self,
        store: &mut AnnotationStore<B>,
        tag: TagId,
        settings: &Settings,
        dictionary: &dyn Dictionary,
    ) -> Result<&Candidates, EditorError> {
        let token = store
            .anchor(tag)
            .map(|anchor| anchor.token.clone())
            .ok_or(EditorError::NotFound(tag))?;
        if store.anchor_range(tag).is_none() {
            return Err(EditorError::NotFound(tag));
        }

        let glosses = if settings.translatable.matches(&token) {
            dictionary
                .lookup(&token.lemma, &token.part_of_speech)
                .map_err(|e| {
                    let err = EditorError::dictionary(e);
                    tracing::error!(lemma = %token.lemma, error = %err, "dictionary lookup failed");
                    err
                })?
        } else {
            Vec::new()
        };

        let range = store.select(tag)?;
        tracing::debug!(tag = %tag, %range, glosses = glosses.len(), "activated anchor");

        let hint = token
            .reading
            .clone()
            .filter(|reading| !reading.is_empty() && *reading != token.text);
        Ok(self.candidates.insert(Candidates {
            tag,
            original: token.text,
            hint,
            glosses,
        }))
    }

    /// The selected anchor and its live range.
    ///
    /// `None` when nothing is selected or the selected text was deleted.
    pub fn current_selection<B: TextBuffer>(
        &self,
        store: &AnnotationStore<B>,
    ) -> Option<(TagId, Range)> {
        store.current_selection()
    }

    pub fn candidates(&self) -> Option<&Candidates> {
        self.candidates.as_ref()
    }

    pub fn reset(&mut self) {
        self.candidates = None;
    }

    pub fn prompt(&self) -> CandidatePrompt {
        match &self.candidates {
            None => CandidatePrompt::NoWordSelected,
            Some(c) if c.glosses.is_empty() => CandidatePrompt::NoTranslation,
            Some(_) => CandidatePrompt::SelectTranslation,
        }
    }
}
