//! Token classification predicates and their configuration.
//!
//! Both the translatable predicate and the word-start predicate are plain
//! [`TokenFilter`] values evaluated by a pure function.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::types::Token;

/// Unicode blocks counted as Japanese script (kana, CJK ideographs,
/// CJK punctuation and full-width forms).
const JAPANESE_RANGES: &[(u32, u32)] = &[
    (0x3000, 0x303F),
    (0x3040, 0x309F),
    (0x30A0, 0x30FF),
    (0x3130, 0x318F),
    (0x3190, 0x319F),
    (0x31A0, 0x31BF),
    (0x31C0, 0x31EF),
    (0x31F0, 0x31FF),
    (0x3200, 0x32FF),
    (0x3300, 0x33FF),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xF900, 0xFAFF),
    (0xFE30, 0xFE4F),
    (0xFF00, 0xFFEF),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2B73F),
    (0x2B740, 0x2B81F),
    (0x2B820, 0x2CEAF),
];

/// True if every character of `text` is Japanese script.
pub fn is_japanese_text(text: &str) -> bool {
    text.chars().all(|c| {
        let c = c as u32;
        JAPANESE_RANGES
            .iter()
            .any(|&(start, end)| start <= c && c <= end)
    })
}

/// Include/exclude rules over a token's part of speech, lemma and script.
///
/// A token matches when its part of speech is listed in `include_pos`, its
/// lemma is not listed in `exclude_lemmas`, and, if `exclude_foreign` is set,
/// its text is entirely Japanese script.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenFilter {
    pub include_pos: BTreeSet<SmolStr>,
    pub exclude_lemmas: BTreeSet<SmolStr>,
    pub exclude_foreign: bool,
}

impl TokenFilter {
    pub fn including<I, S>(parts_of_speech: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            include_pos: parts_of_speech.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn excluding_lemmas<I, S>(mut self, lemmas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.exclude_lemmas.extend(lemmas.into_iter().map(Into::into));
        self
    }

    pub fn excluding_foreign(mut self, exclude: bool) -> Self {
        self.exclude_foreign = exclude;
        self
    }

    pub fn matches(&self, token: &Token) -> bool {
        self.include_pos.contains(&token.part_of_speech)
            && !self.exclude_lemmas.contains(&token.lemma)
            && (!self.exclude_foreign || is_japanese_text(&token.text))
    }
}

/// Classification settings shared by analysis, selection and substitution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tokens eligible for anchoring and dictionary substitution.
    pub translatable: TokenFilter,
    /// Tokens that begin a new word when gluing glosses together.
    pub word_start: TokenFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            translatable: TokenFilter::including(["NOUN", "VERB", "ADJ"]).excluding_foreign(true),
            word_start: TokenFilter::including(["VERB", "NOUN"]),
        }
    }
}
