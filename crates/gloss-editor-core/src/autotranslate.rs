//! Whole-text translation using the first dictionary gloss of every
//! translatable token.

use crate::error::EditorError;
use crate::external::Dictionary;
use crate::filter::{Settings, TokenFilter};
use crate::types::Token;

/// A token with the whitespace that followed it in the source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpacedToken<'a> {
    pub token: &'a Token,
    pub trailing: &'a str,
}

impl SpacedToken<'_> {
    pub fn text_with_whitespace(&self) -> String {
        format!("{}{}", self.token.text, self.trailing)
    }
}

/// Pair every token with its trailing whitespace in `text`.
///
/// Token offsets are in chars. Offsets past the end of `text` get no
/// trailing whitespace.
pub fn attach_whitespace<'a>(text: &'a str, tokens: &'a [Token]) -> Vec<SpacedToken<'a>> {
    let byte_offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
    let byte_at = |char_offset: usize| {
        byte_offsets
            .get(char_offset)
            .copied()
            .unwrap_or(text.len())
    };
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let end = byte_at(token.start_offset + token.length);
            let limit = tokens
                .get(i + 1)
                .map_or(text.len(), |next| byte_at(next.start_offset))
                .max(end);
            let gap = &text[end..limit];
            let ws_len = gap
                .char_indices()
                .find(|(_, c)| !c.is_whitespace())
                .map_or(gap.len(), |(b, _)| b);
            SpacedToken {
                token,
                trailing: &gap[..ws_len],
            }
        })
        .collect()
}

/// Group tokens into words. A word begins at every token passing
/// `word_start`; the last word is always present, even when empty.
pub fn split_into_words<'a, T>(tokens: &'a [T], word_start: impl Fn(&T) -> bool) -> Vec<&'a [T]> {
    let mut words = Vec::new();
    let mut begin = 0;
    for (i, token) in tokens.iter().enumerate() {
        if word_start(token) && i > begin {
            words.push(&tokens[begin..i]);
            begin = i;
        }
    }
    words.push(&tokens[begin..]);
    words
}

/// Translate one word, gluing consecutive glosses with hyphens.
pub fn translate_word(
    word: &[SpacedToken<'_>],
    translatable: &TokenFilter,
    dictionary: &dyn Dictionary,
) -> Result<String, EditorError> {
    let mut out = String::new();
    let mut hyphen = false;
    for spaced in word {
        let token = spaced.token;
        if hyphen {
            out.push('-');
        }
        if !translatable.matches(token) {
            out.push_str(&spaced.text_with_whitespace());
            hyphen = false;
            tracing::debug!(token = %token.text, pos = %token.part_of_speech, "kept as is");
            continue;
        }

        let glosses = dictionary
            .lookup(&token.lemma, &token.part_of_speech)
            .map_err(EditorError::dictionary)?;
        match glosses.into_iter().next() {
            Some(gloss) => {
                tracing::debug!(token = %token.text, %gloss, "translated");
                out.push_str(&gloss);
                hyphen = true;
            }
            None => {
                tracing::warn!(
                    token = %token.text,
                    pos = %token.part_of_speech,
                    lemma = %token.lemma,
                    "no definitions found, token kept as is"
                );
                out.push_str(&spaced.text_with_whitespace());
                hyphen = false;
            }
        }
    }
    Ok(out)
}

/// Translate `text` given its tokens, words joined by a single space.
pub fn translate_text(
    text: &str,
    tokens: &[Token],
    settings: &Settings,
    dictionary: &dyn Dictionary,
) -> Result<String, EditorError> {
    let mut tokens = tokens.to_vec();
    tokens.sort_by_key(|t| t.sequence_index);
    let spaced = attach_whitespace(text, &tokens);
    let words = split_into_words(&spaced, |s| settings.word_start.matches(s.token));
    let translated = words
        .into_iter()
        .map(|word| translate_word(word, &settings.translatable, dictionary))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(translated.join(" "))
}
