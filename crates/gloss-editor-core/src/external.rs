//! Interfaces to the external analyzer and dictionary.
//!
//! Both are black boxes to the core. The tokenizer runs on the background
//! analysis thread, so it must be `Send + Sync`. The dictionary is only ever
//! queried from the interaction thread.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::BoxError;
use crate::gloss::format_dictionary_gloss;
use crate::types::Token;

/// Splits text into tokens.
///
/// Tokens are returned in ascending `sequence_index` order with char offsets
/// relative to the start of `text`, non-overlapping and covering the input.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, BoxError>;
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Result<Vec<Token>, BoxError> + Send + Sync,
{
    fn tokenize(&self, text: &str) -> Result<Vec<Token>, BoxError> {
        self(text)
    }
}

/// Maps a dictionary form and part of speech to candidate glosses.
pub trait Dictionary {
    /// Candidate glosses in relevance order. May be empty.
    fn lookup(&self, lemma: &str, part_of_speech: &str) -> Result<Vec<String>, BoxError>;
}

/// One entry of a [`MapDictionary`] source file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub lemma: SmolStr,
    /// Parts of speech this sense applies to. Empty means any.
    #[serde(default)]
    pub pos: Vec<SmolStr>,
    pub glosses: Vec<String>,
}

/// In-memory dictionary keyed by lemma.
///
/// Raw glosses are normalised with [`format_dictionary_gloss`] on insertion.
#[derive(Clone, Debug, Default)]
pub struct MapDictionary {
    entries: HashMap<SmolStr, Vec<DictionaryEntry>>,
}

impl MapDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load entries from a JSON array of [`DictionaryEntry`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<DictionaryEntry> = serde_json::from_str(json)?;
        let mut dict = Self::new();
        for entry in entries {
            dict.insert(entry);
        }
        Ok(dict)
    }

    pub fn insert(&mut self, mut entry: DictionaryEntry) {
        entry.glosses = entry
            .glosses
            .iter()
            .filter_map(|g| format_dictionary_gloss(g))
            .collect();
        self.entries
            .entry(entry.lemma.clone())
            .or_default()
            .push(entry);
    }

    /// Convenience for tests and small fixtures.
    pub fn with(mut self, lemma: &str, pos: &[&str], glosses: &[&str]) -> Self {
        self.insert(DictionaryEntry {
            lemma: lemma.into(),
            pos: pos.iter().map(|p| SmolStr::new(p)).collect(),
            glosses: glosses.iter().map(|g| g.to_string()).collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Dictionary for MapDictionary {
    fn lookup(&self, lemma: &str, part_of_speech: &str) -> Result<Vec<String>, BoxError> {
        let Some(entries) = self.entries.get(lemma) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .filter(|e| e.pos.is_empty() || e.pos.iter().any(|p| p == part_of_speech))
            .flat_map(|e| e.glosses.iter().cloned())
            .collect())
    }
}
