//! Core annotation types: positions, ranges, tags and analysed tokens.
//!
//! These types are independent of any text storage. Positions are measured in
//! Unicode scalar values (chars), never bytes.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

/// A location in the buffer, measured in characters from the start.
///
/// Positions stored inside a [`crate::TagTable`] are live: every edit shifts
/// them. A `Position` handed out to callers is a snapshot that stays valid
/// until the next edit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    /// Start of the buffer.
    pub const ZERO: Position = Position(0);

    pub fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// Character offset from the start of the buffer.
    pub fn offset(self) -> usize {
        self.0
    }

    /// Position `n` characters after this one.
    pub fn forward(self, n: usize) -> Self {
        Self(self.0 + n)
    }

    /// Position `n` characters before this one, clamped at the buffer start.
    pub fn backward(self, n: usize) -> Self {
        Self(self.0.saturating_sub(n))
    }
}

impl From<usize> for Position {
    fn from(offset: usize) -> Self {
        Self(offset)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open range `[start, end)` of buffer positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a range. Endpoints are swapped if given out of order, so
    /// `start <= end` always holds.
    pub fn new(start: Position, end: Position) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Range covering `len` characters from `start`.
    pub fn from_offsets(start: usize, len: usize) -> Self {
        let start = Position::new(start);
        Self::new(start, start.forward(len))
    }

    pub fn caret(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end.offset() - self.start.offset()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True iff `start <= pos < end`.
    pub fn contains(&self, pos: Position) -> bool {
        self.start <= pos && pos < self.end
    }

    /// True iff `inner` lies inside this range.
    ///
    /// The start of `inner` must be within this range and its end within this
    /// range extended by one character, so a range ending exactly at
    /// `self.end` still counts as contained.
    pub fn contains_range(&self, inner: &Range) -> bool {
        let extended = Range::new(self.start, self.end.forward(1));
        self.contains(inner.start) && extended.contains(inner.end)
    }

    /// True iff the two ranges share at least one character.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn to_std(self) -> std::ops::Range<usize> {
        self.start.offset()..self.end.offset()
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::new(Position::new(r.start), Position::new(r.end))
    }
}

impl From<Range> for std::ops::Range<usize> {
    fn from(r: Range) -> Self {
        r.to_std()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format_smolstr!("{}..{}", self.start, self.end))
    }
}

/// Identifier of a tag, unique within one [`crate::AnnotationStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u64);

impl TagId {
    /// The shared tag marking every translatable region.
    pub const TRANSLATABLE: TagId = TagId(0);
    /// The tag marking the active anchor.
    pub const SELECTED: TagId = TagId(1);
    /// First id handed out to token anchors.
    pub const FIRST_ANCHOR: TagId = TagId(2);
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format_smolstr!("#{}", self.0))
    }
}

/// What a tag means.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagKind {
    /// Highlights text eligible for substitution. May span several anchors.
    Translatable,
    /// The single active anchor.
    Selected,
    /// Binds one analysed token to its live range. Carries the token's
    /// sequence index in the analysis pass that created it.
    TokenAnchor(usize),
}

impl TagKind {
    pub fn is_anchor(&self) -> bool {
        matches!(self, TagKind::TokenAnchor(_))
    }
}

/// A tag attached to the buffer through the tag table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub id: TagId,
    pub kind: TagKind,
}

impl Tag {
    pub const TRANSLATABLE: Tag = Tag {
        id: TagId::TRANSLATABLE,
        kind: TagKind::Translatable,
    };

    pub const SELECTED: Tag = Tag {
        id: TagId::SELECTED,
        kind: TagKind::Selected,
    };

    pub fn anchor(id: TagId, sequence_index: usize) -> Self {
        Self {
            id,
            kind: TagKind::TokenAnchor(sequence_index),
        }
    }
}

/// Part-of-speech tag assigned to punctuation by the analyzer.
pub const PUNCTUATION_POS: &str = "PUNCT";

/// A token produced by the external analyzer for one analysis pass.
///
/// Offsets are in characters relative to the start of the analysed text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: SmolStr,
    #[serde(rename = "start")]
    pub start_offset: usize,
    pub length: usize,
    #[serde(rename = "pos")]
    pub part_of_speech: SmolStr,
    pub lemma: SmolStr,
    #[serde(rename = "index")]
    pub sequence_index: usize,
    /// Phonetic reading, if the analyzer provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading: Option<SmolStr>,
}

impl Token {
    /// Token whose length is taken from its text.
    pub fn new(
        text: impl Into<SmolStr>,
        start_offset: usize,
        part_of_speech: impl Into<SmolStr>,
        lemma: impl Into<SmolStr>,
        sequence_index: usize,
    ) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            text,
            start_offset,
            length,
            part_of_speech: part_of_speech.into(),
            lemma: lemma.into(),
            sequence_index,
            reading: None,
        }
    }

    pub fn with_reading(mut self, reading: impl Into<SmolStr>) -> Self {
        self.reading = Some(reading.into());
        self
    }

    /// Range the token occupied in the analysed text.
    pub fn range(&self) -> Range {
        Range::from_offsets(self.start_offset, self.length)
    }

    pub fn is_punctuation(&self) -> bool {
        self.part_of_speech == PUNCTUATION_POS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_normalizes() {
        let r = Range::new(Position::new(7), Position::new(3));
        assert_eq!(r.start, Position::new(3));
        assert_eq!(r.end, Position::new(7));
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn test_range_contains() {
        let r = Range::from(2..5);
        assert!(!r.contains(Position::new(1)));
        assert!(r.contains(Position::new(2)));
        assert!(r.contains(Position::new(4)));
        assert!(!r.contains(Position::new(5))); // end is exclusive
    }

    #[test]
    fn test_range_contains_range() {
        let outer = Range::from(2..6);
        assert!(outer.contains_range(&Range::from(2..6)));
        assert!(outer.contains_range(&Range::from(3..6)));
        assert!(outer.contains_range(&Range::from(3..4)));
        assert!(!outer.contains_range(&Range::from(1..4)));
        assert!(!outer.contains_range(&Range::from(3..7)));
        // Start must be strictly inside.
        assert!(!outer.contains_range(&Range::from(6..6)));
        assert!(!Range::from(2..2).contains_range(&Range::from(2..2)));
    }

    #[test]
    fn test_range_overlaps() {
        let a = Range::from(2..5);
        assert!(a.overlaps(&Range::from(4..8)));
        assert!(a.overlaps(&Range::from(0..3)));
        assert!(a.overlaps(&Range::from(3..4)));
        assert!(!a.overlaps(&Range::from(5..8))); // touching is not overlapping
        assert!(!a.overlaps(&Range::from(0..2)));
    }

    #[test]
    fn test_display_honours_width() {
        assert_eq!(format!("{:>5}|", TagId(2)), "   #2|");
        assert_eq!(format!("{:<8}|", Range::from(3..10)), "3..10   |");
        assert_eq!(TagId(12).to_string(), "#12");
    }

    #[test]
    fn test_token_range_counts_chars() {
        let token = Token::new("倒した", 3, "VERB", "倒す", 2);
        assert_eq!(token.length, 3);
        assert_eq!(token.range(), Range::from(3..6));
        assert!(!token.is_punctuation());
    }

    #[test]
    fn test_token_deserialize() {
        let json = r#"{"text":"。","start":6,"length":1,"pos":"PUNCT","lemma":"。","index":5}"#;
        let token: Token = serde_json::from_str(json).unwrap();
        assert!(token.is_punctuation());
        assert_eq!(token.reading, None);
        assert_eq!(token.range(), Range::from(6..7));
    }
}
