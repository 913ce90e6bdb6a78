//! Text buffer with live tag ranges.
//!
//! `TaggedBuffer` pairs raw character storage with a [`TagTable`] and keeps
//! the two consistent: every insertion and deletion is reported to the tag
//! table before the call returns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::error::EditorError;
use crate::marks::TagTable;
use crate::text::{EditorRope, TextBuffer};
use crate::types::{Position, Range, Tag, TagId};

/// Record of the most recent [`TaggedBuffer::replace`].
///
/// Deleting the old range detaches every tag that lived entirely inside it.
/// `affected` lists the tags related to the old range before the delete, so
/// the caller can decide which of them to reattach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceInfo {
    pub old_range: Range,
    pub new_range: Range,
    /// Tags whose range was contained in, or contained, the old range.
    pub affected: Vec<Tag>,
}

/// A text buffer whose tags follow edits.
#[derive(Clone, Default)]
pub struct TaggedBuffer<B = EditorRope> {
    text: B,
    tags: TagTable,
    last_replace: Option<ReplaceInfo>,
}

impl TaggedBuffer<EditorRope> {
    pub fn from_str(s: &str) -> Self {
        Self::new(EditorRope::from_str(s))
    }
}

impl<B: TextBuffer> TaggedBuffer<B> {
    pub fn new(text: B) -> Self {
        Self {
            text,
            tags: TagTable::new(),
            last_replace: None,
        }
    }

    /// Get a reference to the raw text storage.
    pub fn inner(&self) -> &B {
        &self.text
    }

    pub fn tags(&self) -> &TagTable {
        &self.tags
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Position just after the last character.
    pub fn end(&self) -> Position {
        Position::new(self.text.len_chars())
    }

    /// Whole buffer contents.
    pub fn text(&self) -> String {
        self.text.contents()
    }

    pub fn compare(&self, a: Position, b: Position) -> Ordering {
        a.cmp(&b)
    }

    /// True iff `start <= p < end`.
    pub fn is_within(&self, p: Position, range: &Range) -> bool {
        range.contains(p)
    }

    /// Containment with the end of `inner` allowed to touch `outer.end`.
    pub fn is_range_within(&self, inner: &Range, outer: &Range) -> bool {
        outer.contains_range(inner)
    }

    /// Check that `range` resolves in the current buffer.
    pub fn resolve(&self, range: Range) -> Result<Range, EditorError> {
        if range.end > self.end() {
            return Err(EditorError::Range {
                range,
                len: self.len_chars(),
            });
        }
        Ok(range)
    }

    pub fn slice(&self, range: Range) -> Result<SmolStr, EditorError> {
        let range = self.resolve(range)?;
        self.text
            .slice(range.to_std())
            .ok_or(EditorError::Range {
                range,
                len: self.len_chars(),
            })
    }

    pub fn length(&self, range: Range) -> usize {
        range.len()
    }

    pub fn char_at(&self, p: Position) -> Option<char> {
        self.text.char_at(p.offset())
    }

    /// Insert text at `at`, returning the range it now occupies.
    pub fn insert(&mut self, at: Position, text: &str) -> Result<Range, EditorError> {
        self.resolve(Range::caret(at))?;
        let len = text.chars().count();
        self.text.insert(at.offset(), text);
        self.tags.adjust_for_insert(at, len);
        Ok(Range::new(at, at.forward(len)))
    }

    /// Delete the characters in `range`. Tags living only there are detached.
    pub fn delete(&mut self, range: Range) -> Result<(), EditorError> {
        let range = self.resolve(range)?;
        if range.is_empty() {
            return Ok(());
        }
        self.text.delete(range.to_std());
        self.tags.adjust_for_delete(range);
        Ok(())
    }

    /// Replace `range` with `text` and return the range spanning the new text.
    ///
    /// This is a delete followed by an insert: tags whose range equalled or
    /// was contained in `range` are detached. They are listed in
    /// [`TaggedBuffer::last_replace`] for the caller to reattach.
    pub fn replace(&mut self, range: Range, text: &str) -> Result<Range, EditorError> {
        let range = self.resolve(range)?;
        let affected = self.tags_related_to(&range);

        self.delete(range)?;
        let new_range = self.insert(range.start, text)?;

        self.last_replace = Some(ReplaceInfo {
            old_range: range,
            new_range,
            affected,
        });
        Ok(new_range)
    }

    pub fn last_replace(&self) -> Option<&ReplaceInfo> {
        self.last_replace.as_ref()
    }

    /// Replace all content and drop every tag.
    pub fn reset(&mut self, text: &str) {
        self.text.set_contents(text);
        self.tags.reset();
        self.last_replace = None;
    }

    pub fn tag_add(&mut self, tag: Tag, range: Range) -> Result<(), EditorError> {
        let range = self.resolve(range)?;
        self.tags.add(tag, range);
        Ok(())
    }

    pub fn tag_remove(&mut self, id: TagId, range: Range) {
        self.tags.remove(id, range);
    }

    /// Detach a tag from the whole buffer.
    pub fn tag_clear(&mut self, id: TagId) {
        self.tags.clear(id);
    }

    pub fn tag_delete(&mut self, id: TagId) -> bool {
        self.tags.delete(id)
    }

    pub fn tag_ranges(&self, id: TagId) -> &[Range] {
        self.tags.ranges(id)
    }

    /// Tags having a range exactly equal to `range`.
    pub fn tags_exactly_at(&self, range: &Range) -> Vec<Tag> {
        self.tags
            .iter_ranges()
            .filter(|(_, r)| r == range)
            .map(|(tag, _)| tag)
            .collect()
    }

    /// Tags having a range that contains `range`, with that range.
    pub fn tags_containing(&self, range: &Range) -> BTreeMap<Tag, Range> {
        self.tags
            .iter_ranges()
            .filter(|(_, r)| r.contains_range(range))
            .collect()
    }

    /// The range of tag `id` under `p`, if any (hit-testing).
    pub fn tag_range_at(&self, id: TagId, p: Position) -> Option<Range> {
        self.tags.ranges(id).iter().copied().find(|r| r.contains(p))
    }

    fn tags_related_to(&self, range: &Range) -> Vec<Tag> {
        let mut related: Vec<Tag> = self
            .tags
            .iter_ranges()
            .filter(|(_, r)| r.contains_range(range) || range.contains_range(r))
            .map(|(tag, _)| tag)
            .collect();
        related.dedup();
        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(n: u64) -> Tag {
        Tag::anchor(TagId(n), 0)
    }

    #[test]
    fn test_replace_returns_new_range() {
        let mut buf = TaggedBuffer::from_str("魔王を倒した");
        let new_range = buf.replace(Range::from(3..6), "DEFEAT").unwrap();
        assert_eq!(buf.text(), "魔王をDEFEAT");
        assert_eq!(new_range, Range::from(3..9));
        assert_eq!(buf.slice(new_range).unwrap(), "DEFEAT");
    }

    #[test]
    fn test_replace_detaches_contained_tags() {
        let mut buf = TaggedBuffer::from_str("魔王を倒した");
        buf.tag_add(anchor(2), Range::from(3..6)).unwrap();
        buf.tag_add(anchor(3), Range::from(0..2)).unwrap();

        buf.replace(Range::from(3..6), "DEFEAT").unwrap();

        assert!(buf.tag_ranges(TagId(2)).is_empty());
        assert_eq!(buf.tag_ranges(TagId(3)), &[Range::from(0..2)]);

        let info = buf.last_replace().unwrap();
        assert_eq!(info.old_range, Range::from(3..6));
        assert_eq!(info.new_range, Range::from(3..9));
        assert_eq!(info.affected, vec![anchor(2)]);
    }

    #[test]
    fn test_replace_out_of_bounds() {
        let mut buf = TaggedBuffer::from_str("abc");
        let err = buf.replace(Range::from(2..5), "x").unwrap_err();
        assert_eq!(
            err,
            EditorError::Range {
                range: Range::from(2..5),
                len: 3
            }
        );
        assert_eq!(buf.text(), "abc");
    }

    #[test]
    fn test_edits_shift_following_tags() {
        let mut buf = TaggedBuffer::from_str("ab cd");
        buf.tag_add(anchor(2), Range::from(3..5)).unwrap();
        buf.insert(Position::ZERO, "xx").unwrap();
        assert_eq!(buf.tag_ranges(TagId(2)), &[Range::from(5..7)]);
        buf.delete(Range::from(0..3)).unwrap();
        assert_eq!(buf.tag_ranges(TagId(2)), &[Range::from(2..4)]);
        assert_eq!(buf.slice(Range::from(2..4)).unwrap(), "cd");
    }

    #[test]
    fn test_tag_queries() {
        let mut buf = TaggedBuffer::from_str("abcdef");
        buf.tag_add(Tag::TRANSLATABLE, Range::from(0..6)).unwrap();
        buf.tag_add(anchor(2), Range::from(2..4)).unwrap();
        buf.tag_add(Tag::SELECTED, Range::from(2..4)).unwrap();

        let exact = buf.tags_exactly_at(&Range::from(2..4));
        assert_eq!(exact, vec![Tag::SELECTED, anchor(2)]);

        let containing = buf.tags_containing(&Range::from(2..4));
        assert_eq!(containing.len(), 3);
        assert_eq!(containing[&Tag::TRANSLATABLE], Range::from(0..6));

        assert_eq!(
            buf.tag_range_at(TagId(2), Position::new(3)),
            Some(Range::from(2..4))
        );
        assert_eq!(buf.tag_range_at(TagId(2), Position::new(4)), None);
    }

    #[test]
    fn test_reset_drops_tags() {
        let mut buf = TaggedBuffer::from_str("abc");
        buf.tag_add(anchor(2), Range::from(0..1)).unwrap();
        buf.reset("xyz");
        assert_eq!(buf.text(), "xyz");
        assert!(!buf.tags().is_defined(TagId(2)));
    }
}
