//! Live annotations over a tagged buffer.
//!
//! The store owns the buffer, the token anchors and the single selection.
//! Anchors are created in bulk by reconciliation, move with their text, and
//! go stale once their text is deleted. Stale anchors are swept lazily by
//! [`AnnotationStore::remove_stale_anchors`].

use std::collections::{BTreeMap, HashMap};

use crate::buffer::TaggedBuffer;
use crate::error::EditorError;
use crate::text::{EditorRope, TextBuffer};
use crate::types::{Position, Range, Tag, TagId, TagKind, Token};

/// A token bound to a tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Anchor {
    pub token: Token,
    /// The token following this one in its analysis pass, if any.
    pub next: Option<Token>,
}

impl Anchor {
    /// True if the token was the last of its pass.
    pub fn is_final(&self) -> bool {
        self.next.is_none()
    }
}

/// Owner of the tag set over one buffer.
#[derive(Clone)]
pub struct AnnotationStore<B = EditorRope> {
    buffer: TaggedBuffer<B>,
    anchors: HashMap<TagId, Anchor>,
    next_id: u64,
}

impl<B: TextBuffer + Default> Default for AnnotationStore<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

impl AnnotationStore<EditorRope> {
    pub fn from_str(s: &str) -> Self {
        Self::new(EditorRope::from_str(s))
    }
}

impl<B: TextBuffer> AnnotationStore<B> {
    pub fn new(text: B) -> Self {
        Self {
            buffer: TaggedBuffer::new(text),
            anchors: HashMap::new(),
            next_id: TagId::FIRST_ANCHOR.0,
        }
    }

    pub fn buffer(&self) -> &TaggedBuffer<B> {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    /// Replace the whole content. Every tag, anchor and the selection go.
    pub fn reset(&mut self, text: &str) {
        self.buffer.reset(text);
        self.anchors.clear();
    }

    /// Plain user insertion. Tags follow the edit.
    pub fn insert(&mut self, at: Position, text: &str) -> Result<Range, EditorError> {
        self.buffer.insert(at, text)
    }

    /// Plain user deletion. Tags living only in `range` are detached.
    pub fn delete(&mut self, range: Range) -> Result<(), EditorError> {
        self.buffer.delete(range)
    }

    pub fn query_tags_exactly_at(&self, range: &Range) -> Vec<Tag> {
        self.buffer.tags_exactly_at(range)
    }

    pub fn query_tags_containing(&self, range: &Range) -> BTreeMap<Tag, Range> {
        self.buffer.tags_containing(range)
    }

    pub fn anchor(&self, id: TagId) -> Option<&Anchor> {
        self.anchors.get(&id)
    }

    /// Current range of an anchor, `None` if unknown or stale.
    pub fn anchor_range(&self, id: TagId) -> Option<Range> {
        if !self.anchors.contains_key(&id) {
            return None;
        }
        self.buffer.tags().first_range(id)
    }

    /// Live anchors with their ranges, in buffer order.
    pub fn anchors(&self) -> Vec<(TagId, Range, &Anchor)> {
        let mut live: Vec<_> = self
            .anchors
            .iter()
            .filter_map(|(id, anchor)| {
                self.buffer
                    .tags()
                    .first_range(*id)
                    .map(|range| (*id, range, anchor))
            })
            .collect();
        live.sort_by_key(|(_, range, _)| *range);
        live
    }

    /// Number of known anchors, stale ones included until the next sweep.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    /// The anchor under `p`, if any.
    pub fn anchor_at(&self, p: Position) -> Option<(TagId, Range)> {
        self.anchors
            .keys()
            .find_map(|id| self.buffer.tag_range_at(*id, p).map(|r| (*id, r)))
    }

    /// Ranges of the shared translatable tag.
    pub fn translatable_ranges(&self) -> &[Range] {
        self.buffer.tag_ranges(TagId::TRANSLATABLE)
    }

    fn overlapping_anchor(&self, range: &Range) -> Option<TagId> {
        self.anchors.keys().copied().find(|id| {
            self.buffer
                .tag_ranges(*id)
                .iter()
                .any(|r| r.overlaps(range))
        })
    }

    /// Bind `token` to `range`.
    ///
    /// Fails with [`EditorError::Overlap`] if any existing anchor shares a
    /// character with `range`, and with [`EditorError::Range`] if the range is
    /// empty or does not resolve. The range is also marked translatable.
    pub fn add_anchor(
        &mut self,
        token: Token,
        next: Option<Token>,
        range: Range,
    ) -> Result<TagId, EditorError> {
        let range = self.buffer.resolve(range)?;
        if range.is_empty() {
            return Err(EditorError::Range {
                range,
                len: self.buffer.len_chars(),
            });
        }
        if let Some(existing) = self.overlapping_anchor(&range) {
            return Err(EditorError::Overlap { range, existing });
        }

        let id = TagId(self.next_id);
        self.next_id += 1;

        self.buffer
            .tag_add(Tag::anchor(id, token.sequence_index), range)?;
        self.buffer.tag_add(Tag::TRANSLATABLE, range)?;
        self.anchors.insert(id, Anchor { token, next });

        Ok(id)
    }

    /// Drop every anchor whose text has been deleted. Returns how many went.
    pub fn remove_stale_anchors(&mut self) -> usize {
        let stale: Vec<TagId> = self
            .anchors
            .keys()
            .copied()
            .filter(|id| self.buffer.tag_ranges(*id).is_empty())
            .collect();
        for id in &stale {
            self.anchors.remove(id);
            self.buffer.tag_delete(*id);
            tracing::debug!(tag = %id, "removed stale anchor");
        }
        stale.len()
    }

    /// Make `id` the single selected anchor and return its range.
    pub fn select(&mut self, id: TagId) -> Result<Range, EditorError> {
        let range = self.anchor_range(id).ok_or(EditorError::NotFound(id))?;
        self.buffer.tag_clear(TagId::SELECTED);
        self.buffer.tag_add(Tag::SELECTED, range)?;
        Ok(range)
    }

    pub fn clear_selection(&mut self) {
        self.buffer.tag_clear(TagId::SELECTED);
    }

    /// The selected anchor and its range.
    ///
    /// `None` when nothing is selected or the selected text has been deleted.
    pub fn current_selection(&self) -> Option<(TagId, Range)> {
        let selected = self.buffer.tag_ranges(TagId::SELECTED).first().copied()?;
        self.query_tags_exactly_at(&selected)
            .into_iter()
            .find(|tag| tag.kind.is_anchor() && self.anchors.contains_key(&tag.id))
            .map(|tag| (tag.id, selected))
    }

    /// Reattach the tags detached by the replacement of `old_range` with the
    /// text now at `new_range`.
    ///
    /// Only the first anchor among the affected tags survives; any other is
    /// purged so no two anchors ever share a range.
    pub fn reattach_after_replace(&mut self, old_range: Range, new_range: Range) {
        let Some(info) = self.buffer.last_replace() else {
            return;
        };
        if info.old_range != old_range || info.new_range != new_range {
            tracing::warn!(%old_range, %new_range, "no matching replacement to reattach");
            return;
        }
        let affected = info.affected.clone();

        let mut anchored = false;
        for tag in affected {
            if let TagKind::TokenAnchor(_) = tag.kind {
                if anchored || !self.anchors.contains_key(&tag.id) {
                    self.anchors.remove(&tag.id);
                    self.buffer.tag_delete(tag.id);
                    continue;
                }
                anchored = true;
            }
            if new_range.is_empty() {
                continue;
            }
            if let Err(e) = self.buffer.tag_add(tag, new_range) {
                tracing::warn!(tag = %tag.id, error = %e, "failed to reattach tag");
            }
        }
    }

    /// Replace `range` with `text`, keeping related tags on the new text.
    pub fn replace(&mut self, range: Range, text: &str) -> Result<Range, EditorError> {
        let new_range = self.buffer.replace(range, text)?;
        self.reattach_after_replace(range, new_range);
        Ok(new_range)
    }
}
