//! Tag range storage that follows buffer edits.
//!
//! Every tag owns a sorted list of disjoint, non-empty ranges. Insertions and
//! deletions reported by the owning buffer shift those ranges so they keep
//! covering the same characters. A tag whose characters are all deleted ends
//! up with no ranges: it is still defined, but detached.

use std::collections::BTreeMap;

use crate::types::{Position, Range, Tag, TagId, TagKind};

#[derive(Clone, Debug)]
struct TagEntry {
    kind: TagKind,
    ranges: Vec<Range>,
}

/// Range-keyed tag storage.
#[derive(Clone, Debug, Default)]
pub struct TagTable {
    entries: BTreeMap<TagId, TagEntry>,
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `tag` to `range`, merging with touching ranges of the same tag.
    ///
    /// Defines the tag if needed. Empty ranges define the tag but add nothing.
    pub fn add(&mut self, tag: Tag, range: Range) {
        let entry = self.entries.entry(tag.id).or_insert_with(|| TagEntry {
            kind: tag.kind,
            ranges: Vec::new(),
        });
        if range.is_empty() {
            return;
        }
        entry.ranges.push(range);
        coalesce(&mut entry.ranges);
    }

    /// Detach `id` from the characters in `range`.
    pub fn remove(&mut self, id: TagId, range: Range) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        let mut kept = Vec::with_capacity(entry.ranges.len() + 1);
        for r in entry.ranges.drain(..) {
            if !r.overlaps(&range) {
                kept.push(r);
                continue;
            }
            if r.start < range.start {
                kept.push(Range::new(r.start, range.start));
            }
            if range.end < r.end {
                kept.push(Range::new(range.end, r.end));
            }
        }
        entry.ranges = kept;
    }

    /// Detach `id` everywhere but keep it defined.
    pub fn clear(&mut self, id: TagId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.ranges.clear();
        }
    }

    /// Forget the tag entirely.
    pub fn delete(&mut self, id: TagId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Drop every tag.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn is_defined(&self, id: TagId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn kind(&self, id: TagId) -> Option<TagKind> {
        self.entries.get(&id).map(|e| e.kind)
    }

    /// Ranges of a tag in buffer order. Empty if undefined or detached.
    pub fn ranges(&self, id: TagId) -> &[Range] {
        self.entries
            .get(&id)
            .map(|e| e.ranges.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_range(&self, id: TagId) -> Option<Range> {
        self.ranges(id).first().copied()
    }

    /// All defined tags, attached or not, in id order.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.entries.iter().map(|(id, e)| Tag {
            id: *id,
            kind: e.kind,
        })
    }

    /// Every (tag, range) pair currently attached.
    pub fn iter_ranges(&self) -> impl Iterator<Item = (Tag, Range)> + '_ {
        self.entries.iter().flat_map(|(id, e)| {
            let tag = Tag {
                id: *id,
                kind: e.kind,
            };
            e.ranges.iter().map(move |r| (tag, *r))
        })
    }

    /// Shift ranges for `len` chars inserted at `at`.
    ///
    /// Text inserted exactly at a range boundary is not covered by that range.
    pub fn adjust_for_insert(&mut self, at: Position, len: usize) {
        if len == 0 {
            return;
        }
        for entry in self.entries.values_mut() {
            for r in entry.ranges.iter_mut() {
                if at <= r.start {
                    r.start = r.start.forward(len);
                    r.end = r.end.forward(len);
                } else if at < r.end {
                    r.end = r.end.forward(len);
                }
            }
        }
    }

    /// Shift ranges for the deletion of `deleted`.
    ///
    /// Ranges that end up empty are dropped, ranges of one tag that come to
    /// touch are merged.
    pub fn adjust_for_delete(&mut self, deleted: Range) {
        if deleted.is_empty() {
            return;
        }
        let map = |p: Position| {
            if p <= deleted.start {
                p
            } else if p >= deleted.end {
                p.backward(deleted.len())
            } else {
                deleted.start
            }
        };
        for entry in self.entries.values_mut() {
            for r in entry.ranges.iter_mut() {
                *r = Range::new(map(r.start), map(r.end));
            }
            entry.ranges.retain(|r| !r.is_empty());
            coalesce(&mut entry.ranges);
        }
    }
}

fn coalesce(ranges: &mut Vec<Range>) {
    ranges.sort();
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for r in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if r.start <= last.end => {
                if r.end > last.end {
                    last.end = r.end;
                }
            }
            _ => merged.push(r),
        }
    }
    *ranges = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(n: u64) -> Tag {
        Tag::anchor(TagId(n), n as usize)
    }

    #[test]
    fn test_add_merges_touching_ranges() {
        let mut table = TagTable::new();
        table.add(Tag::TRANSLATABLE, Range::from(0..2));
        table.add(Tag::TRANSLATABLE, Range::from(4..6));
        table.add(Tag::TRANSLATABLE, Range::from(2..4));
        assert_eq!(table.ranges(TagId::TRANSLATABLE), &[Range::from(0..6)]);
    }

    #[test]
    fn test_add_empty_defines_only() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..3));
        assert!(table.is_defined(TagId(2)));
        assert!(table.ranges(TagId(2)).is_empty());
    }

    #[test]
    fn test_remove_splits() {
        let mut table = TagTable::new();
        table.add(Tag::TRANSLATABLE, Range::from(0..10));
        table.remove(TagId::TRANSLATABLE, Range::from(3..5));
        assert_eq!(
            table.ranges(TagId::TRANSLATABLE),
            &[Range::from(0..3), Range::from(5..10)]
        );
    }

    #[test]
    fn test_insert_before_shifts() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..6));
        table.adjust_for_insert(Position::new(1), 2);
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(5..8)));
    }

    #[test]
    fn test_insert_at_boundaries_is_untagged() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..6));
        table.adjust_for_insert(Position::new(6), 4);
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(3..6)));
        table.adjust_for_insert(Position::new(3), 1);
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(4..7)));
    }

    #[test]
    fn test_insert_inside_grows() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..6));
        table.adjust_for_insert(Position::new(4), 3);
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(3..9)));
    }

    #[test]
    fn test_delete_covering_detaches() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..6));
        table.add(anchor(3), Range::from(6..8));
        table.adjust_for_delete(Range::from(2..6));
        assert!(table.ranges(TagId(2)).is_empty());
        assert!(table.is_defined(TagId(2)));
        assert_eq!(table.first_range(TagId(3)), Some(Range::from(2..4)));
    }

    #[test]
    fn test_delete_partial_shrinks() {
        let mut table = TagTable::new();
        table.add(anchor(2), Range::from(3..8));
        table.adjust_for_delete(Range::from(6..10));
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(3..6)));
        table.adjust_for_delete(Range::from(0..4));
        assert_eq!(table.first_range(TagId(2)), Some(Range::from(0..2)));
    }

    #[test]
    fn test_delete_gap_merges() {
        let mut table = TagTable::new();
        table.add(Tag::TRANSLATABLE, Range::from(0..2));
        table.add(Tag::TRANSLATABLE, Range::from(4..6));
        table.adjust_for_delete(Range::from(2..4));
        assert_eq!(table.ranges(TagId::TRANSLATABLE), &[Range::from(0..4)]);
    }

    #[test]
    fn test_iter_ranges() {
        let mut table = TagTable::new();
        table.add(Tag::TRANSLATABLE, Range::from(0..2));
        table.add(anchor(2), Range::from(0..2));
        let pairs: Vec<_> = table.iter_ranges().collect();
        assert_eq!(
            pairs,
            vec![
                (Tag::TRANSLATABLE, Range::from(0..2)),
                (anchor(2), Range::from(0..2)),
            ]
        );
    }
}
