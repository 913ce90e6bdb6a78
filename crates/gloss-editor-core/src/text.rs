//! Raw character storage behind the tagged buffer.
//!
//! Storage knows nothing about tags. [`crate::TaggedBuffer`] tracks marks on
//! top of any [`TextBuffer`].

use std::ops::Range;

use smol_str::{SmolStr, ToSmolStr};

/// Char-addressed editable text.
///
/// Offsets count Unicode scalar values. Callers check bounds before
/// `insert` and `delete`; the read methods return `None` when out of range.
pub trait TextBuffer {
    fn len_chars(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    fn insert(&mut self, char_offset: usize, text: &str);

    fn delete(&mut self, char_range: Range<usize>);

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr>;

    fn char_at(&self, char_offset: usize) -> Option<char>;

    /// The whole text.
    fn contents(&self) -> String;

    /// Swap the whole text for `text`.
    fn set_contents(&mut self, text: &str) {
        let len = self.len_chars();
        self.delete(0..len);
        self.insert(0, text);
    }
}

/// [`TextBuffer`] over a `ropey` rope.
#[derive(Clone, Debug, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
}

impl EditorRope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_str(s: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(s),
        }
    }
}

impl TextBuffer for EditorRope {
    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn insert(&mut self, char_offset: usize, text: &str) {
        self.rope.insert(char_offset, text);
    }

    fn delete(&mut self, char_range: Range<usize>) {
        self.rope.remove(char_range);
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        self.rope.get_slice(char_range).map(|s| s.to_smolstr())
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        self.rope.get_char(char_offset)
    }

    fn contents(&self) -> String {
        self.rope.to_string()
    }

    fn set_contents(&mut self, text: &str) {
        self.rope = ropey::Rope::from_str(text);
    }
}

impl From<&str> for EditorRope {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_japanese() {
        let mut rope = EditorRope::from_str("魔王を倒した");
        assert_eq!(rope.len_chars(), 6);

        rope.insert(3, "ついに");
        assert_eq!(rope.contents(), "魔王をついに倒した");

        rope.delete(3..6);
        assert_eq!(rope.contents(), "魔王を倒した");
    }

    #[test]
    fn test_reads_out_of_range() {
        let rope = EditorRope::from_str("魔王");
        assert_eq!(rope.char_at(1), Some('王'));
        assert_eq!(rope.char_at(2), None);
        assert_eq!(rope.slice(0..1).as_deref(), Some("魔"));
        assert_eq!(rope.slice(1..3), None);
    }

    #[test]
    fn test_set_contents() {
        let mut rope = EditorRope::from("勇者");
        rope.set_contents("");
        assert!(rope.is_empty());
        rope.set_contents("魔王");
        assert_eq!(rope.contents(), "魔王");
    }
}
