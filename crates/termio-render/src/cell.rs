#![forbid(unsafe_code)]

//! Screen cells and display width.

use smallvec::SmallVec;
use unicode_width::UnicodeWidthChar;

use crate::attribute::Attribute;

/// Substituted for a wide glyph that does not fit before the clip edge.
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Columns a scalar value occupies: 0 for combining marks and other
/// zero-width code points, 2 for wide glyphs, otherwise 1.
///
/// C0/C1 controls are reported as 1; the buffer stores them as spaces.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    if ch.is_ascii() {
        return 1;
    }
    if ch.is_control() {
        return 1;
    }
    ch.width().unwrap_or(1)
}

/// One terminal column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    /// Combining marks drawn on top of `ch`, in arrival order.
    pub combining: SmallVec<[char; 2]>,
    pub attribute: Attribute,
    pub dirty: bool,
    /// Second column of a wide glyph. Never emitted.
    pub continuation: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self::blank(Attribute::DEFAULT)
    }
}

impl Cell {
    /// A dirty space with `attribute`.
    #[must_use]
    pub fn blank(attribute: Attribute) -> Self {
        Self {
            ch: ' ',
            combining: SmallVec::new(),
            attribute,
            dirty: true,
            continuation: false,
        }
    }

    #[must_use]
    pub fn from_char(ch: char, attribute: Attribute) -> Self {
        Self {
            ch,
            ..Self::blank(attribute)
        }
    }

    /// Columns this cell's glyph occupies.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        if self.continuation { 0 } else { char_width(self.ch) }
    }

    /// Overwrite with the filler that follows a wide glyph.
    pub fn make_continuation(&mut self, attribute: Attribute) {
        self.ch = ' ';
        self.combining.clear();
        self.attribute = attribute;
        self.continuation = true;
        self.dirty = true;
    }

    /// UTF-8 encode the glyph and its combining marks onto `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        out.extend_from_slice(self.ch.encode_utf8(&mut buf).as_bytes());
        for mark in &self.combining {
            out.extend_from_slice(mark.encode_utf8(&mut buf).as_bytes());
        }
    }
}
