#![forbid(unsafe_code)]

//! Screen buffer: the cell grid the renderer diffs against the terminal.
//!
//! Cells are stored row-major (`index = row * cols + col`). Each row carries
//! a dirty flag so the renderer can skip untouched rows without scanning.
//!
//! # Invariants
//!
//! 1. `cells.len() == cols * rows` and `row_dirty.len() == rows`
//! 2. The clip rectangle always lies inside the buffer bounds
//! 3. A wide glyph is always followed by its continuation cell; writing over
//!    either half blanks the other half
//! 4. Dimensions change only through [`ScreenBuffer::resize`], which resets
//!    every cell and marks everything dirty

use termio_core::geometry::{Point, Rect};

use crate::attribute::Attribute;
use crate::cell::{Cell, REPLACEMENT_CHAR, char_width};

#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    cols: u16,
    rows: u16,
    cells: Vec<Cell>,
    row_dirty: Vec<bool>,
    clip: Rect,
    cursor: Point,
    attribute: Attribute,
}

impl ScreenBuffer {
    /// A `cols` x `rows` grid of dirty blank cells.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        let mut buffer = Self {
            cols: 0,
            rows: 0,
            cells: Vec::new(),
            row_dirty: Vec::new(),
            clip: Rect::default(),
            cursor: Point::default(),
            attribute: Attribute::DEFAULT,
        };
        buffer.resize(cols, rows);
        buffer
    }

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.cols, self.rows)
    }

    /// Reallocate for a new size. Clip and cursor are reset.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Cell::blank(self.attribute); usize::from(cols) * usize::from(rows)];
        self.row_dirty = vec![true; usize::from(rows)];
        self.clip = self.bounds();
        self.cursor = Point::default();
    }

    /// Blank every cell with the current attribute.
    pub fn clear_contents(&mut self) {
        let blank = Cell::blank(self.attribute);
        self.cells.fill(blank);
        self.row_dirty.fill(true);
    }

    /// Force a full repaint on the next render.
    pub fn mark_all_dirty(&mut self) {
        for cell in &mut self.cells {
            cell.dirty = true;
        }
        self.row_dirty.fill(true);
    }

    #[inline]
    #[must_use]
    pub fn clip(&self) -> Rect {
        self.clip
    }

    /// Set the clip rectangle, clamped to the buffer.
    pub fn set_clip(&mut self, clip: Rect) {
        self.clip = clip.intersection(&self.bounds());
    }

    /// Logical cursor, possibly outside the buffer.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    pub fn move_to(&mut self, col: u16, row: u16) {
        self.cursor = Point::new(col, row);
    }

    #[inline]
    #[must_use]
    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// Attribute applied to subsequently added text.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        self.attribute = attribute;
    }

    #[inline]
    fn index(&self, col: u16, row: u16) -> Option<usize> {
        (col < self.cols && row < self.rows)
            .then(|| usize::from(row) * usize::from(self.cols) + usize::from(col))
    }

    #[must_use]
    pub fn get(&self, col: u16, row: u16) -> Option<&Cell> {
        self.index(col, row).map(|i| &self.cells[i])
    }

    /// Cells of one row; empty if `row` is out of range.
    #[must_use]
    pub fn row(&self, row: u16) -> &[Cell] {
        if row >= self.rows {
            return &[];
        }
        let start = usize::from(row) * usize::from(self.cols);
        &self.cells[start..start + usize::from(self.cols)]
    }

    pub(crate) fn row_mut(&mut self, row: u16) -> &mut [Cell] {
        if row >= self.rows {
            return &mut [];
        }
        let start = usize::from(row) * usize::from(self.cols);
        &mut self.cells[start..start + usize::from(self.cols)]
    }

    #[inline]
    #[must_use]
    pub fn is_row_dirty(&self, row: u16) -> bool {
        self.row_dirty.get(usize::from(row)).copied().unwrap_or(false)
    }

    pub(crate) fn clear_row_dirty(&mut self, row: u16) {
        if let Some(flag) = self.row_dirty.get_mut(usize::from(row)) {
            *flag = false;
        }
    }

    /// Whether any cell still needs rendering.
    #[must_use]
    pub fn has_dirty(&self) -> bool {
        self.row_dirty.iter().any(|&d| d)
    }

    #[must_use]
    pub fn dirty_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| c.dirty).count()
    }

    /// Write one scalar value at the cursor and advance it.
    ///
    /// - Zero-width code points attach to the glyph left of the cursor and do
    ///   not advance.
    /// - Control characters are stored as spaces.
    /// - A wide glyph whose second column would fall on or past the clip
    ///   edge is replaced by [`REPLACEMENT_CHAR`].
    /// - Outside the clip rectangle nothing is written but the cursor still
    ///   advances.
    pub fn add_rune(&mut self, ch: char) {
        let Point { x: col, y: row } = self.cursor;
        let ch = if ch.is_control() { ' ' } else { ch };
        let width = char_width(ch);

        if width == 0 {
            self.attach_combining(col, row, ch);
            return;
        }

        if !self.clip.contains(col, row) {
            self.cursor.x = col.saturating_add(width as u16);
            return;
        }

        let (ch, width) = if width == 2 && col.saturating_add(1) >= self.clip.right() {
            (REPLACEMENT_CHAR, 1)
        } else {
            (ch, width)
        };

        self.cleanup_overlap(col, row);
        let attribute = self.attribute;
        if let Some(i) = self.index(col, row) {
            self.cells[i] = Cell::from_char(ch, attribute);
        }
        if width == 2 {
            let next = col + 1;
            self.cleanup_overlap(next, row);
            if let Some(i) = self.index(next, row) {
                self.cells[i].make_continuation(attribute);
            }
        }
        self.row_dirty[usize::from(row)] = true;
        self.cursor.x = col.saturating_add(width as u16);
    }

    /// Write every scalar value of `text` with [`add_rune`](Self::add_rune).
    pub fn add_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.add_rune(ch);
        }
    }

    fn attach_combining(&mut self, col: u16, row: u16, mark: char) {
        let Some(mut target) = col.checked_sub(1) else {
            return;
        };
        if self.get(target, row).is_some_and(|c| c.continuation) && target > 0 {
            target -= 1;
        }
        if !self.clip.contains(target, row) {
            return;
        }
        if let Some(i) = self.index(target, row) {
            let cell = &mut self.cells[i];
            cell.combining.push(mark);
            cell.dirty = true;
            self.row_dirty[usize::from(row)] = true;
        }
    }

    /// Blank the other half of any wide glyph that overlaps `(col, row)`.
    fn cleanup_overlap(&mut self, col: u16, row: u16) {
        let Some(i) = self.index(col, row) else {
            return;
        };
        let attribute = self.cells[i].attribute;
        if self.cells[i].continuation {
            if let Some(head) = col.checked_sub(1).and_then(|c| self.index(c, row)) {
                self.cells[head] = Cell::blank(self.cells[head].attribute);
            }
        } else if self.cells[i].width() == 2 {
            if let Some(tail) = self.index(col + 1, row) {
                if self.cells[tail].continuation {
                    self.cells[tail] = Cell::blank(attribute);
                }
            }
        }
    }
}
