#![forbid(unsafe_code)]

//! Screen renderer: dirty-cell diffing into minimal escape output.
//!
//! For each dirty row the renderer walks the columns left to right and
//! groups contiguous dirty cells into runs. Each run costs one cursor
//! positioning sequence; inside a run the terminal cursor advances on its
//! own. A color sequence is emitted only when a cell's attribute differs
//! from the last one sent, and that "last attribute" persists across rows
//! and across frames.
//!
//! The whole frame is assembled in memory and handed to the writer with a
//! single `write_all`, so a frame costs at most one write syscall.
//!
//! Rendering a buffer with no dirty cells writes nothing at all.

use std::io::{self, Write};
use std::time::Instant;

use crate::ansi;
use crate::attribute::Attribute;
use crate::buffer::ScreenBuffer;
use crate::cell::REPLACEMENT_CHAR;
use crate::color::ColorMode;
use crate::counting_writer::{CountingWriter, RenderStats};

#[derive(Debug)]
pub struct ScreenRenderer {
    mode: ColorMode,
    /// Attribute the terminal is known to be using. `None` after
    /// construction or [`invalidate`](Self::invalidate).
    last_attribute: Option<Attribute>,
    frame: Vec<u8>,
}

impl ScreenRenderer {
    #[must_use]
    pub fn new(mode: ColorMode) -> Self {
        Self {
            mode,
            last_attribute: None,
            frame: Vec::with_capacity(16 * 1024),
        }
    }

    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.mode
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.mode = mode;
        self.last_attribute = None;
    }

    /// Forget what the terminal is showing; the next attribute is re-sent.
    pub fn invalidate(&mut self) {
        self.last_attribute = None;
    }

    /// Emit every dirty cell of `buffer` to `w` and clear the dirty flags.
    ///
    /// Dirty flags are cleared even if the write fails; callers that want
    /// to retry should [`ScreenBuffer::mark_all_dirty`] and
    /// [`invalidate`](Self::invalidate).
    pub fn render<W: Write>(
        &mut self,
        buffer: &mut ScreenBuffer,
        w: &mut W,
    ) -> io::Result<RenderStats> {
        let span = termio_core::debug_span!("render", cols = buffer.cols(), rows = buffer.rows());
        let _guard = span.enter();
        let started = Instant::now();

        self.frame.clear();
        let mut stats = RenderStats::default();
        for row in 0..buffer.rows() {
            if buffer.is_row_dirty(row) {
                self.render_row(buffer, row, &mut stats)?;
                buffer.clear_row_dirty(row);
            }
        }

        if !self.frame.is_empty() {
            let mut counter = CountingWriter::new(&mut *w);
            let written = counter.write_all(&self.frame).and_then(|()| counter.flush());
            stats.bytes_emitted = counter.bytes_written();
            stats.write_calls = counter.write_calls();
            if let Err(err) = written {
                self.last_attribute = None;
                return Err(err);
            }
        }

        stats.duration = started.elapsed();
        stats.log();
        Ok(stats)
    }

    fn render_row(
        &mut self,
        buffer: &mut ScreenBuffer,
        row: u16,
        stats: &mut RenderStats,
    ) -> io::Result<()> {
        let frame = &mut self.frame;
        let cells = buffer.row_mut(row);
        let mut in_run = false;
        // The previous emitted glyph was wide, so the terminal cursor has
        // already stepped over the continuation column.
        let mut after_wide = false;

        for col in 0..cells.len() {
            let is_last = col + 1 == cells.len();
            let cell = &mut cells[col];
            if !cell.dirty {
                in_run = false;
                after_wide = false;
                continue;
            }
            cell.dirty = false;

            if cell.continuation {
                in_run &= after_wide;
                after_wide = false;
                continue;
            }

            if !in_run {
                ansi::cup(frame, row, col as u16)?;
                stats.run_count += 1;
                in_run = true;
            }
            if self.last_attribute != Some(cell.attribute) {
                let attr = cell.attribute;
                ansi::sgr_colors(frame, attr.foreground, attr.background, self.mode)?;
                self.last_attribute = Some(attr);
                stats.attribute_changes += 1;
            }

            if cell.width() == 2 && is_last {
                let mut buf = [0u8; 4];
                frame.extend_from_slice(REPLACEMENT_CHAR.encode_utf8(&mut buf).as_bytes());
                after_wide = false;
            } else {
                cell.encode_into(frame);
                after_wide = cell.width() == 2;
            }
            stats.cells_emitted += 1;
        }
        Ok(())
    }

    /// Position the terminal cursor at the buffer's logical cursor.
    ///
    /// Returns `false` (and writes nothing) when the logical cursor lies
    /// outside the buffer.
    pub fn place_cursor<W: Write>(&mut self, buffer: &ScreenBuffer, w: &mut W) -> io::Result<bool> {
        let cursor = buffer.cursor();
        if !buffer.bounds().contains(cursor.x, cursor.y) {
            return Ok(false);
        }
        let mut seq = Vec::with_capacity(12);
        ansi::cup(&mut seq, cursor.y, cursor.x)?;
        w.write_all(&seq)?;
        w.flush()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeTable;
    use crate::color::{Ansi16, Color};

    fn render(renderer: &mut ScreenRenderer, buffer: &mut ScreenBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        renderer.render(buffer, &mut out).unwrap();
        out
    }

    fn settled(cols: u16, rows: u16) -> (ScreenRenderer, ScreenBuffer) {
        let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
        let mut buffer = ScreenBuffer::new(cols, rows);
        render(&mut renderer, &mut buffer);
        (renderer, buffer)
    }

    #[test]
    fn clean_buffer_renders_nothing() {
        let (mut renderer, mut buffer) = settled(10, 3);
        assert!(render(&mut renderer, &mut buffer).is_empty());
    }

    #[test]
    fn first_frame_paints_every_row() {
        let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
        let mut buffer = ScreenBuffer::new(3, 2);
        let mut out = Vec::new();
        let stats = renderer.render(&mut buffer, &mut out).unwrap();
        assert_eq!(out, b"\x1b[1;1H\x1b[39;49m   \x1b[2;1H   ");
        assert_eq!(stats.run_count, 2);
        assert_eq!(stats.attribute_changes, 1);
        assert_eq!(stats.cells_emitted, 6);
        assert_eq!(stats.bytes_emitted, out.len() as u64);
        assert!(!buffer.has_dirty());
    }

    #[test]
    fn single_dirty_cell_is_one_cup_and_one_char() {
        let (mut renderer, mut buffer) = settled(10, 3);
        buffer.move_to(4, 1);
        buffer.add_rune('x');
        assert_eq!(render(&mut renderer, &mut buffer), b"\x1b[2;5Hx");
        assert!(render(&mut renderer, &mut buffer).is_empty());
    }

    #[test]
    fn attribute_change_emitted_once_per_change() {
        let (mut renderer, mut buffer) = settled(10, 2);
        let mut table = AttributeTable::new();
        let red = table.make(Ansi16::Red.into(), Color::Default);
        buffer.set_attribute(red);
        buffer.add_str("ab");
        buffer.move_to(0, 1);
        buffer.add_str("c");
        let out = render(&mut renderer, &mut buffer);
        assert_eq!(out, b"\x1b[1;1H\x1b[31;49mab\x1b[2;1Hc");
    }

    #[test]
    fn last_attribute_persists_across_frames() {
        let (mut renderer, mut buffer) = settled(10, 1);
        buffer.add_str("a");
        // Default attribute was already sent by the first frame.
        assert_eq!(render(&mut renderer, &mut buffer), b"\x1b[1;1Ha");
        renderer.invalidate();
        buffer.move_to(1, 0);
        buffer.add_str("b");
        assert_eq!(render(&mut renderer, &mut buffer), b"\x1b[1;2H\x1b[39;49mb");
    }

    #[test]
    fn gaps_split_runs() {
        let (mut renderer, mut buffer) = settled(10, 1);
        buffer.add_str("a");
        buffer.move_to(5, 0);
        buffer.add_str("b");
        assert_eq!(render(&mut renderer, &mut buffer), b"\x1b[1;1Ha\x1b[1;6Hb");
    }

    #[test]
    fn wide_glyph_skips_continuation_without_new_cup() {
        let (mut renderer, mut buffer) = settled(10, 1);
        buffer.add_str("中x");
        assert_eq!(
            render(&mut renderer, &mut buffer),
            "\x1b[1;1H中x".as_bytes()
        );
    }

    #[test]
    fn wide_glyph_in_last_column_never_splits() {
        let (mut renderer, mut buffer) = settled(4, 1);
        buffer.move_to(3, 0);
        buffer.add_rune('中');
        let out = render(&mut renderer, &mut buffer);
        assert_eq!(out, "\x1b[1;4H\u{FFFD}".as_bytes());
    }

    #[test]
    fn combining_marks_follow_base() {
        let (mut renderer, mut buffer) = settled(4, 1);
        buffer.add_str("e\u{0301}");
        assert_eq!(
            render(&mut renderer, &mut buffer),
            "\x1b[1;1He\u{0301}".as_bytes()
        );
    }

    #[test]
    fn truecolor_attribute() {
        let mut renderer = ScreenRenderer::new(ColorMode::TrueColor);
        let mut buffer = ScreenBuffer::new(1, 1);
        let mut table = AttributeTable::new();
        buffer.set_attribute(table.make(Color::rgb(1, 2, 3), Color::Default));
        buffer.add_rune('z');
        let out = render(&mut renderer, &mut buffer);
        assert_eq!(out, b"\x1b[1;1H\x1b[38;2;1;2;3;49mz");
    }

    #[test]
    fn place_cursor_inside_and_outside() {
        let (mut renderer, mut buffer) = settled(10, 2);
        buffer.move_to(2, 1);
        let mut out = Vec::new();
        assert!(renderer.place_cursor(&buffer, &mut out).unwrap());
        assert_eq!(out, b"\x1b[2;3H");

        buffer.move_to(10, 0);
        out.clear();
        assert!(!renderer.place_cursor(&buffer, &mut out).unwrap());
        assert!(out.is_empty());
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_forgets_attribute() {
        let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
        let mut buffer = ScreenBuffer::new(2, 1);
        assert!(renderer.render(&mut buffer, &mut FailingWriter).is_err());
        buffer.mark_all_dirty();
        let out = render(&mut renderer, &mut buffer);
        assert!(out.starts_with(b"\x1b[1;1H\x1b[39;49m"));
    }
}
