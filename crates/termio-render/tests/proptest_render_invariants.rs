//! Property-based invariants for the buffer and renderer.
//!
//! 1. After a render, no cell is dirty.
//! 2. A second render with no mutation writes nothing.
//! 3. Arbitrary text never leaves a continuation cell without its wide head.
//! 4. Writes never touch cells outside the clip rectangle.

use proptest::prelude::*;
use termio_core::geometry::Rect;
use termio_render::buffer::ScreenBuffer;
use termio_render::color::ColorMode;
use termio_render::renderer::ScreenRenderer;

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just('a'),
            Just(' '),
            Just('中'),
            Just('\u{0301}'),
            Just('\u{1b}'),
            Just('é'),
            any::<char>(),
        ],
        0..64,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn write_ops() -> impl Strategy<Value = Vec<(u16, u16, String)>> {
    prop::collection::vec((0u16..24, 0u16..8, text_strategy()), 0..12)
}

proptest! {
    #[test]
    fn render_clears_dirty_and_settles(ops in write_ops()) {
        let mut buffer = ScreenBuffer::new(20, 6);
        let mut renderer = ScreenRenderer::new(ColorMode::TrueColor);
        for (col, row, text) in &ops {
            buffer.move_to(*col, *row);
            buffer.add_str(text);
        }
        let mut out = Vec::new();
        renderer.render(&mut buffer, &mut out).unwrap();
        prop_assert_eq!(buffer.dirty_cell_count(), 0);
        prop_assert!(!buffer.has_dirty());

        let mut again = Vec::new();
        renderer.render(&mut buffer, &mut again).unwrap();
        prop_assert!(again.is_empty());
    }

    #[test]
    fn continuations_always_have_heads(ops in write_ops()) {
        let mut buffer = ScreenBuffer::new(20, 6);
        for (col, row, text) in &ops {
            buffer.move_to(*col, *row);
            buffer.add_str(text);
        }
        for row in 0..buffer.rows() {
            let cells = buffer.row(row);
            for (col, cell) in cells.iter().enumerate() {
                if cell.continuation {
                    prop_assert!(col > 0, "continuation in column 0");
                    prop_assert_eq!(cells[col - 1].width(), 2);
                }
                if cell.width() == 2 {
                    prop_assert!(col + 1 < cells.len(), "wide glyph in last column");
                    prop_assert!(cells[col + 1].continuation);
                }
            }
        }
    }

    #[test]
    fn clip_is_respected(
        ops in write_ops(),
        clip in (0u16..20, 0u16..6, 0u16..20, 0u16..6).prop_map(|(x, y, w, h)| Rect::new(x, y, w, h)),
    ) {
        let mut buffer = ScreenBuffer::new(20, 6);
        let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
        renderer.render(&mut buffer, &mut Vec::new()).unwrap();
        buffer.set_clip(clip);
        for (col, row, text) in &ops {
            buffer.move_to(*col, *row);
            buffer.add_str(text);
        }
        let clip = buffer.clip();
        for row in 0..buffer.rows() {
            for (col, cell) in buffer.row(row).iter().enumerate() {
                if cell.dirty && !cell.continuation {
                    prop_assert!(clip.contains(col as u16, row), "dirty cell ({col},{row}) outside {clip:?}");
                }
            }
        }
    }
}
