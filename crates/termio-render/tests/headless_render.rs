//! Render scenarios against an in-memory terminal sink.

use termio_render::attribute::AttributeTable;
use termio_render::buffer::ScreenBuffer;
use termio_render::color::{Ansi16, Color, ColorMode};
use termio_render::renderer::ScreenRenderer;

fn frame(renderer: &mut ScreenRenderer, buffer: &mut ScreenBuffer) -> Vec<u8> {
    let mut out = Vec::new();
    renderer.render(buffer, &mut out).expect("render to Vec");
    renderer.place_cursor(buffer, &mut out).expect("cursor to Vec");
    out
}

#[test]
fn hi_at_origin_then_idle_refresh() {
    let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
    let mut buffer = ScreenBuffer::new(80, 24);
    // Initial full paint.
    let _ = frame(&mut renderer, &mut buffer);

    buffer.move_to(0, 0);
    buffer.add_str("Hi");
    let first = frame(&mut renderer, &mut buffer);
    assert_eq!(first, b"\x1b[1;1HHi\x1b[1;3H");

    let second = frame(&mut renderer, &mut buffer);
    assert_eq!(second, b"\x1b[1;3H");
}

#[test]
fn full_first_frame_is_bounded() {
    let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
    let mut buffer = ScreenBuffer::new(80, 24);
    let mut out = Vec::new();
    let stats = renderer.render(&mut buffer, &mut out).unwrap();
    assert_eq!(stats.run_count, 24);
    assert_eq!(stats.cells_emitted, 80 * 24);
    assert_eq!(stats.attribute_changes, 1);
    assert!(stats.bytes_per_cell() < 1.2);
}

#[test]
fn resize_forces_full_repaint() {
    let mut renderer = ScreenRenderer::new(ColorMode::Ansi16);
    let mut buffer = ScreenBuffer::new(10, 2);
    let _ = frame(&mut renderer, &mut buffer);
    buffer.resize(12, 3);
    let mut out = Vec::new();
    let stats = renderer.render(&mut buffer, &mut out).unwrap();
    assert_eq!(stats.cells_emitted, 36);
}

#[test]
fn status_line_in_color() {
    let mut table = AttributeTable::new();
    let status = table.make(Ansi16::Black.into(), Ansi16::Cyan.into());
    let mut renderer = ScreenRenderer::new(ColorMode::Ansi256);
    let mut buffer = ScreenBuffer::new(20, 5);
    let _ = frame(&mut renderer, &mut buffer);

    buffer.set_attribute(status);
    buffer.move_to(0, 4);
    buffer.add_str("READY");
    buffer.set_attribute(table.make(Color::Default, Color::Default));
    buffer.add_str(" ok");

    let out = frame(&mut renderer, &mut buffer);
    assert_eq!(out, b"\x1b[5;1H\x1b[30;46mREADY\x1b[39;49m ok\x1b[5;9H");
}
