#![forbid(unsafe_code)]

//! Outgoing escape sequence encoding.
//!
//! Pure byte generation: nothing here tracks terminal state. Callers decide
//! when a sequence is needed.
//!
//! | Category | Sequence                          | Description                  |
//! |----------|-----------------------------------|------------------------------|
//! | CSI      | `ESC [ row ; col H`               | CUP (cursor position)        |
//! | CSI      | `ESC [ fg ; bg m`                 | SGR colors (16/256/RGB)      |
//! | CSI      | `ESC [ ? 25 h/l`                  | Show / hide cursor           |
//! | CSI      | `ESC [ n SP q`                    | DECSCUSR (cursor shape)      |
//! | CSI      | `ESC [ 2 J`                       | Erase display                |
//! | CSI      | `ESC [ ? 1049 h/l`                | Alternate screen             |
//! | CSI      | `ESC [ ? 1000;1002;1003;1006 h/l` | SGR mouse tracking           |
//! | CSI      | `ESC [ ? 1004 h/l`                | Focus reporting              |
//! | CSI      | `ESC [ 6 n`                       | Device status (cursor) query |

use std::io::{self, Write};

use crate::color::{Color, ColorMode};

pub const SGR_RESET: &[u8] = b"\x1b[0m";
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
pub const ERASE_DISPLAY: &[u8] = b"\x1b[2J";
pub const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h";
pub const ALT_SCREEN_LEAVE: &[u8] = b"\x1b[?1049l";
pub const MOUSE_ENABLE: &[u8] = b"\x1b[?1000;1002;1003;1006h";
pub const MOUSE_DISABLE: &[u8] = b"\x1b[?1000;1002;1003;1006l";
pub const FOCUS_ENABLE: &[u8] = b"\x1b[?1004h";
pub const FOCUS_DISABLE: &[u8] = b"\x1b[?1004l";
/// Device status report request; answered with `CSI row ; col R`.
pub const CURSOR_POSITION_QUERY: &[u8] = b"\x1b[6n";
/// Terminator of the cursor position report.
pub const CURSOR_POSITION_TERMINATOR: &[u8] = b"R";

#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

/// CUP: `CSI row ; col H`. Inputs are 0-indexed.
pub fn cup<W: Write>(w: &mut W, row: u16, col: u16) -> io::Result<()> {
    write!(
        w,
        "\x1b[{};{}H",
        u32::from(row) + 1,
        u32::from(col) + 1
    )
}

#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_HIDE)
}

#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_SHOW)
}

/// DECSCUSR: `CSI n SP q`. 0 restores the terminal's default shape.
pub fn cursor_shape<W: Write>(w: &mut W, shape: u8) -> io::Result<()> {
    write!(w, "\x1b[{shape} q")
}

#[inline]
pub fn erase_display<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(ERASE_DISPLAY)
}

#[inline]
pub fn alt_screen_enter<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(ALT_SCREEN_ENTER)
}

#[inline]
pub fn alt_screen_leave<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(ALT_SCREEN_LEAVE)
}

#[inline]
pub fn mouse_enable<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MOUSE_ENABLE)
}

#[inline]
pub fn mouse_disable<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(MOUSE_DISABLE)
}

#[inline]
pub fn focus_enable<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(FOCUS_ENABLE)
}

#[inline]
pub fn focus_disable<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(FOCUS_DISABLE)
}

#[derive(Clone, Copy)]
enum Layer {
    Foreground,
    Background,
}

/// Append the SGR parameters for one color, without `CSI` or `m`.
fn push_color_params(out: &mut Vec<u8>, color: Color, layer: Layer) -> io::Result<()> {
    let (base, bright, extended, default) = match layer {
        Layer::Foreground => (30u8, 90u8, 38u8, 39u8),
        Layer::Background => (40, 100, 48, 49),
    };
    match color {
        Color::Default => write!(out, "{default}"),
        Color::Ansi16(c) => {
            let index = c.as_u8();
            let code = if index < 8 { base + index } else { bright + index - 8 };
            write!(out, "{code}")
        }
        Color::Ansi256(index) => write!(out, "{extended};5;{index}"),
        Color::Rgb(rgb) => write!(out, "{extended};2;{};{};{}", rgb.r, rgb.g, rgb.b),
    }
}

/// Set both colors in one SGR sequence, after reducing them to `mode`.
pub fn sgr_colors<W: Write>(w: &mut W, fg: Color, bg: Color, mode: ColorMode) -> io::Result<()> {
    let mut seq = Vec::with_capacity(40);
    seq.extend_from_slice(b"\x1b[");
    push_color_params(&mut seq, fg.downgrade(mode), Layer::Foreground)?;
    seq.push(b';');
    push_color_params(&mut seq, bg.downgrade(mode), Layer::Background)?;
    seq.push(b'm');
    w.write_all(&seq)
}
