#![forbid(unsafe_code)]

//! Colors, color modes, and palette downgrade.

use termio_core::terminal_capabilities::TerminalCapabilities;

/// How many colors the terminal can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    /// Standard 16 ANSI colors.
    #[default]
    Ansi16,
    /// Extended 256-color palette.
    Ansi256,
    /// Full 24-bit RGB.
    TrueColor,
}

impl ColorMode {
    #[must_use]
    pub const fn from_capabilities(caps: &TerminalCapabilities) -> Self {
        if caps.true_color {
            Self::TrueColor
        } else if caps.colors_256 {
            Self::Ansi256
        } else {
            Self::Ansi16
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// ANSI 16-color indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Ansi16 {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
    BrightBlack = 8,
    BrightRed = 9,
    BrightGreen = 10,
    BrightYellow = 11,
    BrightBlue = 12,
    BrightMagenta = 13,
    BrightCyan = 14,
    BrightWhite = 15,
}

impl Ansi16 {
    const ALL: [Self; 16] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
        Self::BrightBlack,
        Self::BrightRed,
        Self::BrightGreen,
        Self::BrightYellow,
        Self::BrightBlue,
        Self::BrightMagenta,
        Self::BrightCyan,
        Self::BrightWhite,
    ];

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }
}

/// A color as requested by the caller.
///
/// `Default` leaves the terminal's own foreground or background in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Default,
    Ansi16(Ansi16),
    Ansi256(u8),
    Rgb(Rgb),
}

impl Color {
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Rgb(Rgb::new(r, g, b))
    }

    /// Reduce this color to something `mode` can display.
    #[must_use]
    pub fn downgrade(self, mode: ColorMode) -> Self {
        match (mode, self) {
            (ColorMode::TrueColor, _) | (_, Self::Default | Self::Ansi16(_)) => self,
            (ColorMode::Ansi256, Self::Rgb(rgb)) => Self::Ansi256(rgb_to_256(rgb)),
            (ColorMode::Ansi256, Self::Ansi256(_)) => self,
            (ColorMode::Ansi16, Self::Rgb(rgb)) => Self::Ansi16(rgb_to_ansi16(rgb)),
            (ColorMode::Ansi16, Self::Ansi256(index)) => {
                Self::Ansi16(rgb_to_ansi16(ansi256_to_rgb(index)))
            }
        }
    }
}

impl From<Ansi16> for Color {
    fn from(color: Ansi16) -> Self {
        Self::Ansi16(color)
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Self::Rgb(color)
    }
}

const ANSI16_PALETTE: [Rgb; 16] = [
    Rgb::new(0, 0, 0),
    Rgb::new(205, 0, 0),
    Rgb::new(0, 205, 0),
    Rgb::new(205, 205, 0),
    Rgb::new(0, 0, 238),
    Rgb::new(205, 0, 205),
    Rgb::new(0, 205, 205),
    Rgb::new(229, 229, 229),
    Rgb::new(127, 127, 127),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(92, 92, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(0, 255, 255),
    Rgb::new(255, 255, 255),
];

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

/// Nearest index in the 256-color palette.
#[must_use]
pub fn rgb_to_256(rgb: Rgb) -> u8 {
    let Rgb { r, g, b } = rgb;
    if r == g && g == b {
        return match r {
            0..=7 => 16,
            249..=255 => 231,
            _ => 232 + ((r - 8) / 10).min(23),
        };
    }
    16 + 36 * cube_index(r) + 6 * cube_index(g) + cube_index(b)
}

/// Cube levels are uneven; split on the midpoints between them.
fn cube_index(v: u8) -> u8 {
    match v {
        0..=47 => 0,
        48..=114 => 1,
        _ => (v - 35) / 40,
    }
}

#[must_use]
pub fn ansi256_to_rgb(index: u8) -> Rgb {
    match index {
        0..=15 => ANSI16_PALETTE[usize::from(index)],
        232..=255 => {
            let gray = 8 + 10 * (index - 232);
            Rgb::new(gray, gray, gray)
        }
        _ => {
            let idx = index - 16;
            Rgb::new(
                CUBE_LEVELS[usize::from(idx / 36)],
                CUBE_LEVELS[usize::from((idx / 6) % 6)],
                CUBE_LEVELS[usize::from(idx % 6)],
            )
        }
    }
}

/// Nearest of the 16 base colors by luma-weighted distance.
#[must_use]
pub fn rgb_to_ansi16(rgb: Rgb) -> Ansi16 {
    Ansi16::ALL
        .into_iter()
        .min_by_key(|c| weighted_distance(rgb, ANSI16_PALETTE[usize::from(c.as_u8())]))
        .unwrap_or(Ansi16::Black)
}

fn weighted_distance(a: Rgb, b: Rgb) -> u64 {
    let d = |x: u8, y: u8| {
        let v = i64::from(x) - i64::from(y);
        (v * v) as u64
    };
    2126 * d(a.r, b.r) + 7152 * d(a.g, b.g) + 722 * d(a.b, b.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_from_capabilities() {
        let mut caps = TerminalCapabilities::basic();
        assert_eq!(ColorMode::from_capabilities(&caps), ColorMode::Ansi16);
        caps.colors_256 = true;
        assert_eq!(ColorMode::from_capabilities(&caps), ColorMode::Ansi256);
        caps.true_color = true;
        assert_eq!(ColorMode::from_capabilities(&caps), ColorMode::TrueColor);
    }

    #[test]
    fn truecolor_keeps_rgb() {
        let c = Color::rgb(12, 34, 56);
        assert_eq!(c.downgrade(ColorMode::TrueColor), c);
    }

    #[test]
    fn rgb_to_256_grays_and_cube() {
        assert_eq!(rgb_to_256(Rgb::new(0, 0, 0)), 16);
        assert_eq!(rgb_to_256(Rgb::new(255, 255, 255)), 231);
        assert_eq!(rgb_to_256(Rgb::new(128, 128, 128)), 244);
        assert_eq!(rgb_to_256(Rgb::new(255, 0, 0)), 196);
    }

    #[test]
    fn ansi256_roundtrips_cube_corners() {
        assert_eq!(ansi256_to_rgb(196), Rgb::new(255, 0, 0));
        assert_eq!(ansi256_to_rgb(232), Rgb::new(8, 8, 8));
        assert_eq!(ansi256_to_rgb(9), Rgb::new(255, 0, 0));
    }

    #[test]
    fn downgrade_to_16() {
        assert_eq!(
            Color::rgb(250, 5, 5).downgrade(ColorMode::Ansi16),
            Color::Ansi16(Ansi16::BrightRed)
        );
        assert_eq!(
            Color::Ansi256(21).downgrade(ColorMode::Ansi16),
            Color::Ansi16(Ansi16::Blue)
        );
        assert_eq!(Color::Default.downgrade(ColorMode::Ansi16), Color::Default);
    }

    #[test]
    fn ansi16_from_u8_bounds() {
        assert_eq!(Ansi16::from_u8(15), Some(Ansi16::BrightWhite));
        assert_eq!(Ansi16::from_u8(16), None);
    }
}
