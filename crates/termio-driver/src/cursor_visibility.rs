#![forbid(unsafe_code)]

//! Cursor visibility and shape.
//!
//! | Visibility     | Sequence                  |
//! |----------------|---------------------------|
//! | `Invisible`    | `CSI ? 25 l`              |
//! | `Default`      | `CSI 0 SP q`, `CSI ? 25 h` |
//! | `Box`          | `CSI 1 SP q`, `CSI ? 25 h` |
//! | `BoxFix`       | `CSI 2 SP q`, `CSI ? 25 h` |
//! | `Underline`    | `CSI 3 SP q`, `CSI ? 25 h` |
//! | `UnderlineFix` | `CSI 4 SP q`, `CSI ? 25 h` |
//! | `Vertical`     | `CSI 5 SP q`, `CSI ? 25 h` |
//! | `VerticalFix`  | `CSI 6 SP q`, `CSI ? 25 h` |
//!
//! The `Fix` variants are steady; the others blink.

use std::io::{self, Write};

use termio_render::ansi;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorVisibility {
    /// The terminal's own default shape.
    #[default]
    Default,
    Invisible,
    Underline,
    UnderlineFix,
    Vertical,
    VerticalFix,
    Box,
    BoxFix,
}

impl CursorVisibility {
    /// DECSCUSR parameter, `None` for [`Invisible`](Self::Invisible).
    #[must_use]
    pub const fn shape(self) -> Option<u8> {
        match self {
            Self::Default => Some(0),
            Self::Invisible => None,
            Self::Box => Some(1),
            Self::BoxFix => Some(2),
            Self::Underline => Some(3),
            Self::UnderlineFix => Some(4),
            Self::Vertical => Some(5),
            Self::VerticalFix => Some(6),
        }
    }

    #[must_use]
    pub const fn is_visible(self) -> bool {
        !matches!(self, Self::Invisible)
    }

    /// Write the sequence that makes the terminal show `self`.
    pub fn write_to<W: Write>(self, w: &mut W) -> io::Result<()> {
        match self.shape() {
            Some(shape) => {
                ansi::cursor_shape(w, shape)?;
                ansi::cursor_show(w)
            }
            None => ansi::cursor_hide(w),
        }
    }
}

/// Staged cursor visibility.
///
/// The terminal's starting visibility is learned lazily. Requests made
/// before it is known are parked in `pending` and applied once, when
/// [`capture_initial`](Self::capture_initial) runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorVisibilityState {
    initial: Option<CursorVisibility>,
    current: Option<CursorVisibility>,
    pending: Option<CursorVisibility>,
}

impl CursorVisibilityState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial: None,
            current: None,
            pending: None,
        }
    }

    #[must_use]
    pub const fn initial(&self) -> Option<CursorVisibility> {
        self.initial
    }

    #[must_use]
    pub const fn current(&self) -> Option<CursorVisibility> {
        self.current
    }

    #[must_use]
    pub const fn pending(&self) -> Option<CursorVisibility> {
        self.pending
    }

    /// Ask for `visibility`. Returns `true` if it can be applied now;
    /// otherwise it is parked until the initial value is captured.
    pub fn request(&mut self, visibility: CursorVisibility) -> bool {
        if self.initial.is_none() {
            self.pending = Some(visibility);
            return false;
        }
        self.current = Some(visibility);
        true
    }

    /// Record the terminal's starting visibility. Only the first call has
    /// any effect; it returns the parked request that must now be applied.
    ///
    /// Terminals offer no portable way to read the cursor shape back, so
    /// the driver passes [`CursorVisibility::Default`] here. A shell that
    /// had set its own shape gets the terminal default back on shutdown.
    pub fn capture_initial(&mut self, visibility: CursorVisibility) -> Option<CursorVisibility> {
        if self.initial.is_some() {
            return None;
        }
        self.initial = Some(visibility);
        self.current = Some(visibility);
        let pending = self.pending.take()?;
        self.current = Some(pending);
        Some(pending)
    }

    /// The visibility to restore on shutdown, if it ever changed.
    #[must_use]
    pub fn restore_target(&self) -> Option<CursorVisibility> {
        let initial = self.initial?;
        (self.current != Some(initial)).then_some(initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(v: CursorVisibility) -> Vec<u8> {
        let mut out = Vec::new();
        v.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn sequences_match_decscusr() {
        assert_eq!(bytes(CursorVisibility::Invisible), b"\x1b[?25l");
        assert_eq!(bytes(CursorVisibility::BoxFix), b"\x1b[2 q\x1b[?25h");
        assert_eq!(bytes(CursorVisibility::Default), b"\x1b[0 q\x1b[?25h");
        assert_eq!(bytes(CursorVisibility::VerticalFix), b"\x1b[6 q\x1b[?25h");
    }

    #[test]
    fn request_before_capture_is_parked() {
        let mut state = CursorVisibilityState::new();
        assert!(!state.request(CursorVisibility::Invisible));
        assert_eq!(state.pending(), Some(CursorVisibility::Invisible));
        assert_eq!(state.current(), None);

        assert_eq!(
            state.capture_initial(CursorVisibility::Default),
            Some(CursorVisibility::Invisible)
        );
        assert_eq!(state.current(), Some(CursorVisibility::Invisible));
        assert_eq!(state.pending(), None);

        // Applied exactly once.
        assert_eq!(state.capture_initial(CursorVisibility::Box), None);
        assert_eq!(state.initial(), Some(CursorVisibility::Default));
    }

    #[test]
    fn latest_parked_request_wins() {
        let mut state = CursorVisibilityState::new();
        state.request(CursorVisibility::Box);
        state.request(CursorVisibility::Underline);
        assert_eq!(
            state.capture_initial(CursorVisibility::Default),
            Some(CursorVisibility::Underline)
        );
    }

    #[test]
    fn request_after_capture_applies() {
        let mut state = CursorVisibilityState::new();
        assert_eq!(state.capture_initial(CursorVisibility::Default), None);
        assert!(state.request(CursorVisibility::VerticalFix));
        assert_eq!(state.current(), Some(CursorVisibility::VerticalFix));
    }

    #[test]
    fn restore_only_when_changed() {
        let mut state = CursorVisibilityState::new();
        assert_eq!(state.restore_target(), None);
        state.capture_initial(CursorVisibility::Default);
        assert_eq!(state.restore_target(), None);
        state.request(CursorVisibility::Invisible);
        assert_eq!(state.restore_target(), Some(CursorVisibility::Default));
    }
}
