#![forbid(unsafe_code)]

//! Unified input event types.
//!
//! Every platform source (structured console records, ANSI byte streams,
//! line-buffered key reads) is decoded into [`InputEvent`] values. All types
//! derive `Clone`, `PartialEq`, and `Eq` for use in tests and pattern
//! matching.
//!
//! # Design Notes
//!
//! - Mouse coordinates are 0-indexed.
//! - Key events arrive as `KeyDown`, `KeyPress`, `KeyUp`. Sources that cannot
//!   tell down from up synthesize the whole triple.
//! - [`MouseFlags`] packs five gesture bits per button plus position, wheel,
//!   and modifier bits.

use bitflags::bitflags;

/// Unified input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A key went down.
    KeyDown(KeyEvent),

    /// A key went up.
    KeyUp(KeyEvent),

    /// A keystroke to be processed (follows every `KeyDown`).
    KeyPress(KeyEvent),

    /// A classified mouse event.
    Mouse(MouseEvent),

    /// Terminal was resized.
    Resize {
        /// New width in columns.
        cols: u16,
        /// New height in rows.
        rows: u16,
    },

    /// Focus gained (`true`) or lost (`false`).
    Focus(bool),
}

impl InputEvent {
    /// Returns the key event carried by any of the three key variants.
    #[must_use]
    pub fn key(&self) -> Option<&KeyEvent> {
        match self {
            Self::KeyDown(k) | Self::KeyUp(k) | Self::KeyPress(k) => Some(k),
            _ => None,
        }
    }

    #[must_use]
    pub fn mouse(&self) -> Option<&MouseEvent> {
        match self {
            Self::Mouse(m) => Some(m),
            _ => None,
        }
    }
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// The normalized key code.
    pub code: KeyCode,

    /// Modifier state accumulated while the physical key state persists.
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    /// Create a new key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::empty(),
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: KeyModifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// The character this key produces, if any.
    #[must_use]
    pub const fn char(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) => Some(c),
            KeyCode::Enter => Some('\r'),
            KeyCode::Tab => Some('\t'),
            KeyCode::Escape => Some('\x1b'),
            KeyCode::Backspace => Some('\x7f'),
            _ => None,
        }
    }

    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(KeyModifiers::CTRL)
    }

    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(KeyModifiers::ALT)
    }

    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(KeyModifiers::SHIFT)
    }
}

/// Normalized key identity, independent of the platform that produced it.
///
/// Control letters decode to `Char` with [`KeyModifiers::CTRL`]; shifted
/// letters keep their case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    /// Tab with shift, as ANSI terminals send it (`CSI Z`).
    BackTab,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// F1 through F24.
    F(u8),
    /// NUL from the terminal (ctrl+space, ctrl+@), or a simulated key that
    /// takes its identity from the accompanying character.
    Null,
    /// Shift, ctrl, or alt pressed by itself.
    Modifier(ModifierKey),
    /// Console virtual-key code with no mapping.
    Unknown(u16),
}

/// Modifier keys reported on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    Shift,
    Control,
    Alt,
    /// A lock key or a modifier combination with no single owner.
    Other,
}

bitflags! {
    /// Modifier set carried by key events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        /// Shift key.
        const SHIFT      = 0b0000_0001;
        /// Alt/Option key.
        const ALT        = 0b0000_0010;
        /// Control key.
        const CTRL       = 0b0000_0100;
        /// Caps lock toggled on.
        const CAPSLOCK   = 0b0000_1000;
        /// Num lock toggled on.
        const NUMLOCK    = 0b0001_0000;
        /// Scroll lock toggled on.
        const SCROLLLOCK = 0b0010_0000;
    }
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left button.
    Button1 = 0,
    /// Middle button.
    Button2 = 1,
    /// Right button.
    Button3 = 2,
    /// Fourth button.
    Button4 = 3,
}

/// Per-button gesture kinds encoded in [`MouseFlags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Pressed = 0,
    Released = 1,
    Clicked = 2,
    DoubleClicked = 3,
    TripleClicked = 4,
}

bitflags! {
    /// Flags carried by a [`MouseEvent`].
    ///
    /// Bits `0..20` hold one gesture bit per (button, [`Gesture`]) pair,
    /// laid out as `button * 5 + gesture`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseFlags: u32 {
        const BUTTON1_PRESSED        = 1 << 0;
        const BUTTON1_RELEASED       = 1 << 1;
        const BUTTON1_CLICKED        = 1 << 2;
        const BUTTON1_DOUBLE_CLICKED = 1 << 3;
        const BUTTON1_TRIPLE_CLICKED = 1 << 4;
        const BUTTON2_PRESSED        = 1 << 5;
        const BUTTON2_RELEASED       = 1 << 6;
        const BUTTON2_CLICKED        = 1 << 7;
        const BUTTON2_DOUBLE_CLICKED = 1 << 8;
        const BUTTON2_TRIPLE_CLICKED = 1 << 9;
        const BUTTON3_PRESSED        = 1 << 10;
        const BUTTON3_RELEASED       = 1 << 11;
        const BUTTON3_CLICKED        = 1 << 12;
        const BUTTON3_DOUBLE_CLICKED = 1 << 13;
        const BUTTON3_TRIPLE_CLICKED = 1 << 14;
        const BUTTON4_PRESSED        = 1 << 15;
        const BUTTON4_RELEASED       = 1 << 16;
        const BUTTON4_CLICKED        = 1 << 17;
        const BUTTON4_DOUBLE_CLICKED = 1 << 18;
        const BUTTON4_TRIPLE_CLICKED = 1 << 19;
        /// Pointer position report (move or drag).
        const REPORT_POSITION        = 1 << 20;
        const SHIFT                  = 1 << 21;
        const CTRL                   = 1 << 22;
        const ALT                    = 1 << 23;
        const WHEELED_UP             = 1 << 24;
        const WHEELED_DOWN           = 1 << 25;
        const WHEELED_LEFT           = 1 << 26;
        const WHEELED_RIGHT          = 1 << 27;
    }
}

impl MouseFlags {
    /// The flag for `gesture` on `button`.
    #[must_use]
    pub const fn gesture(button: MouseButton, gesture: Gesture) -> Self {
        Self::from_bits_retain(1 << (button as u32 * 5 + gesture as u32))
    }

    /// Flags with the modifier and position bits stripped.
    #[must_use]
    pub const fn without_modifiers(self) -> Self {
        self.difference(Self::SHIFT.union(Self::CTRL).union(Self::ALT))
    }
}

/// A classified mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseEvent {
    /// Column (0-indexed).
    pub x: u16,
    /// Row (0-indexed).
    pub y: u16,
    /// Gesture, wheel, position, and modifier bits.
    pub flags: MouseFlags,
}

impl MouseEvent {
    #[must_use]
    pub const fn new(x: u16, y: u16, flags: MouseFlags) -> Self {
        Self { x, y, flags }
    }

    /// Check whether all of `flags` are set.
    #[must_use]
    pub const fn has(&self, flags: MouseFlags) -> bool {
        self.flags.contains(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_flags_match_named_constants() {
        assert_eq!(
            MouseFlags::gesture(MouseButton::Button1, Gesture::Clicked),
            MouseFlags::BUTTON1_CLICKED
        );
        assert_eq!(
            MouseFlags::gesture(MouseButton::Button3, Gesture::Pressed),
            MouseFlags::BUTTON3_PRESSED
        );
        assert_eq!(
            MouseFlags::gesture(MouseButton::Button4, Gesture::TripleClicked),
            MouseFlags::BUTTON4_TRIPLE_CLICKED
        );
    }

    #[test]
    fn without_modifiers_keeps_gesture() {
        let flags = MouseFlags::BUTTON2_PRESSED | MouseFlags::SHIFT | MouseFlags::ALT;
        assert_eq!(flags.without_modifiers(), MouseFlags::BUTTON2_PRESSED);
    }

    #[test]
    fn key_event_char_helpers() {
        let event = KeyEvent::new(KeyCode::Char('q')).with_modifiers(KeyModifiers::CTRL);
        assert!(event.is_char('q'));
        assert!(event.ctrl());
        assert!(!event.alt());
        assert_eq!(KeyEvent::new(KeyCode::Enter).char(), Some('\r'));
        assert_eq!(KeyEvent::new(KeyCode::Up).char(), None);
    }

    #[test]
    fn input_event_accessors() {
        let key = KeyEvent::new(KeyCode::Tab);
        assert_eq!(InputEvent::KeyUp(key).key(), Some(&key));
        assert!(InputEvent::Focus(true).key().is_none());
        let m = MouseEvent::new(1, 2, MouseFlags::REPORT_POSITION);
        assert_eq!(InputEvent::Mouse(m).mouse(), Some(&m));
    }
}
