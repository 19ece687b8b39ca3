#![forbid(unsafe_code)]

//! Raw platform records.
//!
//! A [`RawRecord`] is what a platform adapter hands to the event pump before
//! any decoding happens. There is one variant per source family:
//!
//! - [`RawRecord::Console`]: structured OS console records (key with
//!   down/up flag, mouse sample, window size, focus).
//! - [`RawRecord::Ansi`]: a chunk of bytes read from an ANSI/VT terminal.
//! - [`RawRecord::LineBuffered`]: one opaque keystroke from an API that does
//!   not report down and up separately.
//!
//! Mouse samples from every family are normalized into [`MouseRecord`], the
//! `(position, buttons, flags, control keys)` tuple the gesture classifier
//! consumes. The bit layouts follow the console-record convention so that
//! structured records need no translation.

use bitflags::bitflags;
#[cfg(not(target_arch = "wasm32"))]
use crossterm::event as cte;

use crate::event::{KeyCode, KeyModifiers, ModifierKey, MouseButton};
use crate::geometry::Point;

/// One record as acquired by a platform adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// A structured console record.
    Console(ConsoleRecord),
    /// Bytes read from an ANSI terminal.
    Ansi(Vec<u8>),
    /// One keystroke from a line-buffered key API.
    LineBuffered(ConsoleKeyInfo),
}

/// Structured console record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleRecord {
    Key(KeyRecord),
    Mouse(MouseRecord),
    /// The screen buffer changed size.
    WindowBufferSize {
        cols: u16,
        rows: u16,
    },
    Focus(bool),
}

bitflags! {
    /// Raw modifier/lock bitmask attached to console key and mouse records.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlKeyState: u32 {
        const RIGHT_ALT    = 0x0001;
        const LEFT_ALT     = 0x0002;
        const RIGHT_CTRL   = 0x0004;
        const LEFT_CTRL    = 0x0008;
        const SHIFT        = 0x0010;
        const NUMLOCK      = 0x0020;
        const SCROLLLOCK   = 0x0040;
        const CAPSLOCK     = 0x0080;
        const ENHANCED_KEY = 0x0100;
    }
}

impl ControlKeyState {
    #[must_use]
    pub const fn alt(self) -> bool {
        self.intersects(Self::LEFT_ALT.union(Self::RIGHT_ALT))
    }

    #[must_use]
    pub const fn ctrl(self) -> bool {
        self.intersects(Self::LEFT_CTRL.union(Self::RIGHT_CTRL))
    }

    #[must_use]
    pub const fn shift(self) -> bool {
        self.contains(Self::SHIFT)
    }

    /// The state with lock toggles removed.
    #[must_use]
    pub const fn without_locks(self) -> Self {
        self.difference(Self::NUMLOCK.union(Self::SCROLLLOCK).union(Self::CAPSLOCK))
    }

    /// Build a state from the three pressable modifiers.
    #[must_use]
    pub fn from_modifiers(shift: bool, alt: bool, ctrl: bool) -> Self {
        let mut state = Self::empty();
        state.set(Self::SHIFT, shift);
        state.set(Self::LEFT_ALT, alt);
        state.set(Self::LEFT_CTRL, ctrl);
        state
    }
}

/// A console key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRecord {
    /// `true` for a down transition, `false` for up.
    pub key_down: bool,
    pub repeat_count: u16,
    /// Virtual key code (see [`vk`]).
    pub virtual_key: u16,
    pub scan_code: u16,
    /// Character produced by the key, `'\0'` if none.
    pub ch: char,
    pub control_key_state: ControlKeyState,
}

impl KeyRecord {
    /// A down or up record for a plain character key.
    #[must_use]
    pub fn char(ch: char, key_down: bool) -> Self {
        Self {
            key_down,
            repeat_count: 1,
            virtual_key: vk::for_char(ch),
            scan_code: 0,
            ch,
            control_key_state: ControlKeyState::empty(),
        }
    }

    /// A record for a virtual key with no character.
    #[must_use]
    pub const fn virtual_key(virtual_key: u16, key_down: bool) -> Self {
        Self {
            key_down,
            repeat_count: 1,
            virtual_key,
            scan_code: 0,
            ch: '\0',
            control_key_state: ControlKeyState::empty(),
        }
    }

    #[must_use]
    pub const fn with_state(mut self, state: ControlKeyState) -> Self {
        self.control_key_state = state;
        self
    }
}

/// Virtual key codes used by console key records.
pub mod vk {
    pub const BACK: u16 = 0x08;
    pub const TAB: u16 = 0x09;
    pub const CLEAR: u16 = 0x0C;
    pub const RETURN: u16 = 0x0D;
    pub const SHIFT: u16 = 0x10;
    pub const CONTROL: u16 = 0x11;
    pub const MENU: u16 = 0x12;
    pub const PAUSE: u16 = 0x13;
    pub const CAPITAL: u16 = 0x14;
    pub const ESCAPE: u16 = 0x1B;
    pub const SPACE: u16 = 0x20;
    pub const PRIOR: u16 = 0x21;
    pub const NEXT: u16 = 0x22;
    pub const END: u16 = 0x23;
    pub const HOME: u16 = 0x24;
    pub const LEFT: u16 = 0x25;
    pub const UP: u16 = 0x26;
    pub const RIGHT: u16 = 0x27;
    pub const DOWN: u16 = 0x28;
    pub const INSERT: u16 = 0x2D;
    pub const DELETE: u16 = 0x2E;
    pub const KEY_0: u16 = 0x30;
    pub const KEY_9: u16 = 0x39;
    pub const KEY_A: u16 = 0x41;
    pub const KEY_Z: u16 = 0x5A;
    pub const F1: u16 = 0x70;
    pub const F24: u16 = 0x87;
    pub const NUMLOCK: u16 = 0x90;
    pub const SCROLL: u16 = 0x91;
    pub const LSHIFT: u16 = 0xA0;
    pub const RSHIFT: u16 = 0xA1;
    pub const LCONTROL: u16 = 0xA2;
    pub const RCONTROL: u16 = 0xA3;
    pub const LMENU: u16 = 0xA4;
    pub const RMENU: u16 = 0xA5;
    /// Unicode character injected without a physical key.
    pub const PACKET: u16 = 0xE7;

    /// Best-effort virtual key for a character (letters and digits only).
    #[must_use]
    pub fn for_char(ch: char) -> u16 {
        match ch {
            'a'..='z' => KEY_A + (ch as u16 - 'a' as u16),
            'A'..='Z' => KEY_A + (ch as u16 - 'A' as u16),
            '0'..='9' => KEY_0 + (ch as u16 - '0' as u16),
            ' ' => SPACE,
            '\r' | '\n' => RETURN,
            '\t' => TAB,
            '\x1b' => ESCAPE,
            '\x08' | '\x7f' => BACK,
            _ => PACKET,
        }
    }
}

bitflags! {
    /// Pressed-button bitmask of a mouse record.
    ///
    /// For wheel records the high 16 bits carry a signed wheel delta.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ButtonState: u32 {
        /// Leftmost button.
        const BUTTON1   = 0x0001;
        /// Rightmost button.
        const BUTTON3   = 0x0002;
        /// Second button from the left (usually middle).
        const BUTTON2   = 0x0004;
        const BUTTON4   = 0x0008;
        const ANY       = 0x000F;

        const _ = !0;
    }
}

impl ButtonState {
    /// A wheel record state carrying `delta` in the high word.
    #[must_use]
    pub const fn wheel(delta: i16) -> Self {
        Self::from_bits_retain((delta as u16 as u32) << 16)
    }

    /// The signed wheel delta in the high word.
    #[must_use]
    pub const fn wheel_delta(self) -> i16 {
        (self.bits() >> 16) as u16 as i16
    }

    /// Whether any button bit is set (wheel bits ignored).
    #[must_use]
    pub const fn any_button(self) -> bool {
        self.intersects(Self::ANY)
    }

    /// The lowest-numbered pressed button.
    #[must_use]
    pub const fn primary(self) -> Option<MouseButton> {
        if self.contains(Self::BUTTON1) {
            Some(MouseButton::Button1)
        } else if self.contains(Self::BUTTON2) {
            Some(MouseButton::Button2)
        } else if self.contains(Self::BUTTON3) {
            Some(MouseButton::Button3)
        } else if self.contains(Self::BUTTON4) {
            Some(MouseButton::Button4)
        } else {
            None
        }
    }

    /// The state bit for a single button.
    #[must_use]
    pub const fn for_button(button: MouseButton) -> Self {
        match button {
            MouseButton::Button1 => Self::BUTTON1,
            MouseButton::Button2 => Self::BUTTON2,
            MouseButton::Button3 => Self::BUTTON3,
            MouseButton::Button4 => Self::BUTTON4,
        }
    }
}

bitflags! {
    /// Event flags of a mouse record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseEventFlags: u32 {
        const MOVED        = 0x0001;
        const DOUBLE_CLICK = 0x0002;
        const WHEELED      = 0x0004;
        const HWHEELED     = 0x0008;
    }
}

/// Normalized mouse sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MouseRecord {
    pub position: Point,
    pub buttons: ButtonState,
    pub flags: MouseEventFlags,
    pub control_key_state: ControlKeyState,
}

impl MouseRecord {
    #[must_use]
    pub const fn new(x: u16, y: u16, buttons: ButtonState, flags: MouseEventFlags) -> Self {
        Self {
            position: Point::new(x, y),
            buttons,
            flags,
            control_key_state: ControlKeyState::empty(),
        }
    }

    /// A press (or held) sample for `button`.
    #[must_use]
    pub const fn press(x: u16, y: u16, button: MouseButton) -> Self {
        Self::new(x, y, ButtonState::for_button(button), MouseEventFlags::empty())
    }

    /// A release sample (all buttons up).
    #[must_use]
    pub const fn release(x: u16, y: u16) -> Self {
        Self::new(x, y, ButtonState::empty(), MouseEventFlags::empty())
    }

    /// A motion sample with the given buttons held.
    #[must_use]
    pub const fn moved(x: u16, y: u16, buttons: ButtonState) -> Self {
        Self::new(x, y, buttons, MouseEventFlags::MOVED)
    }

    #[must_use]
    pub const fn with_control_keys(mut self, state: ControlKeyState) -> Self {
        self.control_key_state = state;
        self
    }

    /// Translate a crossterm mouse event into a normalized sample.
    #[cfg(not(target_arch = "wasm32"))]
    #[must_use]
    pub fn from_crossterm(event: cte::MouseEvent) -> Self {
        let (buttons, flags) = match event.kind {
            cte::MouseEventKind::Down(b) => {
                (ButtonState::for_button(map_mouse_button(b)), MouseEventFlags::empty())
            }
            cte::MouseEventKind::Up(_) => (ButtonState::empty(), MouseEventFlags::empty()),
            cte::MouseEventKind::Drag(b) => {
                (ButtonState::for_button(map_mouse_button(b)), MouseEventFlags::MOVED)
            }
            cte::MouseEventKind::Moved => (ButtonState::empty(), MouseEventFlags::MOVED),
            cte::MouseEventKind::ScrollUp => (ButtonState::wheel(WHEEL_DELTA), MouseEventFlags::WHEELED),
            cte::MouseEventKind::ScrollDown => {
                (ButtonState::wheel(-WHEEL_DELTA), MouseEventFlags::WHEELED)
            }
            cte::MouseEventKind::ScrollLeft => {
                (ButtonState::wheel(-WHEEL_DELTA), MouseEventFlags::HWHEELED)
            }
            cte::MouseEventKind::ScrollRight => {
                (ButtonState::wheel(WHEEL_DELTA), MouseEventFlags::HWHEELED)
            }
        };
        let m = event.modifiers;
        Self::new(event.column, event.row, buttons, flags).with_control_keys(
            ControlKeyState::from_modifiers(
                m.contains(cte::KeyModifiers::SHIFT),
                m.contains(cte::KeyModifiers::ALT),
                m.contains(cte::KeyModifiers::CONTROL),
            ),
        )
    }
}

/// One wheel notch.
pub const WHEEL_DELTA: i16 = 120;

/// One keystroke from a line-buffered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsoleKeyInfo {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl ConsoleKeyInfo {
    #[must_use]
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Translate a crossterm key event.
    ///
    /// Release events and keys with no counterpart map to `None`.
    #[cfg(not(target_arch = "wasm32"))]
    #[must_use]
    pub fn from_crossterm(event: cte::KeyEvent) -> Option<Self> {
        if event.kind == cte::KeyEventKind::Release {
            return None;
        }
        let code = map_key_code(event.code)?;
        let mut modifiers = KeyModifiers::empty();
        modifiers.set(KeyModifiers::SHIFT, event.modifiers.contains(cte::KeyModifiers::SHIFT));
        modifiers.set(KeyModifiers::ALT, event.modifiers.contains(cte::KeyModifiers::ALT));
        modifiers.set(KeyModifiers::CTRL, event.modifiers.contains(cte::KeyModifiers::CONTROL));
        modifiers.set(
            KeyModifiers::CAPSLOCK,
            event.state.contains(cte::KeyEventState::CAPS_LOCK),
        );
        modifiers.set(
            KeyModifiers::NUMLOCK,
            event.state.contains(cte::KeyEventState::NUM_LOCK),
        );
        Some(Self::new(code, modifiers))
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_key_code(code: cte::KeyCode) -> Option<KeyCode> {
    match code {
        cte::KeyCode::Backspace => Some(KeyCode::Backspace),
        cte::KeyCode::Enter => Some(KeyCode::Enter),
        cte::KeyCode::Left => Some(KeyCode::Left),
        cte::KeyCode::Right => Some(KeyCode::Right),
        cte::KeyCode::Up => Some(KeyCode::Up),
        cte::KeyCode::Down => Some(KeyCode::Down),
        cte::KeyCode::Home => Some(KeyCode::Home),
        cte::KeyCode::End => Some(KeyCode::End),
        cte::KeyCode::PageUp => Some(KeyCode::PageUp),
        cte::KeyCode::PageDown => Some(KeyCode::PageDown),
        cte::KeyCode::Tab => Some(KeyCode::Tab),
        cte::KeyCode::BackTab => Some(KeyCode::BackTab),
        cte::KeyCode::Delete => Some(KeyCode::Delete),
        cte::KeyCode::Insert => Some(KeyCode::Insert),
        cte::KeyCode::F(n) => Some(KeyCode::F(n)),
        cte::KeyCode::Char(c) => Some(KeyCode::Char(c)),
        cte::KeyCode::Null => Some(KeyCode::Null),
        cte::KeyCode::Esc => Some(KeyCode::Escape),
        cte::KeyCode::Modifier(m) => Some(KeyCode::Modifier(map_modifier_key(m))),
        cte::KeyCode::CapsLock | cte::KeyCode::NumLock | cte::KeyCode::ScrollLock => {
            Some(KeyCode::Modifier(ModifierKey::Other))
        }
        _ => None,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_modifier_key(key: cte::ModifierKeyCode) -> ModifierKey {
    match key {
        cte::ModifierKeyCode::LeftShift | cte::ModifierKeyCode::RightShift => ModifierKey::Shift,
        cte::ModifierKeyCode::LeftControl | cte::ModifierKeyCode::RightControl => {
            ModifierKey::Control
        }
        cte::ModifierKeyCode::LeftAlt | cte::ModifierKeyCode::RightAlt => ModifierKey::Alt,
        _ => ModifierKey::Other,
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn map_mouse_button(button: cte::MouseButton) -> MouseButton {
    match button {
        cte::MouseButton::Left => MouseButton::Button1,
        cte::MouseButton::Middle => MouseButton::Button2,
        cte::MouseButton::Right => MouseButton::Button3,
    }
}
