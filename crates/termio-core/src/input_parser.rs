#![forbid(unsafe_code)]

//! ANSI input byte parser.
//!
//! Decodes the pass-through bytes of the [`crate::response_parser`] into
//! keystrokes, normalized mouse samples, and focus changes.
//!
//! # Design
//!
//! The parser is a state machine that handles:
//! - ASCII characters and control codes
//! - UTF-8 multi-byte sequences
//! - CSI sequences (cursor, navigation, and function keys; focus; SGR mouse)
//! - SS3 sequences
//! - OSC strings (consumed and dropped)
//!
//! Keys come out as [`ConsoleKeyInfo`]: an ANSI terminal reports one opaque
//! keystroke, so the decoder synthesizes down/press/up from each one.
//! SGR mouse reports come out as [`MouseRecord`] so the shared gesture
//! classifier can handle them.
//!
//! A lone `ESC` left pending at the end of a [`InputParser::parse`] call is
//! emitted as the Escape key. The response parser in front of this one only
//! releases a bare `ESC` once it is known to stand alone.

use crate::event::{KeyCode, KeyModifiers, MouseButton};
use crate::raw::{
    ButtonState, ConsoleKeyInfo, ControlKeyState, MouseEventFlags, MouseRecord, WHEEL_DELTA,
};

/// DoS protection: maximum CSI sequence length.
const MAX_CSI_LEN: usize = 256;

/// DoS protection: maximum OSC sequence length.
const MAX_OSC_LEN: usize = 4096;

/// One decoded ANSI input item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiInput {
    Key(ConsoleKeyInfo),
    Mouse(MouseRecord),
    Focus(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    #[default]
    Ground,
    /// After ESC.
    Escape,
    /// After ESC [.
    Csi,
    /// Collecting CSI parameters.
    CsiParam,
    /// After ESC O.
    Ss3,
    /// Inside an OSC string.
    Osc,
    /// After ESC inside OSC (possible ST).
    OscEscape,
    Utf8 {
        collected: u8,
        expected: u8,
    },
}

/// Terminal input parser with DoS protection.
#[derive(Debug, Default)]
pub struct InputParser {
    state: ParserState,
    buffer: Vec<u8>,
    utf8_buffer: [u8; 4],
    osc_len: usize,
}

impl InputParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(64),
            ..Self::default()
        }
    }

    /// Parse input bytes and return completed items.
    pub fn parse(&mut self, input: &[u8]) -> Vec<AnsiInput> {
        let mut items = Vec::new();
        for &byte in input {
            if let Some(item) = self.process_byte(byte) {
                items.push(item);
            }
        }
        if self.state == ParserState::Escape {
            self.state = ParserState::Ground;
            items.push(key(KeyCode::Escape, KeyModifiers::empty()));
        }
        items
    }

    /// Whether a sequence has started but not yet completed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state != ParserState::Ground
    }

    /// Resolve an unfinished sequence once no more bytes are coming.
    ///
    /// `ESC [` and `ESC O` become Alt+`[` / Alt+`O` and the bytes collected
    /// after them are replayed as ordinary input. Partial OSC strings and
    /// UTF-8 fragments are dropped.
    pub fn finish(&mut self) -> Vec<AnsiInput> {
        let state = std::mem::take(&mut self.state);
        let mut items = Vec::new();
        match state {
            ParserState::Ground => {}
            ParserState::Escape => items.push(key(KeyCode::Escape, KeyModifiers::empty())),
            ParserState::Csi | ParserState::CsiParam => {
                items.push(key(KeyCode::Char('['), KeyModifiers::ALT));
                let collected = std::mem::take(&mut self.buffer);
                items.extend(self.parse(&collected));
            }
            ParserState::Ss3 => items.push(key(KeyCode::Char('O'), KeyModifiers::ALT)),
            ParserState::Osc | ParserState::OscEscape | ParserState::Utf8 { .. } => {}
        }
        self.buffer.clear();
        items
    }

    fn process_byte(&mut self, byte: u8) -> Option<AnsiInput> {
        match self.state {
            ParserState::Ground => self.process_ground(byte),
            ParserState::Escape => self.process_escape(byte),
            ParserState::Csi | ParserState::CsiParam => self.process_csi(byte),
            ParserState::Ss3 => self.process_ss3(byte),
            ParserState::Osc => self.process_osc(byte),
            ParserState::OscEscape => {
                // ST ends the string; any other byte stays part of it.
                self.state = if byte == b'\\' {
                    ParserState::Ground
                } else {
                    ParserState::Osc
                };
                None
            }
            ParserState::Utf8 {
                collected,
                expected,
            } => self.process_utf8(byte, collected, expected),
        }
    }

    fn process_ground(&mut self, byte: u8) -> Option<AnsiInput> {
        match byte {
            0x1B => {
                self.state = ParserState::Escape;
                None
            }
            // NUL - Ctrl+Space or Ctrl+@
            0x00 => Some(key(KeyCode::Null, KeyModifiers::CTRL)),
            0x09 => Some(key(KeyCode::Tab, KeyModifiers::empty())),
            0x0D | 0x0A => Some(key(KeyCode::Enter, KeyModifiers::empty())),
            0x01..=0x08 | 0x0B | 0x0C | 0x0E..=0x1A => {
                let c = (byte + b'a' - 1) as char;
                Some(key(KeyCode::Char(c), KeyModifiers::CTRL))
            }
            0x1C..=0x1F => {
                let c = (byte + b'4' - 0x1C) as char;
                Some(key(KeyCode::Char(c), KeyModifiers::CTRL))
            }
            0x7F => Some(key(KeyCode::Backspace, KeyModifiers::empty())),
            0x20..=0x7E => Some(key(KeyCode::Char(byte as char), KeyModifiers::empty())),
            0xC0..=0xDF => self.start_utf8(byte, 2),
            0xE0..=0xEF => self.start_utf8(byte, 3),
            0xF0..=0xF7 => self.start_utf8(byte, 4),
            _ => None,
        }
    }

    fn start_utf8(&mut self, lead: u8, expected: u8) -> Option<AnsiInput> {
        self.utf8_buffer[0] = lead;
        self.state = ParserState::Utf8 {
            collected: 1,
            expected,
        };
        None
    }

    fn process_escape(&mut self, byte: u8) -> Option<AnsiInput> {
        match byte {
            b'[' => {
                self.state = ParserState::Csi;
                self.buffer.clear();
                None
            }
            b'O' => {
                self.state = ParserState::Ss3;
                None
            }
            b']' => {
                self.state = ParserState::Osc;
                self.osc_len = 0;
                None
            }
            // ESC ESC: the first is a lone Escape, the second starts over.
            0x1B => Some(key(KeyCode::Escape, KeyModifiers::empty())),
            0x7F => {
                self.state = ParserState::Ground;
                Some(key(KeyCode::Backspace, KeyModifiers::ALT))
            }
            0x20..=0x7E => {
                self.state = ParserState::Ground;
                Some(key(KeyCode::Char(byte as char), KeyModifiers::ALT))
            }
            0x01..=0x1A if byte != 0x09 && byte != 0x0D => {
                self.state = ParserState::Ground;
                let c = (byte + b'a' - 1) as char;
                Some(key(KeyCode::Char(c), KeyModifiers::ALT | KeyModifiers::CTRL))
            }
            _ => {
                self.state = ParserState::Ground;
                self.process_ground(byte)
            }
        }
    }

    fn process_csi(&mut self, byte: u8) -> Option<AnsiInput> {
        if self.buffer.len() >= MAX_CSI_LEN {
            self.state = ParserState::Ground;
            self.buffer.clear();
            return None;
        }
        self.buffer.push(byte);

        match byte {
            b'0'..=b'9' | b';' | b':' => {
                self.state = ParserState::CsiParam;
                None
            }
            b'<' | b'=' | b'>' | b'?' if self.state == ParserState::Csi => {
                self.state = ParserState::CsiParam;
                None
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'~' => {
                self.state = ParserState::Ground;
                self.parse_csi_sequence()
            }
            _ => {
                self.state = ParserState::Ground;
                self.buffer.clear();
                None
            }
        }
    }

    fn parse_csi_sequence(&mut self) -> Option<AnsiInput> {
        let seq = std::mem::take(&mut self.buffer);
        let (&final_byte, params) = seq.split_last()?;

        match (params, final_byte) {
            ([], b'I') => return Some(AnsiInput::Focus(true)),
            ([], b'O') => return Some(AnsiInput::Focus(false)),
            _ if params.starts_with(b"<") && matches!(final_byte, b'M' | b'm') => {
                return parse_sgr_mouse(&params[1..], final_byte).map(AnsiInput::Mouse);
            }
            _ => {}
        }

        let mods = parse_modifier_param(params);
        let code = match final_byte {
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'S' => KeyCode::F(4),
            b'Z' => return Some(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            b'~' => return parse_csi_tilde(params),
            b'u' => return parse_csi_u(params),
            _ => return None,
        };
        Some(key(code, mods))
    }

    fn process_ss3(&mut self, byte: u8) -> Option<AnsiInput> {
        self.state = ParserState::Ground;
        let code = match byte {
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            b'M' => KeyCode::Enter,
            _ => return None,
        };
        Some(key(code, KeyModifiers::empty()))
    }

    fn process_osc(&mut self, byte: u8) -> Option<AnsiInput> {
        self.osc_len += 1;
        match byte {
            0x07 => self.state = ParserState::Ground,
            0x1B => self.state = ParserState::OscEscape,
            _ if self.osc_len >= MAX_OSC_LEN => self.state = ParserState::Ground,
            _ => {}
        }
        None
    }

    fn process_utf8(&mut self, byte: u8, collected: u8, expected: u8) -> Option<AnsiInput> {
        if (byte & 0xC0) != 0x80 {
            self.state = ParserState::Ground;
            return self.process_ground(byte);
        }

        self.utf8_buffer[collected as usize] = byte;
        let collected = collected + 1;
        if collected < expected {
            self.state = ParserState::Utf8 {
                collected,
                expected,
            };
            return None;
        }

        self.state = ParserState::Ground;
        let s = std::str::from_utf8(&self.utf8_buffer[..expected as usize]).ok()?;
        let c = s.chars().next()?;
        Some(key(KeyCode::Char(c), KeyModifiers::empty()))
    }
}

fn key(code: KeyCode, modifiers: KeyModifiers) -> AnsiInput {
    AnsiInput::Key(ConsoleKeyInfo::new(code, modifiers))
}

fn parse_csi_tilde(params: &[u8]) -> Option<AnsiInput> {
    let num = parse_first_param(params)?;
    let mods = parse_modifier_param(params);

    let code = match num {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11 => KeyCode::F(1),
        12 => KeyCode::F(2),
        13 => KeyCode::F(3),
        14 => KeyCode::F(4),
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    };
    Some(key(code, mods))
}

/// `CSI codepoint [; modifiers] u` (fixterms / kitty base form).
fn parse_csi_u(params: &[u8]) -> Option<AnsiInput> {
    let num = parse_first_param(params)?;
    let mods = parse_modifier_param(params);
    let code = match num {
        9 => KeyCode::Tab,
        13 => KeyCode::Enter,
        27 => KeyCode::Escape,
        8 | 127 => KeyCode::Backspace,
        _ => KeyCode::Char(char::from_u32(num)?),
    };
    Some(key(code, mods))
}

fn parse_first_param(params: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(params).ok()?;
    s.split(';').next()?.split(':').next()?.parse().ok()
}

fn parse_modifier_param(params: &[u8]) -> KeyModifiers {
    let Ok(s) = std::str::from_utf8(params) else {
        return KeyModifiers::empty();
    };
    let value: u32 = s
        .split(';')
        .nth(1)
        .and_then(|m| m.split(':').next())
        .and_then(|m| m.parse().ok())
        .unwrap_or(1);
    modifiers_from_xterm(value)
}

/// xterm modifier encoding: value = 1 + bits (Shift=1, Alt=2, Ctrl=4).
fn modifiers_from_xterm(value: u32) -> KeyModifiers {
    let bits = value.saturating_sub(1);
    let mut mods = KeyModifiers::empty();
    mods.set(KeyModifiers::SHIFT, bits & 1 != 0);
    mods.set(KeyModifiers::ALT, bits & 2 != 0);
    mods.set(KeyModifiers::CTRL, bits & 4 != 0);
    mods
}

/// Decode `b ; x ; y` of an SGR mouse report into a normalized sample.
fn parse_sgr_mouse(params: &[u8], final_byte: u8) -> Option<MouseRecord> {
    let s = std::str::from_utf8(params).ok()?;
    let mut parts = s.split(';');
    let code: u16 = parts.next()?.parse().ok()?;
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;

    let control = ControlKeyState::from_modifiers(code & 4 != 0, code & 8 != 0, code & 16 != 0);
    let (buttons, flags) = if code & 64 != 0 {
        match code & 0b11 {
            0 => (ButtonState::wheel(WHEEL_DELTA), MouseEventFlags::WHEELED),
            1 => (ButtonState::wheel(-WHEEL_DELTA), MouseEventFlags::WHEELED),
            2 => (ButtonState::wheel(-WHEEL_DELTA), MouseEventFlags::HWHEELED),
            _ => (ButtonState::wheel(WHEEL_DELTA), MouseEventFlags::HWHEELED),
        }
    } else {
        let motion = if code & 32 != 0 {
            MouseEventFlags::MOVED
        } else {
            MouseEventFlags::empty()
        };
        let button = match code & 0b11 {
            0 => Some(MouseButton::Button1),
            1 => Some(MouseButton::Button2),
            2 => Some(MouseButton::Button3),
            _ => None,
        };
        match (final_byte, button) {
            (b'M', Some(b)) => (ButtonState::for_button(b), motion),
            (b'M', None) => (ButtonState::empty(), motion),
            _ => (ButtonState::empty(), MouseEventFlags::empty()),
        }
    };

    Some(
        MouseRecord::new(x.saturating_sub(1), y.saturating_sub(1), buttons, flags)
            .with_control_keys(control),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn first_key(parser: &mut InputParser, bytes: &[u8]) -> Option<ConsoleKeyInfo> {
        match parser.parse(bytes).first() {
            Some(AnsiInput::Key(k)) => Some(*k),
            _ => None,
        }
    }

    #[test]
    fn ascii_characters_parsed() {
        let mut parser = InputParser::new();
        let items = parser.parse(b"abc");
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], AnsiInput::Key(k) if k.code == KeyCode::Char('a')));
        assert!(matches!(items[2], AnsiInput::Key(k) if k.code == KeyCode::Char('c')));
    }

    #[test]
    fn control_characters() {
        let mut parser = InputParser::new();
        let k = first_key(&mut parser, &[0x01]).unwrap();
        assert_eq!(k.code, KeyCode::Char('a'));
        assert!(k.modifiers.contains(KeyModifiers::CTRL));

        let k = first_key(&mut parser, &[0x7F]).unwrap();
        assert_eq!(k.code, KeyCode::Backspace);
        let k = first_key(&mut parser, b"\r").unwrap();
        assert_eq!(k.code, KeyCode::Enter);
    }

    #[test]
    fn arrow_and_navigation_keys() {
        let mut parser = InputParser::new();
        assert_eq!(first_key(&mut parser, b"\x1b[A").unwrap().code, KeyCode::Up);
        assert_eq!(first_key(&mut parser, b"\x1b[D").unwrap().code, KeyCode::Left);
        assert_eq!(first_key(&mut parser, b"\x1b[2~").unwrap().code, KeyCode::Insert);
        assert_eq!(first_key(&mut parser, b"\x1b[3~").unwrap().code, KeyCode::Delete);
        assert_eq!(first_key(&mut parser, b"\x1b[5~").unwrap().code, KeyCode::PageUp);
        assert_eq!(first_key(&mut parser, b"\x1b[6~").unwrap().code, KeyCode::PageDown);
    }

    #[test]
    fn modifiers_in_csi() {
        let mut parser = InputParser::new();
        let k = first_key(&mut parser, b"\x1b[1;5A").unwrap();
        assert_eq!(k.code, KeyCode::Up);
        assert_eq!(k.modifiers, KeyModifiers::CTRL);

        let k = first_key(&mut parser, b"\x1b[3;2~").unwrap();
        assert_eq!(k.code, KeyCode::Delete);
        assert_eq!(k.modifiers, KeyModifiers::SHIFT);
    }

    #[test]
    fn function_keys() {
        let mut parser = InputParser::new();
        assert_eq!(first_key(&mut parser, b"\x1bOP").unwrap().code, KeyCode::F(1));
        assert_eq!(first_key(&mut parser, b"\x1bOS").unwrap().code, KeyCode::F(4));
        assert_eq!(first_key(&mut parser, b"\x1b[15~").unwrap().code, KeyCode::F(5));
        assert_eq!(first_key(&mut parser, b"\x1b[24~").unwrap().code, KeyCode::F(12));
    }

    #[test]
    fn alt_key_and_lone_escape() {
        let mut parser = InputParser::new();
        let k = first_key(&mut parser, b"\x1ba").unwrap();
        assert_eq!(k.code, KeyCode::Char('a'));
        assert_eq!(k.modifiers, KeyModifiers::ALT);

        let k = first_key(&mut parser, b"\x1b").unwrap();
        assert_eq!(k.code, KeyCode::Escape);
        assert_eq!(k.modifiers, KeyModifiers::empty());
    }

    #[test]
    fn doubled_escape_is_escape_then_sequence() {
        let mut parser = InputParser::new();
        let codes: Vec<_> = parser
            .parse(b"\x1b\x1b[A")
            .into_iter()
            .map(|item| match item {
                AnsiInput::Key(info) => (info.code, info.modifiers),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            codes,
            vec![
                (KeyCode::Escape, KeyModifiers::empty()),
                (KeyCode::Up, KeyModifiers::empty()),
            ]
        );
    }

    #[test]
    fn unfinished_csi_resolves_to_alt_bracket_and_replay() {
        let mut parser = InputParser::new();
        assert!(parser.parse(b"\x1b[12;").is_empty());
        assert!(parser.is_pending());
        let keys: Vec<_> = parser
            .finish()
            .into_iter()
            .filter_map(|item| match item {
                AnsiInput::Key(info) => Some((info.code, info.modifiers)),
                _ => None,
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                (KeyCode::Char('['), KeyModifiers::ALT),
                (KeyCode::Char('1'), KeyModifiers::empty()),
                (KeyCode::Char('2'), KeyModifiers::empty()),
                (KeyCode::Char(';'), KeyModifiers::empty()),
            ]
        );
        assert!(!parser.is_pending());
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn focus_events() {
        let mut parser = InputParser::new();
        assert_eq!(parser.parse(b"\x1b[I"), vec![AnsiInput::Focus(true)]);
        assert_eq!(parser.parse(b"\x1b[O"), vec![AnsiInput::Focus(false)]);
    }

    #[test]
    fn sgr_press_release_and_motion() {
        let mut parser = InputParser::new();
        let items = parser.parse(b"\x1b[<0;10;20M\x1b[<0;10;20m\x1b[<35;3;4M");
        assert_eq!(items.len(), 3);
        let AnsiInput::Mouse(press) = items[0] else {
            panic!("expected mouse");
        };
        assert_eq!(press.position, Point::new(9, 19));
        assert_eq!(press.buttons, ButtonState::BUTTON1);
        assert!(press.flags.is_empty());

        let AnsiInput::Mouse(release) = items[1] else {
            panic!("expected mouse");
        };
        assert!(!release.buttons.any_button());

        let AnsiInput::Mouse(motion) = items[2] else {
            panic!("expected mouse");
        };
        assert_eq!(motion.flags, MouseEventFlags::MOVED);
        assert!(!motion.buttons.any_button());
    }

    #[test]
    fn sgr_wheel_and_modifiers() {
        let mut parser = InputParser::new();
        let items = parser.parse(b"\x1b[<65;1;1M\x1b[<20;2;2M");
        let AnsiInput::Mouse(wheel) = items[0] else {
            panic!("expected mouse");
        };
        assert_eq!(wheel.flags, MouseEventFlags::WHEELED);
        assert!(wheel.buttons.wheel_delta() < 0);

        let AnsiInput::Mouse(ctrl_shift) = items[1] else {
            panic!("expected mouse");
        };
        assert!(ctrl_shift.control_key_state.ctrl());
        assert!(ctrl_shift.control_key_state.shift());
        assert_eq!(ctrl_shift.buttons, ButtonState::BUTTON1);
    }

    #[test]
    fn osc_strings_are_dropped() {
        let mut parser = InputParser::new();
        let items = parser.parse(b"\x1b]0;title\x07x\x1b]1;y\x1b\\z");
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], AnsiInput::Key(k) if k.code == KeyCode::Char('x')));
        assert!(matches!(items[1], AnsiInput::Key(k) if k.code == KeyCode::Char('z')));
    }

    #[test]
    fn utf8_characters() {
        let mut parser = InputParser::new();
        assert_eq!(first_key(&mut parser, &[0xC3, 0xA9]).unwrap().code, KeyCode::Char('é'));
        // Split across calls.
        assert!(parser.parse(&[0xE4, 0xB8]).is_empty());
        assert_eq!(first_key(&mut parser, &[0xAD]).unwrap().code, KeyCode::Char('中'));
    }

    #[test]
    fn dos_protection_csi() {
        let mut parser = InputParser::new();
        let mut seq = vec![0x1B, b'['];
        seq.extend(std::iter::repeat_n(b'0', MAX_CSI_LEN + 100));
        seq.push(b'A');
        let _ = parser.parse(&seq);
        assert_eq!(first_key(&mut parser, b"\x1b[A").unwrap().code, KeyCode::Up);
    }
}
