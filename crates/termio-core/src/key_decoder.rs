#![forbid(unsafe_code)]

//! Key record decoding.
//!
//! [`KeyDecoder`] turns console key records into `KeyDown`/`KeyPress`/
//! `KeyUp` events and keeps the modifier set sticky while any key state
//! persists. [`KeyPairingFilter`] smooths over sources that deliver
//! unmatched down/up records.

use std::time::{Duration, Instant};

use crate::event::{InputEvent, KeyCode, KeyEvent, KeyModifiers, ModifierKey};
use crate::raw::{ConsoleKeyInfo, ControlKeyState, KeyRecord, vk};

/// Stateful key decoder.
///
/// Modifiers seen on any record are OR-ed into the running set, which is
/// cleared only by an up record whose raw control-key state is empty.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    modifiers: KeyModifiers,
}

impl KeyDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently accumulated modifiers.
    #[must_use]
    pub fn modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    /// Decode one console key record.
    pub fn decode_record(&mut self, record: &KeyRecord, out: &mut Vec<InputEvent>) {
        let state = record.control_key_state;
        self.modifiers |= modifiers_from_state(state);

        let code = map_key(record).unwrap_or_else(|| KeyCode::Modifier(modifier_owner(state)));
        let event = KeyEvent::new(code).with_modifiers(self.modifiers);
        if record.key_down {
            out.push(InputEvent::KeyDown(event));
            out.push(InputEvent::KeyPress(event));
        } else {
            out.push(InputEvent::KeyUp(event));
        }

        if !record.key_down && state.is_empty() {
            self.modifiers = KeyModifiers::empty();
        }
    }

    /// Synthesize the full down/press/up triple for an opaque keystroke.
    pub fn decode_opaque(&mut self, info: ConsoleKeyInfo, out: &mut Vec<InputEvent>) {
        let event = KeyEvent::new(info.code).with_modifiers(info.modifiers);
        out.push(InputEvent::KeyDown(event));
        out.push(InputEvent::KeyPress(event));
        out.push(InputEvent::KeyUp(event));
    }
}

/// Normalize a raw control-key state into the modifier set.
#[must_use]
pub fn modifiers_from_state(state: ControlKeyState) -> KeyModifiers {
    let mut mods = KeyModifiers::empty();
    mods.set(KeyModifiers::SHIFT, state.shift());
    mods.set(KeyModifiers::ALT, state.alt());
    mods.set(KeyModifiers::CTRL, state.ctrl());
    mods.set(KeyModifiers::CAPSLOCK, state.contains(ControlKeyState::CAPSLOCK));
    mods.set(KeyModifiers::NUMLOCK, state.contains(ControlKeyState::NUMLOCK));
    mods.set(KeyModifiers::SCROLLLOCK, state.contains(ControlKeyState::SCROLLLOCK));
    mods
}

/// Which modifier a record with no mappable key belongs to.
fn modifier_owner(state: ControlKeyState) -> ModifierKey {
    let pressed = state
        .without_locks()
        .difference(ControlKeyState::ENHANCED_KEY);
    if pressed.alt() {
        ModifierKey::Alt
    } else if pressed.ctrl() {
        ModifierKey::Control
    } else if pressed.shift() {
        ModifierKey::Shift
    } else {
        ModifierKey::Other
    }
}

/// Map a record to a semantic key code; `None` means modifier-only.
fn map_key(record: &KeyRecord) -> Option<KeyCode> {
    let state = record.control_key_state;
    let code = match record.virtual_key {
        vk::BACK => KeyCode::Backspace,
        vk::TAB if state.shift() => KeyCode::BackTab,
        vk::TAB => KeyCode::Tab,
        vk::RETURN => KeyCode::Enter,
        vk::ESCAPE => KeyCode::Escape,
        vk::PRIOR => KeyCode::PageUp,
        vk::NEXT => KeyCode::PageDown,
        vk::END => KeyCode::End,
        vk::HOME => KeyCode::Home,
        vk::LEFT => KeyCode::Left,
        vk::UP => KeyCode::Up,
        vk::RIGHT => KeyCode::Right,
        vk::DOWN => KeyCode::Down,
        vk::INSERT => KeyCode::Insert,
        vk::DELETE => KeyCode::Delete,
        vk::F1..=vk::F24 => KeyCode::F((record.virtual_key - vk::F1 + 1) as u8),
        vk::SHIFT | vk::LSHIFT | vk::RSHIFT => KeyCode::Modifier(ModifierKey::Shift),
        vk::CONTROL | vk::LCONTROL | vk::RCONTROL => KeyCode::Modifier(ModifierKey::Control),
        vk::MENU | vk::LMENU | vk::RMENU => KeyCode::Modifier(ModifierKey::Alt),
        vk::CAPITAL | vk::NUMLOCK | vk::SCROLL => KeyCode::Modifier(ModifierKey::Other),
        vk::KEY_A..=vk::KEY_Z if state.ctrl() || record.ch == '\0' => {
            let c = (b'a' + (record.virtual_key - vk::KEY_A) as u8) as char;
            if state.shift() && !state.ctrl() {
                KeyCode::Char(c.to_ascii_uppercase())
            } else {
                KeyCode::Char(c)
            }
        }
        vk::KEY_0..=vk::KEY_9 if record.ch == '\0' => {
            KeyCode::Char((b'0' + (record.virtual_key - vk::KEY_0) as u8) as char)
        }
        _ => match record.ch {
            '\0' if record.virtual_key == 0 => return None,
            '\0' => KeyCode::Unknown(record.virtual_key),
            ' ' if state.ctrl() => KeyCode::Null,
            c => KeyCode::Char(c),
        },
    };
    Some(code)
}

/// Default time a held down record waits for its up.
pub const DEFAULT_PAIR_TIMEOUT: Duration = Duration::from_millis(50);

/// Holds a down record until the matching up arrives.
///
/// - A new down while one is held releases the held one unmatched.
/// - An up with no matching held down is released alone.
/// - A held down is released after the pairing timeout.
#[derive(Debug)]
pub struct KeyPairingFilter {
    held: Option<(KeyRecord, Instant)>,
    timeout: Duration,
}

impl Default for KeyPairingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_PAIR_TIMEOUT)
    }
}

impl KeyPairingFilter {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: None,
            timeout,
        }
    }

    #[must_use]
    pub fn held(&self) -> Option<&KeyRecord> {
        self.held.as_ref().map(|(r, _)| r)
    }

    /// Feed one record; released records are appended to `out` in order.
    pub fn push(&mut self, record: KeyRecord, now: Instant, out: &mut Vec<KeyRecord>) {
        if record.key_down {
            if let Some((previous, _)) = self.held.take() {
                out.push(previous);
            }
            self.held = Some((record, now));
            return;
        }

        match self.held {
            Some((down, _)) if pairs_with(&down, &record) => {
                self.held = None;
                out.push(down);
                out.push(record);
            }
            _ => out.push(record),
        }
    }

    /// When the held record must be released.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.held.map(|(_, at)| at + self.timeout)
    }

    /// Release the held record if its deadline has passed.
    pub fn expire(&mut self, now: Instant, out: &mut Vec<KeyRecord>) {
        if self.next_deadline().is_some_and(|deadline| deadline <= now) {
            self.flush(out);
        }
    }

    pub fn flush(&mut self, out: &mut Vec<KeyRecord>) {
        if let Some((record, _)) = self.held.take() {
            out.push(record);
        }
    }
}

fn pairs_with(down: &KeyRecord, up: &KeyRecord) -> bool {
    if down.ch != '\0' || up.ch != '\0' {
        down.ch == up.ch
    } else {
        down.virtual_key == up.virtual_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(decoder: &mut KeyDecoder, record: KeyRecord) -> Vec<InputEvent> {
        let mut out = Vec::new();
        decoder.decode_record(&record, &mut out);
        out
    }

    #[test]
    fn down_emits_down_then_press() {
        let mut decoder = KeyDecoder::new();
        let events = decode(&mut decoder, KeyRecord::char('x', true));
        let key = KeyEvent::new(KeyCode::Char('x'));
        assert_eq!(events, vec![InputEvent::KeyDown(key), InputEvent::KeyPress(key)]);

        let events = decode(&mut decoder, KeyRecord::char('x', false));
        assert_eq!(events, vec![InputEvent::KeyUp(key)]);
    }

    #[test]
    fn modifiers_accumulate_until_empty_up() {
        let mut decoder = KeyDecoder::new();
        let shift = ControlKeyState::SHIFT;
        decode(&mut decoder, KeyRecord::virtual_key(vk::SHIFT, true).with_state(shift));
        let events = decode(&mut decoder, KeyRecord::char('A', true).with_state(shift));
        assert!(events[0].key().unwrap().shift());

        // Ctrl joins while shift is still remembered.
        let ctrl = ControlKeyState::LEFT_CTRL;
        decode(&mut decoder, KeyRecord::virtual_key(vk::CONTROL, true).with_state(ctrl));
        assert_eq!(decoder.modifiers(), KeyModifiers::SHIFT | KeyModifiers::CTRL);

        // An up with a non-empty state keeps the set.
        decode(&mut decoder, KeyRecord::char('A', false).with_state(ctrl));
        assert!(!decoder.modifiers().is_empty());

        // Up with nothing held clears it.
        decode(&mut decoder, KeyRecord::virtual_key(vk::CONTROL, false));
        assert!(decoder.modifiers().is_empty());
    }

    #[test]
    fn bare_modifier_emits_modifier_event() {
        let mut decoder = KeyDecoder::new();
        let record = KeyRecord::virtual_key(0, true).with_state(ControlKeyState::RIGHT_ALT);
        let events = decode(&mut decoder, record);
        assert_eq!(
            events[0].key().map(|k| k.code),
            Some(KeyCode::Modifier(ModifierKey::Alt))
        );
        assert!(events[0].key().unwrap().alt());
    }

    #[test]
    fn ctrl_letter_maps_to_lowercase_char() {
        let mut decoder = KeyDecoder::new();
        let mut record = KeyRecord::char('\u{3}', true).with_state(ControlKeyState::LEFT_CTRL);
        record.virtual_key = vk::KEY_A + 2;
        let events = decode(&mut decoder, record);
        let key = events[0].key().unwrap();
        assert_eq!(key.code, KeyCode::Char('c'));
        assert!(key.ctrl());
    }

    #[test]
    fn navigation_and_function_keys() {
        let mut decoder = KeyDecoder::new();
        let events = decode(&mut decoder, KeyRecord::virtual_key(vk::UP, true));
        assert_eq!(events[0].key().map(|k| k.code), Some(KeyCode::Up));
        let events = decode(&mut decoder, KeyRecord::virtual_key(vk::F1 + 4, true));
        assert_eq!(events[0].key().map(|k| k.code), Some(KeyCode::F(5)));
        let events = decode(
            &mut decoder,
            KeyRecord::virtual_key(vk::TAB, true).with_state(ControlKeyState::SHIFT),
        );
        assert_eq!(events[0].key().map(|k| k.code), Some(KeyCode::BackTab));
    }

    #[test]
    fn opaque_key_synthesizes_triple() {
        let mut decoder = KeyDecoder::new();
        let mut out = Vec::new();
        decoder.decode_opaque(ConsoleKeyInfo::new(KeyCode::Enter, KeyModifiers::empty()), &mut out);
        let key = KeyEvent::new(KeyCode::Enter);
        assert_eq!(
            out,
            vec![
                InputEvent::KeyDown(key),
                InputEvent::KeyPress(key),
                InputEvent::KeyUp(key)
            ]
        );
    }

    #[test]
    fn pairing_releases_matched_pair_together() {
        let now = Instant::now();
        let mut filter = KeyPairingFilter::default();
        let mut out = Vec::new();
        filter.push(KeyRecord::char('a', true), now, &mut out);
        assert!(out.is_empty());
        filter.push(KeyRecord::char('a', false), now, &mut out);
        assert_eq!(out, vec![KeyRecord::char('a', true), KeyRecord::char('a', false)]);
        assert!(filter.held().is_none());
    }

    #[test]
    fn pairing_second_down_releases_first_alone() {
        let now = Instant::now();
        let mut filter = KeyPairingFilter::default();
        let mut out = Vec::new();
        filter.push(KeyRecord::char('a', true), now, &mut out);
        filter.push(KeyRecord::char('b', true), now, &mut out);
        assert_eq!(out, vec![KeyRecord::char('a', true)]);
        assert_eq!(filter.held(), Some(&KeyRecord::char('b', true)));
    }

    #[test]
    fn pairing_unmatched_up_released_alone() {
        let now = Instant::now();
        let mut filter = KeyPairingFilter::default();
        let mut out = Vec::new();
        filter.push(KeyRecord::char('a', true), now, &mut out);
        filter.push(KeyRecord::char('z', false), now, &mut out);
        assert_eq!(out, vec![KeyRecord::char('z', false)]);
        assert!(filter.held().is_some());
    }

    #[test]
    fn pairing_held_down_expires() {
        let now = Instant::now();
        let mut filter = KeyPairingFilter::new(Duration::from_millis(10));
        let mut out = Vec::new();
        filter.push(KeyRecord::char('q', true), now, &mut out);
        filter.expire(now + Duration::from_millis(5), &mut out);
        assert!(out.is_empty());
        filter.expire(now + Duration::from_millis(10), &mut out);
        assert_eq!(out, vec![KeyRecord::char('q', true)]);
        assert_eq!(filter.next_deadline(), None);
    }
}
