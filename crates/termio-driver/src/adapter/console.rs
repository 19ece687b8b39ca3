#![forbid(unsafe_code)]

//! crossterm-backed adapters.
//!
//! [`ConsoleSource`] reproduces structured console records: every key event
//! becomes a down or up [`KeyRecord`], which is what the Windows console
//! delivers. Terminals that never report releases produce lone downs; the
//! pairing filter releases those after its timeout.
//!
//! [`LineSource`] is the line-buffered family: one opaque keystroke per
//! press, from which the decoder synthesizes the down/press/up triple.
//!
//! Both translate mouse events back into the normalized [`MouseRecord`] so
//! the shared gesture classifier sees the same tuple as every other source.

use std::io;
use std::time::Duration;

use crossterm::event as cte;

use termio_core::decoder::DecoderConfig;
use termio_core::event::{KeyCode, KeyModifiers};
use termio_core::raw::{ConsoleKeyInfo, ConsoleRecord, ControlKeyState, KeyRecord, MouseRecord, RawRecord, vk};

use super::InputSource;

/// Structured console records via crossterm.
#[derive(Debug, Default)]
pub struct ConsoleSource {
    _private: (),
}

impl ConsoleSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for ConsoleSource {
    fn name(&self) -> &'static str {
        "console"
    }

    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()> {
        read_available(timeout, out, console_records)
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    fn configure(&self, config: DecoderConfig) -> DecoderConfig {
        config.with_pair_key_events(true)
    }
}

/// Line-buffered keystrokes via crossterm.
#[derive(Debug, Default)]
pub struct LineSource {
    _private: (),
}

impl LineSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputSource for LineSource {
    fn name(&self) -> &'static str {
        "line"
    }

    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()> {
        read_available(timeout, out, line_records)
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}

/// Wait up to `timeout` for the first event, then drain whatever else is
/// already queued so one read yields one batch.
fn read_available(
    timeout: Duration,
    out: &mut Vec<RawRecord>,
    translate: fn(cte::Event, &mut Vec<RawRecord>),
) -> io::Result<()> {
    if !cte::poll(timeout)? {
        return Ok(());
    }
    loop {
        translate(cte::read()?, out);
        if !cte::poll(Duration::ZERO)? {
            return Ok(());
        }
    }
}

fn console_records(event: cte::Event, out: &mut Vec<RawRecord>) {
    match event {
        cte::Event::Key(key) => {
            if let Some(record) = key_record(key) {
                out.push(RawRecord::Console(ConsoleRecord::Key(record)));
            }
        }
        cte::Event::Paste(text) => {
            for ch in text.chars() {
                for key_down in [true, false] {
                    out.push(RawRecord::Console(ConsoleRecord::Key(KeyRecord::char(ch, key_down))));
                }
            }
        }
        other => shared_records(other, out),
    }
}

fn line_records(event: cte::Event, out: &mut Vec<RawRecord>) {
    match event {
        cte::Event::Key(key) => {
            if let Some(info) = ConsoleKeyInfo::from_crossterm(key) {
                out.push(RawRecord::LineBuffered(info));
            }
        }
        cte::Event::Paste(text) => {
            out.extend(
                text.chars()
                    .map(|ch| RawRecord::LineBuffered(ConsoleKeyInfo::new(pasted_key(ch), KeyModifiers::empty()))),
            );
        }
        other => shared_records(other, out),
    }
}

fn shared_records(event: cte::Event, out: &mut Vec<RawRecord>) {
    let record = match event {
        cte::Event::Mouse(mouse) => ConsoleRecord::Mouse(MouseRecord::from_crossterm(mouse)),
        cte::Event::Resize(cols, rows) => ConsoleRecord::WindowBufferSize { cols, rows },
        cte::Event::FocusGained => ConsoleRecord::Focus(true),
        cte::Event::FocusLost => ConsoleRecord::Focus(false),
        cte::Event::Key(_) | cte::Event::Paste(_) => return,
    };
    out.push(RawRecord::Console(record));
}

fn pasted_key(ch: char) -> KeyCode {
    match ch {
        '\r' | '\n' => KeyCode::Enter,
        '\t' => KeyCode::Tab,
        _ => KeyCode::Char(ch),
    }
}

/// Rebuild a console key record from a crossterm key event.
fn key_record(event: cte::KeyEvent) -> Option<KeyRecord> {
    let key_down = event.kind != cte::KeyEventKind::Release;
    let mut state = ControlKeyState::from_modifiers(
        event.modifiers.contains(cte::KeyModifiers::SHIFT),
        event.modifiers.contains(cte::KeyModifiers::ALT),
        event.modifiers.contains(cte::KeyModifiers::CONTROL),
    );
    state.set(
        ControlKeyState::CAPSLOCK,
        event.state.contains(cte::KeyEventState::CAPS_LOCK),
    );
    state.set(
        ControlKeyState::NUMLOCK,
        event.state.contains(cte::KeyEventState::NUM_LOCK),
    );

    let record = match event.code {
        cte::KeyCode::Char(c) => KeyRecord::char(c, key_down),
        cte::KeyCode::Enter => KeyRecord::char('\r', key_down),
        cte::KeyCode::Tab => KeyRecord::char('\t', key_down),
        cte::KeyCode::BackTab => {
            state |= ControlKeyState::SHIFT;
            KeyRecord::virtual_key(vk::TAB, key_down)
        }
        cte::KeyCode::Backspace => KeyRecord::char('\x08', key_down),
        cte::KeyCode::Esc => KeyRecord::char('\x1b', key_down),
        cte::KeyCode::F(n @ 1..=24) => KeyRecord::virtual_key(vk::F1 + u16::from(n) - 1, key_down),
        code => KeyRecord::virtual_key(navigation_vk(code)?, key_down),
    };
    Some(record.with_state(state))
}

fn navigation_vk(code: cte::KeyCode) -> Option<u16> {
    let key = match code {
        cte::KeyCode::Left => vk::LEFT,
        cte::KeyCode::Right => vk::RIGHT,
        cte::KeyCode::Up => vk::UP,
        cte::KeyCode::Down => vk::DOWN,
        cte::KeyCode::Home => vk::HOME,
        cte::KeyCode::End => vk::END,
        cte::KeyCode::PageUp => vk::PRIOR,
        cte::KeyCode::PageDown => vk::NEXT,
        cte::KeyCode::Insert => vk::INSERT,
        cte::KeyCode::Delete => vk::DELETE,
        cte::KeyCode::CapsLock => vk::CAPITAL,
        cte::KeyCode::NumLock => vk::NUMLOCK,
        cte::KeyCode::ScrollLock => vk::SCROLL,
        cte::KeyCode::Pause => vk::PAUSE,
        cte::KeyCode::Modifier(modifier) => match modifier {
            cte::ModifierKeyCode::LeftShift => vk::LSHIFT,
            cte::ModifierKeyCode::RightShift => vk::RSHIFT,
            cte::ModifierKeyCode::LeftControl => vk::LCONTROL,
            cte::ModifierKeyCode::RightControl => vk::RCONTROL,
            cte::ModifierKeyCode::LeftAlt => vk::LMENU,
            cte::ModifierKeyCode::RightAlt => vk::RMENU,
            _ => return None,
        },
        _ => return None,
    };
    Some(key)
}
