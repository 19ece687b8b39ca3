#![forbid(unsafe_code)]

//! Inbound ANSI response parser.
//!
//! Terminal replies to queries (cursor position reports, device attributes)
//! and ordinary navigation-key sequences look the same for their first few
//! bytes. This parser sits in front of the key/mouse parser and buffers
//! speculatively:
//!
//! - `Normal`: bytes pass through. `ESC` is held.
//! - `ExpectingBracket`: `[` or `]` is held and the parser enters
//!   `InResponse`. Anything else releases the held bytes as a false start.
//! - `InResponse`: bytes accumulate until the buffer ends with the
//!   registered terminator (the callback consumes it), matches a known
//!   pass-through shape (released verbatim), or reaches the held-buffer
//!   cap (flushed verbatim).
//!
//! Bytes that are not consumed by a callback always come out in order.

use smallvec::SmallVec;

/// Default cap on held bytes before a verbatim flush.
pub const DEFAULT_MAX_HELD: usize = 256;

const ESC: u8 = 0x1B;

/// Parser states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseState {
    #[default]
    Normal,
    ExpectingBracket,
    InResponse,
}

/// Callback invoked with the full response (including `ESC [`).
pub type ResponseCallback = Box<dyn FnOnce(&[u8])>;

struct Expected {
    terminator: Vec<u8>,
    callback: ResponseCallback,
}

/// Speculative buffering parser for terminal responses.
pub struct ResponseParser {
    state: ResponseState,
    held: SmallVec<[u8; 32]>,
    expected: Option<Expected>,
    max_held: usize,
}

impl std::fmt::Debug for ResponseParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseParser")
            .field("state", &self.state)
            .field("held", &self.held)
            .field(
                "expected",
                &self.expected.as_ref().map(|e| e.terminator.as_slice()),
            )
            .field("max_held", &self.max_held)
            .finish()
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HELD)
    }
}

impl ResponseParser {
    /// Create a parser that flushes after `max_held` held bytes.
    #[must_use]
    pub fn new(max_held: usize) -> Self {
        Self {
            state: ResponseState::Normal,
            held: SmallVec::new(),
            expected: None,
            max_held: max_held.max(3),
        }
    }

    /// Register a one-shot expected response.
    ///
    /// When the held buffer ends with `terminator` the callback receives the
    /// whole buffer and nothing is passed through. A later registration
    /// replaces an earlier one that has not fired.
    pub fn expect_response(
        &mut self,
        terminator: impl Into<Vec<u8>>,
        callback: impl FnOnce(&[u8]) + 'static,
    ) {
        self.expected = Some(Expected {
            terminator: terminator.into(),
            callback: Box::new(callback),
        });
    }

    /// Drop a registered response without invoking it.
    pub fn cancel_expected(&mut self) -> bool {
        self.expected.take().is_some()
    }

    #[must_use]
    pub fn has_expected(&self) -> bool {
        self.expected.is_some()
    }

    #[must_use]
    pub fn state(&self) -> ResponseState {
        self.state
    }

    /// Whether any bytes are currently withheld.
    #[must_use]
    pub fn is_holding(&self) -> bool {
        !self.held.is_empty()
    }

    /// Feed a chunk and return the pass-through bytes.
    pub fn process(&mut self, input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        self.process_into(input, &mut out);
        out
    }

    /// Feed a chunk, appending pass-through bytes to `out`.
    pub fn process_into(&mut self, input: &[u8], out: &mut Vec<u8>) {
        for &byte in input {
            self.process_byte(byte, out);
        }
    }

    /// Release everything held and return to `Normal`.
    pub fn flush(&mut self) -> Vec<u8> {
        self.state = ResponseState::Normal;
        std::mem::take(&mut self.held).into_vec()
    }

    fn process_byte(&mut self, byte: u8, out: &mut Vec<u8>) {
        match self.state {
            ResponseState::Normal => {
                if byte == ESC {
                    self.held.push(byte);
                    self.state = ResponseState::ExpectingBracket;
                } else {
                    out.push(byte);
                }
            }
            ResponseState::ExpectingBracket => {
                if byte == ESC {
                    // The held ESC was a key of its own; this one may start a reply.
                    out.extend_from_slice(&self.held);
                    self.held.clear();
                    self.held.push(byte);
                    return;
                }
                self.held.push(byte);
                if byte == b'[' || byte == b']' {
                    self.state = ResponseState::InResponse;
                } else {
                    self.release(out);
                }
            }
            ResponseState::InResponse => {
                self.held.push(byte);
                if self.try_complete_expected() {
                    return;
                }
                if is_known_shape(&self.held) {
                    self.release(out);
                } else if self.held.len() >= self.max_held {
                    crate::debug!(held = self.held.len(), "response buffer cap reached, flushing");
                    self.release(out);
                }
            }
        }
    }

    fn try_complete_expected(&mut self) -> bool {
        let matched = self
            .expected
            .as_ref()
            .is_some_and(|e| !e.terminator.is_empty() && self.held.ends_with(&e.terminator));
        if !matched {
            return false;
        }
        if let Some(expected) = self.expected.take() {
            let response = std::mem::take(&mut self.held);
            self.state = ResponseState::Normal;
            (expected.callback)(&response[..]);
        }
        true
    }

    fn release(&mut self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.held);
        self.held.clear();
        self.state = ResponseState::Normal;
    }
}

/// Recognize sequences that are always input, never a query response.
///
/// Covers cursor and navigation keys (`CSI [params] A-D H F Z P Q S`),
/// tilde keys (`CSI n [; m] ~`), kitty `CSI ... u`, focus (`CSI I`/`CSI O`),
/// SGR mouse reports (`CSI < b ; x ; y M/m`), and complete OSC strings.
/// `CSI ... R` is deliberately absent: it doubles as a cursor report.
fn is_known_shape(held: &[u8]) -> bool {
    let Some((&last, body)) = held.split_last() else {
        return false;
    };
    if held.len() < 3 || held[0] != ESC {
        return false;
    }
    match held[1] {
        b'[' => {
            let params = &body[2..];
            if let Some(mouse) = params.strip_prefix(b"<") {
                return matches!(last, b'M' | b'm') && all_params(mouse) && !mouse.is_empty();
            }
            if !all_params(params) {
                return false;
            }
            match last {
                b'A' | b'B' | b'C' | b'D' | b'H' | b'F' | b'Z' | b'P' | b'Q' | b'S' => true,
                b'~' | b'u' => !params.is_empty(),
                b'I' | b'O' => params.is_empty(),
                _ => false,
            }
        }
        b']' => last == 0x07 || held.ends_with(b"\x1b\\"),
        _ => false,
    }
}

fn all_params(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| b.is_ascii_digit() || *b == b';' || *b == b':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn plain_bytes_pass_through() {
        let mut parser = ResponseParser::default();
        assert_eq!(parser.process(b"hello"), b"hello");
        assert_eq!(parser.state(), ResponseState::Normal);
    }

    #[test]
    fn up_arrow_is_released_verbatim() {
        let mut parser = ResponseParser::default();
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        parser.expect_response("R", move |_| *flag.borrow_mut() = true);

        assert_eq!(parser.process(b"\x1b[A"), b"\x1b[A");
        assert!(!*fired.borrow());
        assert!(parser.has_expected());
        assert_eq!(parser.state(), ResponseState::Normal);
    }

    #[test]
    fn registered_response_is_consumed() {
        let mut parser = ResponseParser::default();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&got);
        parser.expect_response("R", move |resp| sink.borrow_mut().extend_from_slice(resp));

        let out = parser.process(b"a\x1b[12;40Rb");
        assert_eq!(out, b"ab");
        assert_eq!(got.borrow().as_slice(), b"\x1b[12;40R");
        assert!(!parser.has_expected());
    }

    #[test]
    fn response_split_across_chunks() {
        let mut parser = ResponseParser::default();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&got);
        parser.expect_response("c", move |resp| sink.borrow_mut().extend_from_slice(resp));

        assert!(parser.process(b"\x1b[?6").is_empty());
        assert!(parser.is_holding());
        assert!(parser.process(b"2;22").is_empty());
        assert!(parser.process(b"c").is_empty());
        assert_eq!(got.borrow().as_slice(), b"\x1b[?62;22c");
    }

    #[test]
    fn false_start_escape_is_released() {
        let mut parser = ResponseParser::default();
        assert_eq!(parser.process(b"\x1bx"), b"\x1bx");
        assert_eq!(parser.process(b"\x1bOP"), b"\x1bOP");
    }

    #[test]
    fn doubled_escape_releases_the_first() {
        let mut parser = ResponseParser::default();
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&got);
        parser.expect_response("R", move |resp| sink.borrow_mut().extend_from_slice(resp));

        assert_eq!(parser.process(b"\x1b\x1b"), b"\x1b");
        assert_eq!(parser.state(), ResponseState::ExpectingBracket);
        assert!(parser.process(b"[3;7R").is_empty());
        assert_eq!(got.borrow().as_slice(), b"\x1b[3;7R");
    }

    #[test]
    fn lone_escape_is_held_until_flush() {
        let mut parser = ResponseParser::default();
        assert!(parser.process(b"\x1b").is_empty());
        assert_eq!(parser.state(), ResponseState::ExpectingBracket);
        assert_eq!(parser.flush(), b"\x1b");
        assert_eq!(parser.state(), ResponseState::Normal);
    }

    #[test]
    fn sgr_mouse_and_tilde_keys_pass_through() {
        let mut parser = ResponseParser::default();
        assert_eq!(parser.process(b"\x1b[<0;10;5M"), b"\x1b[<0;10;5M");
        assert_eq!(parser.process(b"\x1b[3~"), b"\x1b[3~");
        assert_eq!(parser.process(b"\x1b[1;5C"), b"\x1b[1;5C");
        assert_eq!(parser.process(b"\x1b[I"), b"\x1b[I");
    }

    #[test]
    fn unregistered_cursor_report_waits() {
        let mut parser = ResponseParser::default();
        assert!(parser.process(b"\x1b[1;5R").is_empty());
        assert_eq!(parser.flush(), b"\x1b[1;5R");
    }

    #[test]
    fn held_buffer_is_capped() {
        let mut parser = ResponseParser::new(16);
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat_n(b'9', 40));
        // The first 16 bytes are flushed at the cap; the rest are plain bytes.
        assert_eq!(parser.process(&input), input);
        assert!(!parser.is_holding());
        assert_eq!(parser.state(), ResponseState::Normal);
    }

    #[test]
    fn osc_with_bel_is_released() {
        let mut parser = ResponseParser::default();
        assert_eq!(parser.process(b"\x1b]11;rgb:0/0/0\x07"), b"\x1b]11;rgb:0/0/0\x07");
    }

    #[test]
    fn cancel_expected_stops_consumption() {
        let mut parser = ResponseParser::default();
        parser.expect_response("n", |_| {});
        assert!(parser.cancel_expected());
        assert!(!parser.cancel_expected());
        assert!(parser.process(b"\x1b[0n").is_empty());
        assert_eq!(parser.flush(), b"\x1b[0n");
    }
}
