#![forbid(unsafe_code)]

//! Composed input decoder.
//!
//! [`InputDecoder`] accepts one [`RawRecord`] at a time and produces
//! [`InputEvent`]s. It owns every piece of cross-record state: the response
//! parser and key/mouse parser for ANSI bytes, the key decoder and optional
//! pairing filter for console key records, and the gesture classifier.
//!
//! Time-based behavior (continuous-press repeats, double-click reset, lone
//! `ESC` release, unpaired key release) is driven by the owner: ask for
//! [`next_deadline`](InputDecoder::next_deadline) and call
//! [`poll_timers`](InputDecoder::poll_timers) once it passes.

use std::time::{Duration, Instant};

use crate::event::InputEvent;
use crate::gesture::{
    DEFAULT_CONTINUOUS_PRESS_INTERVAL, DEFAULT_DOUBLE_CLICK_WINDOW, GestureClassifier,
    GestureConfig, GestureState,
};
use crate::input_parser::{AnsiInput, InputParser};
use crate::key_decoder::{DEFAULT_PAIR_TIMEOUT, KeyDecoder, KeyPairingFilter};
use crate::raw::{ConsoleRecord, KeyRecord, MouseRecord, RawRecord};
use crate::response_parser::{DEFAULT_MAX_HELD, ResponseParser, ResponseState};

/// Default time a lone `ESC` is held before it is released as a key.
pub const DEFAULT_ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub double_click_window: Duration,
    pub continuous_press_interval: Duration,
    /// How long an incomplete escape prefix waits for more bytes.
    pub escape_timeout: Duration,
    /// How long a held key-down waits for its key-up.
    pub key_pair_timeout: Duration,
    /// Cap on bytes held by the response parser.
    pub max_held_response: usize,
    /// The source reports double clicks itself.
    pub native_double_click: bool,
    /// The source can deliver unmatched down/up records.
    pub pair_key_events: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            double_click_window: DEFAULT_DOUBLE_CLICK_WINDOW,
            continuous_press_interval: DEFAULT_CONTINUOUS_PRESS_INTERVAL,
            escape_timeout: DEFAULT_ESCAPE_TIMEOUT,
            key_pair_timeout: DEFAULT_PAIR_TIMEOUT,
            max_held_response: DEFAULT_MAX_HELD,
            native_double_click: false,
            pair_key_events: false,
        }
    }
}

impl DecoderConfig {
    #[must_use]
    pub fn with_double_click_window(mut self, window: Duration) -> Self {
        self.double_click_window = window;
        self
    }

    #[must_use]
    pub fn with_continuous_press_interval(mut self, interval: Duration) -> Self {
        self.continuous_press_interval = interval;
        self
    }

    #[must_use]
    pub fn with_escape_timeout(mut self, timeout: Duration) -> Self {
        self.escape_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_held_response(mut self, max: usize) -> Self {
        self.max_held_response = max;
        self
    }

    #[must_use]
    pub fn with_native_double_click(mut self, native: bool) -> Self {
        self.native_double_click = native;
        self
    }

    #[must_use]
    pub fn with_pair_key_events(mut self, pair: bool) -> Self {
        self.pair_key_events = pair;
        self
    }

    fn gesture(&self) -> GestureConfig {
        GestureConfig {
            double_click_window: self.double_click_window,
            continuous_press_interval: self.continuous_press_interval,
            native_double_click: self.native_double_click,
        }
    }
}

/// Raw record to event decoder.
#[derive(Debug)]
pub struct InputDecoder {
    config: DecoderConfig,
    keys: KeyDecoder,
    pairing: Option<KeyPairingFilter>,
    gestures: GestureClassifier,
    responses: ResponseParser,
    parser: InputParser,
    escape_deadline: Option<Instant>,
    scratch_keys: Vec<KeyRecord>,
    scratch_mouse: Vec<crate::event::MouseEvent>,
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl InputDecoder {
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            keys: KeyDecoder::new(),
            pairing: config
                .pair_key_events
                .then(|| KeyPairingFilter::new(config.key_pair_timeout)),
            gestures: GestureClassifier::new(config.gesture()),
            responses: ResponseParser::new(config.max_held_response),
            parser: InputParser::new(),
            escape_deadline: None,
            scratch_keys: Vec::new(),
            scratch_mouse: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    #[must_use]
    pub fn gesture_state(&self) -> &GestureState {
        self.gestures.state()
    }

    /// Enable or disable continuous-press repeats.
    pub fn set_continuous_press(&mut self, enabled: bool) {
        self.gestures.set_continuous_press(enabled);
    }

    /// Register a one-shot expected terminal response (ANSI sources).
    pub fn expect_response(
        &mut self,
        terminator: impl Into<Vec<u8>>,
        callback: impl FnOnce(&[u8]) + 'static,
    ) {
        self.responses.expect_response(terminator, callback);
    }

    /// Decode one raw record, appending events to `out`.
    pub fn decode(&mut self, record: RawRecord, now: Instant, out: &mut Vec<InputEvent>) {
        match record {
            RawRecord::Console(ConsoleRecord::Key(key)) => self.decode_key(key, now, out),
            RawRecord::Console(ConsoleRecord::Mouse(mouse)) => self.decode_mouse(&mouse, now, out),
            RawRecord::Console(ConsoleRecord::WindowBufferSize { cols, rows }) => {
                out.push(InputEvent::Resize { cols, rows });
            }
            RawRecord::Console(ConsoleRecord::Focus(focused)) => out.push(InputEvent::Focus(focused)),
            RawRecord::Ansi(bytes) => {
                let passthrough = self.responses.process(&bytes);
                self.decode_ansi(&passthrough, now, out);
                self.escape_deadline = self.wants_escape_timeout().then(|| now + self.config.escape_timeout);
            }
            RawRecord::LineBuffered(info) => self.keys.decode_opaque(info, out),
        }
    }

    /// Earliest instant at which [`poll_timers`](Self::poll_timers) has work.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        [
            self.gestures.next_deadline(),
            self.pairing.as_ref().and_then(KeyPairingFilter::next_deadline),
            self.escape_deadline,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Run every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        self.scratch_mouse.clear();
        self.gestures.poll_timers(now, &mut self.scratch_mouse);
        out.extend(self.scratch_mouse.drain(..).map(InputEvent::Mouse));

        if let Some(pairing) = self.pairing.as_mut() {
            self.scratch_keys.clear();
            pairing.expire(now, &mut self.scratch_keys);
            for key in &self.scratch_keys {
                self.keys.decode_record(key, out);
            }
        }

        if self.escape_deadline.is_some_and(|deadline| deadline <= now) {
            self.escape_deadline = None;
            let held = self.responses.flush();
            crate::trace!(bytes = held.len(), "releasing held escape prefix");
            self.decode_ansi(&held, now, out);
            self.finish_ansi(now, out);
        }
    }

    /// Release anything held (pairing filter, response parser).
    pub fn flush(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        if let Some(pairing) = self.pairing.as_mut() {
            self.scratch_keys.clear();
            pairing.flush(&mut self.scratch_keys);
            for key in &self.scratch_keys {
                self.keys.decode_record(key, out);
            }
        }
        self.escape_deadline = None;
        let held = self.responses.flush();
        self.decode_ansi(&held, now, out);
        self.finish_ansi(now, out);
    }

    /// Forget all gesture state and pending timers.
    pub fn reset_gestures(&mut self) {
        self.gestures.reset();
    }

    fn decode_key(&mut self, key: KeyRecord, now: Instant, out: &mut Vec<InputEvent>) {
        let Some(pairing) = self.pairing.as_mut() else {
            self.keys.decode_record(&key, out);
            return;
        };
        self.scratch_keys.clear();
        pairing.push(key, now, &mut self.scratch_keys);
        for released in &self.scratch_keys {
            self.keys.decode_record(released, out);
        }
    }

    fn decode_mouse(&mut self, mouse: &MouseRecord, now: Instant, out: &mut Vec<InputEvent>) {
        self.scratch_mouse.clear();
        self.gestures.classify(mouse, now, &mut self.scratch_mouse);
        out.extend(self.scratch_mouse.drain(..).map(InputEvent::Mouse));
    }

    fn decode_ansi(&mut self, bytes: &[u8], now: Instant, out: &mut Vec<InputEvent>) {
        if bytes.is_empty() {
            return;
        }
        let items = self.parser.parse(bytes);
        self.dispatch_ansi(items, now, out);
    }

    fn finish_ansi(&mut self, now: Instant, out: &mut Vec<InputEvent>) {
        let items = self.parser.finish();
        self.dispatch_ansi(items, now, out);
    }

    fn dispatch_ansi(&mut self, items: Vec<AnsiInput>, now: Instant, out: &mut Vec<InputEvent>) {
        for item in items {
            match item {
                AnsiInput::Key(info) => self.keys.decode_opaque(info, out),
                AnsiInput::Mouse(mouse) => self.decode_mouse(&mouse, now, out),
                AnsiInput::Focus(focused) => out.push(InputEvent::Focus(focused)),
            }
        }
    }

    /// Held bytes are released after the escape timeout whether or not a
    /// reply is registered; the registration itself stays until it fires
    /// or is replaced.
    fn wants_escape_timeout(&self) -> bool {
        self.responses.state() != ResponseState::Normal || self.parser.is_pending()
    }
}
