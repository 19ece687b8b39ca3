#![forbid(unsafe_code)]

//! Mouse gesture classification.
//!
//! [`GestureClassifier`] turns normalized [`MouseRecord`] samples into
//! [`MouseEvent`]s: press, release, click, double-click, triple-click,
//! drag, wheel, and move. It is platform independent. Structured console
//! records and SGR mouse reports both arrive here as the same tuple.
//!
//! Rules, first match wins:
//!
//! 1. A native double-click flag with a button down emits `DoubleClicked`.
//! 2. A button goes down with none tracked: `TripleClicked` if a double
//!    click at the same spot is still live, a synthesized `DoubleClicked` if
//!    the last click at the same spot is inside the click window, otherwise
//!    `Pressed` (plus `REPORT_POSITION` if the sample is a motion sample).
//!    A press without motion starts the continuous-press repeat.
//! 3. The tracked button is still down: a motion sample is a drag.
//! 4. The tracked button is released: `Released`, then `Clicked` if the
//!    pointer never left the anchor.
//! 5. Wheel samples emit `WHEELED_*` (shift turns vertical into horizontal).
//! 6. A motion sample with no buttons emits `REPORT_POSITION` when the
//!    position changed.
//!
//! Timers (continuous-press repeat and the double-click reset) live in a
//! [`DeadlineQueue`] drained by [`GestureClassifier::poll_timers`].

use std::time::{Duration, Instant};

use crate::event::{Gesture, MouseButton, MouseEvent, MouseFlags};
use crate::geometry::Point;
use crate::raw::{ControlKeyState, MouseEventFlags, MouseRecord};
use crate::timer::{DeadlineQueue, TimerId};

/// Default double-click window.
pub const DEFAULT_DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// Default continuous-press repeat interval.
pub const DEFAULT_CONTINUOUS_PRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Gesture timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    /// Window for double and triple clicks, and for the double-click reset.
    pub double_click_window: Duration,
    /// Interval between synthetic repeated presses.
    pub continuous_press_interval: Duration,
    /// The source reports double clicks itself; do not synthesize them.
    pub native_double_click: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            double_click_window: DEFAULT_DOUBLE_CLICK_WINDOW,
            continuous_press_interval: DEFAULT_CONTINUOUS_PRESS_INTERVAL,
            native_double_click: false,
        }
    }
}

/// State carried between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GestureState {
    pub last_button_pressed: Option<MouseButton>,
    pub is_pressed: bool,
    /// A release happened at the anchor and a click is pending.
    pub is_released: bool,
    pub is_double_clicked: bool,
    pub anchor_point: Option<Point>,
    pub last_move_point: Point,
}

#[derive(Debug, Clone, Copy)]
enum GestureTimer {
    ContinuousPress { button: MouseButton, flags: MouseFlags },
    DoubleClickReset,
}

#[derive(Debug, Clone, Copy)]
struct LastClick {
    button: MouseButton,
    at: Point,
    when: Instant,
}

/// Mouse gesture state machine.
#[derive(Debug)]
pub struct GestureClassifier {
    config: GestureConfig,
    state: GestureState,
    timers: DeadlineQueue<GestureTimer>,
    continuous: Option<TimerId>,
    double_reset: Option<TimerId>,
    /// Where the live double click happened.
    double_point: Option<Point>,
    last_click: Option<LastClick>,
    /// The current press was consumed by a double or triple click.
    click_consumed: bool,
    wants_continuous: bool,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureClassifier {
    #[must_use]
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::default(),
            timers: DeadlineQueue::new(),
            continuous: None,
            double_reset: None,
            double_point: None,
            last_click: None,
            click_consumed: false,
            wants_continuous: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GestureState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Enable or disable continuous-press repeats for the current consumer.
    pub fn set_continuous_press(&mut self, enabled: bool) {
        self.wants_continuous = enabled;
    }

    #[must_use]
    pub fn wants_continuous_press(&self) -> bool {
        self.wants_continuous
    }

    /// Classify one sample.
    pub fn classify(&mut self, record: &MouseRecord, now: Instant, out: &mut Vec<MouseEvent>) {
        let pos = record.position;
        let modifiers = modifier_flags(record.control_key_state);
        let mut emit = |flags: MouseFlags| out.push(MouseEvent::new(pos.x, pos.y, flags | modifiers));

        let flags = record.flags;
        let moved = flags.contains(MouseEventFlags::MOVED);
        let wheel = flags.intersects(MouseEventFlags::WHEELED | MouseEventFlags::HWHEELED);
        let pressed = if wheel { None } else { record.buttons.primary() };

        // Rule 1: native double click.
        if let (Some(button), true) = (pressed, flags.contains(MouseEventFlags::DOUBLE_CLICK)) {
            self.begin_consumed_press(button, pos);
            self.start_double_click(pos, now);
            emit(MouseFlags::gesture(button, Gesture::DoubleClicked));
            return;
        }

        // Rule 2: press start.
        if let (None, Some(button)) = (self.state.last_button_pressed, pressed) {
            if self.state.is_double_clicked && self.double_point == Some(pos) && !moved {
                self.begin_consumed_press(button, pos);
                self.end_double_click();
                emit(MouseFlags::gesture(button, Gesture::TripleClicked));
                return;
            }
            if !self.config.native_double_click && !moved && self.is_second_click(button, pos, now) {
                self.last_click = None;
                self.begin_consumed_press(button, pos);
                self.start_double_click(pos, now);
                emit(MouseFlags::gesture(button, Gesture::DoubleClicked));
                return;
            }

            self.state.last_button_pressed = Some(button);
            self.state.is_pressed = true;
            self.state.is_released = false;
            self.state.anchor_point = Some(pos);
            self.state.last_move_point = pos;
            self.click_consumed = false;

            let mut press = MouseFlags::gesture(button, Gesture::Pressed);
            if moved {
                press |= MouseFlags::REPORT_POSITION;
            } else {
                let id = self.timers.schedule(
                    now + self.config.continuous_press_interval,
                    GestureTimer::ContinuousPress {
                        button,
                        flags: press | modifiers,
                    },
                );
                self.continuous = Some(id);
            }
            emit(press);
            return;
        }

        if let Some(button) = self.state.last_button_pressed {
            // Rule 3: still held.
            if record.buttons.any_button() && !wheel {
                if moved && pos != self.state.last_move_point {
                    self.stop_continuous();
                    self.state.last_move_point = pos;
                    emit(MouseFlags::gesture(button, Gesture::Pressed) | MouseFlags::REPORT_POSITION);
                }
                return;
            }

            // Rule 4: release (a motion sample with no buttons counts too).
            if !wheel {
                self.stop_continuous();
                self.state.is_pressed = false;
                self.state.last_button_pressed = None;
                emit(MouseFlags::gesture(button, Gesture::Released));

                let at_anchor = self.state.anchor_point == Some(pos);
                self.state.anchor_point = None;
                if at_anchor && !moved && !self.click_consumed {
                    self.state.is_released = true;
                    // A release at the anchor resolves the pending click at once.
                    emit(MouseFlags::gesture(button, Gesture::Clicked));
                    self.state.is_released = false;
                    self.last_click = Some(LastClick {
                        button,
                        at: pos,
                        when: now,
                    });
                }
                self.click_consumed = false;
                if !moved {
                    return;
                }
            }
        }

        // Rule 5: wheel.
        if wheel {
            let delta = record.buttons.wheel_delta();
            let horizontal = flags.contains(MouseEventFlags::HWHEELED);
            let shift = record.control_key_state.shift();
            let wheel_flag = match (horizontal, shift, delta.signum()) {
                (_, _, 0) => return,
                (true, _, d) if d < 0 => MouseFlags::WHEELED_LEFT,
                (true, _, _) => MouseFlags::WHEELED_RIGHT,
                (false, true, d) if d > 0 => MouseFlags::WHEELED_LEFT,
                (false, true, _) => MouseFlags::WHEELED_RIGHT,
                (false, false, d) if d > 0 => MouseFlags::WHEELED_UP,
                (false, false, _) => MouseFlags::WHEELED_DOWN,
            };
            emit(wheel_flag);
            return;
        }

        // Rule 6: plain move.
        if moved && !record.buttons.any_button() && pos != self.state.last_move_point {
            self.state.last_move_point = pos;
            emit(MouseFlags::REPORT_POSITION);
        }
    }

    /// The earliest pending timer.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire due timers; repeated presses are appended to `out`.
    pub fn poll_timers(&mut self, now: Instant, out: &mut Vec<MouseEvent>) {
        while let Some((id, timer)) = self.timers.pop_due(now) {
            match timer {
                GestureTimer::ContinuousPress { button, flags } => {
                    if self.continuous != Some(id) {
                        continue;
                    }
                    self.continuous = None;
                    let still_held =
                        self.state.is_pressed && self.state.last_button_pressed == Some(button);
                    if !still_held || !self.wants_continuous {
                        continue;
                    }
                    let p = self.state.last_move_point;
                    out.push(MouseEvent::new(p.x, p.y, flags));
                    let next = self.timers.schedule(
                        now + self.config.continuous_press_interval,
                        GestureTimer::ContinuousPress { button, flags },
                    );
                    self.continuous = Some(next);
                }
                GestureTimer::DoubleClickReset => {
                    if self.double_reset == Some(id) {
                        self.double_reset = None;
                        self.state.is_double_clicked = false;
                        self.double_point = None;
                    }
                }
            }
        }
    }

    /// Drop all state and pending timers.
    pub fn reset(&mut self) {
        let wants = self.wants_continuous;
        *self = Self::new(self.config);
        self.wants_continuous = wants;
    }

    fn is_second_click(&self, button: MouseButton, pos: Point, now: Instant) -> bool {
        self.last_click.is_some_and(|c| {
            c.button == button
                && c.at == pos
                && now.saturating_duration_since(c.when) <= self.config.double_click_window
        })
    }

    /// Track a press whose release must not produce a click.
    fn begin_consumed_press(&mut self, button: MouseButton, pos: Point) {
        self.stop_continuous();
        self.state.last_button_pressed = Some(button);
        self.state.is_pressed = true;
        self.state.is_released = false;
        self.state.anchor_point = Some(pos);
        self.state.last_move_point = pos;
        self.click_consumed = true;
    }

    fn start_double_click(&mut self, pos: Point, now: Instant) {
        if let Some(id) = self.double_reset.take() {
            self.timers.cancel(id);
        }
        self.state.is_double_clicked = true;
        self.double_point = Some(pos);
        let id = self
            .timers
            .schedule(now + self.config.double_click_window, GestureTimer::DoubleClickReset);
        self.double_reset = Some(id);
    }

    fn end_double_click(&mut self) {
        if let Some(id) = self.double_reset.take() {
            self.timers.cancel(id);
        }
        self.state.is_double_clicked = false;
        self.double_point = None;
        self.last_click = None;
    }

    fn stop_continuous(&mut self) {
        if let Some(id) = self.continuous.take() {
            self.timers.cancel(id);
        }
    }
}

fn modifier_flags(state: ControlKeyState) -> MouseFlags {
    let mut flags = MouseFlags::empty();
    flags.set(MouseFlags::SHIFT, state.shift());
    flags.set(MouseFlags::CTRL, state.ctrl());
    flags.set(MouseFlags::ALT, state.alt());
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::ButtonState;

    fn run(
        classifier: &mut GestureClassifier,
        records: &[(MouseRecord, Instant)],
    ) -> Vec<MouseEvent> {
        let mut out = Vec::new();
        for (record, at) in records {
            classifier.poll_timers(*at, &mut out);
            classifier.classify(record, *at, &mut out);
        }
        out
    }

    fn flags(events: &[MouseEvent]) -> Vec<MouseFlags> {
        events.iter().map(|e| e.flags).collect()
    }

    #[test]
    fn press_release_is_one_click() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(5, 5, MouseButton::Button1), t),
                (MouseRecord::release(5, 5), t + Duration::from_millis(20)),
            ],
        );
        assert_eq!(
            flags(&events),
            vec![
                MouseFlags::BUTTON1_PRESSED,
                MouseFlags::BUTTON1_RELEASED,
                MouseFlags::BUTTON1_CLICKED
            ]
        );
        let clicks: Vec<_> = events.iter().filter(|e| e.has(MouseFlags::BUTTON1_CLICKED)).collect();
        assert_eq!(clicks.len(), 1);
        assert_eq!((clicks[0].x, clicks[0].y), (5, 5));
        assert_eq!(*g.state(), GestureState {
            last_move_point: Point::new(5, 5),
            ..GestureState::default()
        });
    }

    #[test]
    fn second_pair_is_double_click() {
        let t = Instant::now();
        let ms = Duration::from_millis;
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(5, 5, MouseButton::Button1), t),
                (MouseRecord::release(5, 5), t + ms(40)),
                (MouseRecord::press(5, 5, MouseButton::Button1), t + ms(120)),
                (MouseRecord::release(5, 5), t + ms(160)),
            ],
        );
        let clicked = events.iter().filter(|e| e.has(MouseFlags::BUTTON1_CLICKED)).count();
        let doubled = events
            .iter()
            .filter(|e| e.has(MouseFlags::BUTTON1_DOUBLE_CLICKED))
            .count();
        assert_eq!(clicked, 1);
        assert_eq!(doubled, 1);
        assert!(g.state().is_double_clicked);
    }

    #[test]
    fn third_press_is_triple_click() {
        let t = Instant::now();
        let ms = Duration::from_millis;
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(2, 3, MouseButton::Button1), t),
                (MouseRecord::release(2, 3), t + ms(10)),
                (MouseRecord::press(2, 3, MouseButton::Button1), t + ms(20)),
                (MouseRecord::release(2, 3), t + ms(30)),
                (MouseRecord::press(2, 3, MouseButton::Button1), t + ms(40)),
                (MouseRecord::release(2, 3), t + ms(50)),
            ],
        );
        assert!(events.iter().any(|e| e.has(MouseFlags::BUTTON1_TRIPLE_CLICKED)));
        assert!(!g.state().is_double_clicked);
        assert_eq!(
            events.iter().filter(|e| e.has(MouseFlags::BUTTON1_CLICKED)).count(),
            1
        );
    }

    #[test]
    fn slow_second_click_is_plain_click() {
        let t = Instant::now();
        let ms = Duration::from_millis;
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(5, 5, MouseButton::Button1), t),
                (MouseRecord::release(5, 5), t + ms(10)),
                (MouseRecord::press(5, 5, MouseButton::Button1), t + ms(600)),
                (MouseRecord::release(5, 5), t + ms(610)),
            ],
        );
        assert_eq!(
            events.iter().filter(|e| e.has(MouseFlags::BUTTON1_CLICKED)).count(),
            2
        );
    }

    #[test]
    fn native_double_click_flag() {
        let t = Instant::now();
        let mut g = GestureClassifier::new(GestureConfig {
            native_double_click: true,
            ..GestureConfig::default()
        });
        let mut record = MouseRecord::press(1, 1, MouseButton::Button3);
        record.flags = MouseEventFlags::DOUBLE_CLICK;
        let events = run(&mut g, &[(record, t)]);
        assert_eq!(flags(&events), vec![MouseFlags::BUTTON3_DOUBLE_CLICKED]);

        // The double-click flag clears once the window passes.
        let mut out = Vec::new();
        g.poll_timers(t + Duration::from_millis(301), &mut out);
        assert!(!g.state().is_double_clicked);
    }

    #[test]
    fn release_away_from_anchor_is_not_a_click() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(1, 1, MouseButton::Button1), t),
                (MouseRecord::moved(4, 1, ButtonState::BUTTON1), t),
                (MouseRecord::release(4, 1), t),
            ],
        );
        assert_eq!(
            flags(&events),
            vec![
                MouseFlags::BUTTON1_PRESSED,
                MouseFlags::BUTTON1_PRESSED | MouseFlags::REPORT_POSITION,
                MouseFlags::BUTTON1_RELEASED,
            ]
        );
    }

    #[test]
    fn continuous_press_repeats_while_held() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        g.set_continuous_press(true);
        let mut out = Vec::new();
        g.classify(&MouseRecord::press(7, 2, MouseButton::Button1), t, &mut out);
        out.clear();

        g.poll_timers(t + Duration::from_millis(100), &mut out);
        g.poll_timers(t + Duration::from_millis(200), &mut out);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.flags == MouseFlags::BUTTON1_PRESSED && e.x == 7));

        out.clear();
        g.classify(&MouseRecord::release(7, 2), t + Duration::from_millis(250), &mut out);
        g.poll_timers(t + Duration::from_millis(400), &mut out);
        assert!(!out.iter().any(|e| e.flags == MouseFlags::BUTTON1_PRESSED));
        assert_eq!(g.next_deadline(), None);
    }

    #[test]
    fn moved_press_stream_never_repeats() {
        let t = Instant::now();
        let ms = Duration::from_millis;
        let mut g = GestureClassifier::default();
        g.set_continuous_press(true);
        let mut out = Vec::new();
        for i in 0..5u16 {
            let at = t + ms(u64::from(i) * 40);
            g.poll_timers(at, &mut out);
            g.classify(&MouseRecord::moved(i, 0, ButtonState::BUTTON1), at, &mut out);
        }
        assert_eq!(g.next_deadline(), None);
        g.poll_timers(t + ms(1000), &mut out);
        assert!(out.iter().all(|e| e.has(MouseFlags::REPORT_POSITION)));
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn continuous_press_silent_without_consumer() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let mut out = Vec::new();
        g.classify(&MouseRecord::press(0, 0, MouseButton::Button1), t, &mut out);
        out.clear();
        g.poll_timers(t + Duration::from_millis(500), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn wheel_directions() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let up = MouseRecord::new(0, 0, ButtonState::wheel(120), MouseEventFlags::WHEELED);
        let down = MouseRecord::new(0, 0, ButtonState::wheel(-120), MouseEventFlags::WHEELED);
        let left = MouseRecord::new(0, 0, ButtonState::wheel(-120), MouseEventFlags::HWHEELED);
        let shifted = up.with_control_keys(ControlKeyState::SHIFT);
        let events = run(&mut g, &[(up, t), (down, t), (left, t), (shifted, t)]);
        assert_eq!(
            flags(&events),
            vec![
                MouseFlags::WHEELED_UP,
                MouseFlags::WHEELED_DOWN,
                MouseFlags::WHEELED_LEFT,
                MouseFlags::WHEELED_LEFT | MouseFlags::SHIFT,
            ]
        );
    }

    #[test]
    fn duplicate_moves_are_suppressed() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let events = run(
            &mut g,
            &[
                (MouseRecord::moved(3, 3, ButtonState::empty()), t),
                (MouseRecord::moved(3, 3, ButtonState::empty()), t),
                (MouseRecord::moved(4, 3, ButtonState::empty()), t),
            ],
        );
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.flags == MouseFlags::REPORT_POSITION));
    }

    #[test]
    fn modifiers_are_ored_into_every_event() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let keys = ControlKeyState::LEFT_CTRL | ControlKeyState::LEFT_ALT;
        let events = run(
            &mut g,
            &[
                (MouseRecord::press(1, 1, MouseButton::Button2).with_control_keys(keys), t),
                (MouseRecord::release(1, 1).with_control_keys(keys), t),
            ],
        );
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| e.has(MouseFlags::CTRL | MouseFlags::ALT) && !e.has(MouseFlags::SHIFT)));
    }

    #[test]
    fn repeated_held_samples_are_silent() {
        let t = Instant::now();
        let mut g = GestureClassifier::default();
        let press = MouseRecord::press(5, 5, MouseButton::Button1);
        let events = run(&mut g, &[(press, t), (press, t), (press, t)]);
        assert_eq!(flags(&events), vec![MouseFlags::BUTTON1_PRESSED]);
    }
}
