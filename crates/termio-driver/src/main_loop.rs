#![forbid(unsafe_code)]

//! Cooperative main loop: timeouts, idle handlers, and cross-thread
//! invocation around the driver's event pump.
//!
//! Every callback runs on the thread that calls [`MainLoop::run`]. Other
//! threads reach the loop only through a [`LoopHandle`], which queues a
//! closure or a stop request and wakes the pump's wait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use termio_core::event::InputEvent;
use termio_core::timer::{DeadlineQueue, TimerId};

use crate::driver::ConsoleDriver;
use crate::handle::Signal;

/// Identifies a timeout registered with [`MainLoop::add_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutToken(u64);

/// Identifies an idle handler registered with [`MainLoop::add_idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdleToken(u64);

type Invocation = Box<dyn FnOnce() + Send>;

struct Timeout {
    token: TimeoutToken,
    period: Duration,
    callback: Box<dyn FnMut() -> bool>,
}

/// Thread-safe handle for waking, stopping, and posting work to a loop.
#[derive(Clone)]
pub struct LoopHandle {
    invocations: Arc<Mutex<Vec<Invocation>>>,
    stop: Arc<AtomicBool>,
    waker: Signal,
}

impl std::fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopHandle")
            .field("stopping", &self.stop.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl LoopHandle {
    /// Run `f` on the loop thread during its next iteration.
    pub fn invoke(&self, f: impl FnOnce() + Send + 'static) {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(f));
        self.waker.set();
    }

    /// Ask the loop to return from [`MainLoop::run`].
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.waker.set();
    }

    pub fn wakeup(&self) {
        self.waker.set();
    }

    fn take_invocations(&self) -> Vec<Invocation> {
        std::mem::take(&mut *self.invocations.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn has_invocations(&self) -> bool {
        !self
            .invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

pub struct MainLoop {
    timers: DeadlineQueue<Timeout>,
    armed: HashMap<TimeoutToken, TimerId>,
    idle: Vec<(IdleToken, Box<dyn FnMut() -> bool>)>,
    handle: LoopHandle,
    next_token: u64,
    events: Vec<InputEvent>,
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("timeouts", &self.armed.len())
            .field("idle", &self.idle.len())
            .finish_non_exhaustive()
    }
}

impl MainLoop {
    /// A loop woken through `waker`, normally
    /// [`ConsoleDriver::waker`].
    #[must_use]
    pub fn new(waker: Signal) -> Self {
        Self {
            timers: DeadlineQueue::new(),
            armed: HashMap::new(),
            idle: Vec::new(),
            handle: LoopHandle {
                invocations: Arc::new(Mutex::new(Vec::new())),
                stop: Arc::new(AtomicBool::new(false)),
                waker,
            },
            next_token: 0,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Call `callback` after `period`; it is re-armed for another `period`
    /// each time it returns `true`.
    pub fn add_timeout(
        &mut self,
        period: Duration,
        callback: impl FnMut() -> bool + 'static,
    ) -> TimeoutToken {
        let token = TimeoutToken(self.next_token);
        self.next_token += 1;
        self.arm(
            Instant::now() + period,
            Timeout {
                token,
                period,
                callback: Box::new(callback),
            },
        );
        token
    }

    /// Cancel a timeout. Returns `false` if it already finished.
    pub fn remove_timeout(&mut self, token: TimeoutToken) -> bool {
        match self.armed.remove(&token) {
            Some(id) => {
                self.timers.cancel(id);
                true
            }
            None => false,
        }
    }

    /// Call `callback` once per iteration, after input is dispatched,
    /// until it returns `false`.
    pub fn add_idle(&mut self, callback: impl FnMut() -> bool + 'static) -> IdleToken {
        let token = IdleToken(self.next_token);
        self.next_token += 1;
        self.idle.push((token, Box::new(callback)));
        token
    }

    pub fn remove_idle(&mut self, token: IdleToken) -> bool {
        let before = self.idle.len();
        self.idle.retain(|(t, _)| *t != token);
        self.idle.len() != before
    }

    /// See [`LoopHandle::invoke`].
    pub fn invoke(&self, f: impl FnOnce() + Send + 'static) {
        self.handle.invoke(f);
    }

    /// See [`LoopHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Iterate until [`stop`](Self::stop) is requested.
    ///
    /// `on_event` sees every event after the driver has handled it (a
    /// resize has already reallocated the buffer).
    pub fn run(
        &mut self,
        driver: &mut ConsoleDriver,
        mut on_event: impl FnMut(&mut ConsoleDriver, &InputEvent),
    ) {
        self.handle.stop.store(false, Ordering::Release);
        tracing::debug!("main loop running");
        while !self.handle.stop.load(Ordering::Acquire) {
            self.run_iteration(driver, &mut on_event);
        }
        tracing::debug!("main loop stopped");
    }

    /// One pass: invocations, wait for input or the next timeout, dispatch,
    /// due timeouts, idle handlers.
    pub fn run_iteration(
        &mut self,
        driver: &mut ConsoleDriver,
        on_event: &mut impl FnMut(&mut ConsoleDriver, &InputEvent),
    ) {
        self.run_invocations();
        if self.handle.stop.load(Ordering::Acquire) {
            return;
        }

        let wait = self.wait_timeout(Instant::now());
        if driver.events_pending(wait) {
            self.events.clear();
            driver.process_events(&mut self.events);
            for event in &self.events {
                on_event(driver, event);
            }
        }

        self.run_invocations();
        self.run_timeouts(Instant::now());
        self.run_idle();
    }

    /// Zero when work is already queued, the next timeout otherwise, and
    /// indefinite when no timeout is armed.
    fn wait_timeout(&mut self, now: Instant) -> Option<Duration> {
        if self.handle.has_invocations() {
            return Some(Duration::ZERO);
        }
        self.timers
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn run_invocations(&mut self) {
        for f in self.handle.take_invocations() {
            f();
        }
    }

    fn run_timeouts(&mut self, now: Instant) {
        // Collect first so a zero-period timeout that re-arms waits for the
        // next iteration.
        let mut due = Vec::new();
        while let Some((_, timeout)) = self.timers.pop_due(now) {
            self.armed.remove(&timeout.token);
            due.push(timeout);
        }
        for mut timeout in due {
            if (timeout.callback)() {
                self.arm(Instant::now() + timeout.period, timeout);
            }
        }
    }

    fn run_idle(&mut self) {
        self.idle.retain_mut(|(_, callback)| callback());
    }

    fn arm(&mut self, deadline: Instant, timeout: Timeout) {
        let token = timeout.token;
        let id = self.timers.schedule(deadline, timeout);
        self.armed.insert(token, id);
    }
}
