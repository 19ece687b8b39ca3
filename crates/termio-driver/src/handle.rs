#![forbid(unsafe_code)]

//! Wait handles shared between the reader thread and the main loop.
//!
//! [`Signal`] is an auto-reset event: [`set`](Signal::set) wakes one waiter
//! (or the next caller of [`wait`](Signal::wait)), and a successful wait
//! consumes the signal. [`CancellationToken`] is a sticky flag checked by
//! the reader thread between blocking calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Auto-reset wait handle.
#[derive(Clone, Default)]
pub struct Signal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal").field("set", &self.is_set()).finish()
    }
}

impl Signal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the signal and wake a waiter.
    pub fn set(&self) {
        let mut flag = self.flag();
        *flag = true;
        self.inner.1.notify_all();
    }

    pub fn reset(&self) {
        *self.flag() = false;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.flag()
    }

    /// Wait until the signal is set or `timeout` elapses (`None` waits
    /// forever). Returns `true`, and clears the signal, if it was set.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let cvar = &self.inner.1;
        let mut flag = self.flag();
        match timeout {
            None => {
                while !*flag {
                    flag = cvar.wait(flag).unwrap_or_else(PoisonError::into_inner);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !*flag {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    // Loop to absorb spurious wakeups.
                    let (guard, _) = cvar
                        .wait_timeout(flag, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    flag = guard;
                }
            }
        }
        *flag = false;
        true
    }
}

/// Sticky cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
