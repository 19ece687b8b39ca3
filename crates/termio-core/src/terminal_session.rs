#![forbid(unsafe_code)]

//! Terminal session lifecycle guard.
//!
//! [`TerminalSession`] puts the controlling terminal into raw mode and
//! enables the requested modes. Every mode that is switched on is recorded
//! in a process-wide [`ActiveModes`] set, and [`restore_active`] undoes
//! exactly that set. It runs when the session is dropped, from the panic
//! hook, and (on unix) when SIGINT or SIGTERM arrives.
//!
//! | Mode             | Enable                        | Disable                       |
//! |------------------|-------------------------------|-------------------------------|
//! | Alternate screen | `CSI ? 1049 h`                | `CSI ? 1049 l`                |
//! | Mouse (SGR)      | `CSI ? 1000;1002;1003;1006 h` | `CSI ? 1000;1002;1003;1006 l` |
//! | Focus events     | `CSI ? 1004 h`                | `CSI ? 1004 l`                |
//! | Show cursor      | n/a                           | `CSI ? 25 h`                  |

use std::io::{self, Write};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};

/// Modes enabled when a session starts. All default to off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionOptions {
    pub alternate_screen: bool,
    /// Any-event mouse tracking (bare motion included) with SGR coordinates.
    pub mouse_capture: bool,
    pub focus_events: bool,
}

impl SessionOptions {
    /// Full-screen interactive defaults.
    #[must_use]
    pub const fn fullscreen() -> Self {
        Self {
            alternate_screen: true,
            mouse_capture: true,
            focus_events: true,
        }
    }

    fn requested(self) -> ActiveModes {
        let mut modes = ActiveModes::empty();
        modes.set(ActiveModes::ALT_SCREEN, self.alternate_screen);
        modes.set(ActiveModes::MOUSE, self.mouse_capture);
        modes.set(ActiveModes::FOCUS, self.focus_events);
        modes
    }
}

bitflags! {
    /// Terminal modes currently switched on by a session.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActiveModes: u8 {
        const RAW        = 1 << 0;
        const ALT_SCREEN = 1 << 1;
        const MOUSE      = 1 << 2;
        const FOCUS      = 1 << 3;
    }
}

static ACTIVE: AtomicU8 = AtomicU8::new(0);

impl ActiveModes {
    /// Modes recorded as on for this process.
    #[must_use]
    pub fn current() -> Self {
        Self::from_bits_truncate(ACTIVE.load(Ordering::Acquire))
    }

    fn mark_on(self) {
        ACTIVE.fetch_or(self.bits(), Ordering::AcqRel);
    }

    fn take_all() -> Self {
        Self::from_bits_truncate(ACTIVE.swap(0, Ordering::AcqRel))
    }
}

/// Sequence that switches a single escape-driven mode on.
fn enable_sequence(mode: ActiveModes) -> &'static [u8] {
    if mode == ActiveModes::ALT_SCREEN {
        b"\x1b[?1049h"
    } else if mode == ActiveModes::MOUSE {
        b"\x1b[?1000;1002;1003;1006h"
    } else if mode == ActiveModes::FOCUS {
        b"\x1b[?1004h"
    } else {
        b""
    }
}

/// Bytes that undo `modes`, innermost first. The cursor is always shown
/// again before leaving the alternate screen.
#[must_use]
pub fn restore_sequence(modes: ActiveModes) -> Vec<u8> {
    let mut out = Vec::with_capacity(48);
    if modes.contains(ActiveModes::FOCUS) {
        out.extend_from_slice(b"\x1b[?1004l");
    }
    if modes.contains(ActiveModes::MOUSE) {
        out.extend_from_slice(b"\x1b[?1000;1002;1003;1006l");
    }
    if !modes.is_empty() {
        out.extend_from_slice(b"\x1b[?25h");
    }
    if modes.contains(ActiveModes::ALT_SCREEN) {
        out.extend_from_slice(b"\x1b[?1049l");
    }
    out
}

/// Undo every mode recorded as active and forget them.
///
/// Calling it again with nothing active is a no-op.
///
/// # Errors
///
/// Returns the first write or raw-mode error. Raw mode is still left even
/// if writing the escape sequences failed.
pub fn restore_active() -> io::Result<()> {
    let modes = ActiveModes::take_all();
    if modes.is_empty() {
        return Ok(());
    }
    let mut stdout = io::stdout();
    let written = stdout
        .write_all(&restore_sequence(modes))
        .and_then(|()| stdout.flush());
    let raw = if modes.contains(ActiveModes::RAW) {
        crossterm::terminal::disable_raw_mode()
    } else {
        Ok(())
    };
    crate::info!(modes = ?modes, "terminal restored");
    written.and(raw)
}

/// RAII owner of raw mode and the enabled terminal modes.
///
/// Only one session should exist at a time.
#[derive(Debug)]
pub struct TerminalSession {
    options: SessionOptions,
    #[cfg(unix)]
    signals: Option<TerminationWatcher>,
}

impl TerminalSession {
    /// Enter raw mode and enable the requested modes.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode or any requested mode cannot be enabled.
    /// Whatever was enabled before the failure is restored by `Drop`.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        install_panic_hook();

        crossterm::terminal::enable_raw_mode()?;
        ActiveModes::RAW.mark_on();

        #[cfg(unix)]
        let signals = match TerminationWatcher::spawn() {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                let _ = restore_active();
                return Err(err);
            }
        };
        let session = Self {
            options,
            #[cfg(unix)]
            signals,
        };

        let mut stdout = io::stdout();
        for mode in options.requested().iter() {
            stdout.write_all(enable_sequence(mode))?;
            mode.mark_on();
        }
        stdout.flush()?;
        crate::debug!(modes = ?ActiveModes::current(), "terminal session started");

        Ok(session)
    }

    /// Current terminal size as (columns, rows).
    pub fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    #[must_use]
    pub fn options(&self) -> SessionOptions {
        self.options
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        #[cfg(unix)]
        drop(self.signals.take());
        if let Err(err) = restore_active() {
            crate::warn!(error = %err, "terminal restore incomplete");
        }
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = restore_active();
            previous(info);
        }));
    });
}

/// Restores the terminal and exits when the process is told to terminate.
#[cfg(unix)]
#[derive(Debug)]
struct TerminationWatcher {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl TerminationWatcher {
    fn spawn() -> io::Result<Self> {
        let mut signals =
            signal_hook::iterator::Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("termio-signals".into())
            .spawn(move || {
                let Some(signal) = signals.forever().next() else {
                    return;
                };
                crate::warn!(signal, "termination signal received, restoring terminal");
                let _ = restore_active();
                std::process::exit(128 + signal);
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for TerminationWatcher {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                crate::warn!("signal watcher panicked");
            }
        }
    }
}
