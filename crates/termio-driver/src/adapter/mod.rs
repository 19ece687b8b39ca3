#![forbid(unsafe_code)]

//! Platform input adapters.
//!
//! An adapter's only job is raw-record acquisition. It runs on the event
//! pump's reader thread, blocks for at most the timeout it is given, and
//! appends whatever it obtained as [`RawRecord`]s. Decoding, gesture
//! classification, and dispatch all happen later on the main thread.
//!
//! | Adapter            | Records produced                          |
//! |--------------------|-------------------------------------------|
//! | [`AnsiSource`]     | `Ansi` byte chunks, window size on SIGWINCH |
//! | [`ConsoleSource`]  | `Console` key down/up, mouse, size, focus |
//! | [`LineSource`]     | `LineBuffered` keys, `Console` mouse/size |
//! | [`ScriptedSource`] | whatever the test pushes                  |

use std::io;
use std::time::Duration;

use termio_core::decoder::DecoderConfig;
use termio_core::raw::RawRecord;

#[cfg(unix)]
mod ansi;
mod console;
mod scripted;

#[cfg(unix)]
pub use ansi::AnsiSource;
pub use console::{ConsoleSource, LineSource};
pub use scripted::{CaptureWriter, ScriptHandle, ScriptedSource};

/// Raw input acquisition for one platform.
pub trait InputSource: Send + 'static {
    /// Short adapter name for logs.
    fn name(&self) -> &'static str;

    /// Block for at most `timeout` and append any records read to `out`.
    ///
    /// Returning with nothing appended is normal (timeout or a zero-length
    /// read). An error ends the reader thread.
    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()>;

    /// Current terminal size as (columns, rows).
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Adjust decoder settings for what this source can and cannot report.
    fn configure(&self, config: DecoderConfig) -> DecoderConfig {
        config
    }
}

impl InputSource for Box<dyn InputSource> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()> {
        (**self).read(timeout, out)
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        (**self).size()
    }

    fn configure(&self, config: DecoderConfig) -> DecoderConfig {
        (**self).configure(config)
    }
}
