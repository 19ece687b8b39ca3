#![forbid(unsafe_code)]

//! Byte-counting writer and per-frame render statistics.

use std::io::{self, Write};
use std::time::Duration;

/// Forwards to `W` while counting bytes accepted and `write` calls made.
///
/// The renderer's goal is few bytes in few writes, so both are tracked.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    bytes: u64,
    writes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            bytes: 0,
            writes: 0,
        }
    }

    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// Calls to the inner `write`, including partial ones.
    #[inline]
    pub fn write_calls(&self) -> u64 {
        self.writes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// What one render pass emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub bytes_emitted: u64,
    /// Calls made to the output's `write`.
    pub write_calls: u64,
    /// Glyphs written, wide glyphs counted once.
    pub cells_emitted: usize,
    /// Cursor-position sequences issued (one per run).
    pub run_count: usize,
    pub attribute_changes: usize,
    pub duration: Duration,
}

impl RenderStats {
    /// True when nothing reached the terminal.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes_emitted == 0
    }

    pub fn bytes_per_cell(&self) -> f64 {
        if self.cells_emitted == 0 {
            return 0.0;
        }
        self.bytes_emitted as f64 / self.cells_emitted as f64
    }

    pub(crate) fn log(&self) {
        termio_core::trace!(
            bytes = self.bytes_emitted,
            writes = self.write_calls,
            cells = self.cells_emitted,
            runs = self.run_count,
            attribute_changes = self.attribute_changes,
            micros = self.duration.as_micros() as u64,
            "render pass"
        );
    }
}
