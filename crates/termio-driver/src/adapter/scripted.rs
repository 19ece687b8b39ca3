#![forbid(unsafe_code)]

//! Scripted input and captured output for driving the engine without a
//! terminal.

use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use termio_core::decoder::DecoderConfig;
use termio_core::raw::RawRecord;

use super::InputSource;

/// Input source fed from a channel.
///
/// Every batch pushed through a [`ScriptHandle`] is delivered as one read.
/// Once every handle is dropped and the script is drained, `read` reports
/// `BrokenPipe` and the reader thread ends.
#[derive(Debug)]
pub struct ScriptedSource {
    rx: mpsc::Receiver<Vec<RawRecord>>,
    size: (u16, u16),
    native_double_click: bool,
    pair_key_events: bool,
}

/// Producer side of a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    tx: mpsc::Sender<Vec<RawRecord>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> (Self, ScriptHandle) {
        let (tx, rx) = mpsc::channel();
        let source = Self {
            rx,
            size: (cols, rows),
            native_double_click: false,
            pair_key_events: false,
        };
        (source, ScriptHandle { tx })
    }

    /// A source that replays `records` one per read and then ends.
    #[must_use]
    pub fn from_records(cols: u16, rows: u16, records: impl IntoIterator<Item = RawRecord>) -> Self {
        let (source, handle) = Self::new(cols, rows);
        for record in records {
            handle.push(record);
        }
        source
    }

    /// Behave like a source that reports double clicks itself.
    #[must_use]
    pub fn with_native_double_click(mut self, native: bool) -> Self {
        self.native_double_click = native;
        self
    }

    /// Behave like a source that can deliver unmatched key down/up records.
    #[must_use]
    pub fn with_pair_key_events(mut self, pair: bool) -> Self {
        self.pair_key_events = pair;
        self
    }
}

impl ScriptHandle {
    /// Queue one record as its own read. Returns `false` once the source
    /// is gone.
    pub fn push(&self, record: RawRecord) -> bool {
        self.push_batch(vec![record])
    }

    /// Queue several records delivered together by a single read.
    pub fn push_batch(&self, records: Vec<RawRecord>) -> bool {
        self.tx.send(records).is_ok()
    }
}

impl InputSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()> {
        match self.rx.recv_timeout(timeout) {
            Ok(batch) => {
                out.extend(batch);
                Ok(())
            }
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(()),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "script finished",
            )),
        }
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok(self.size)
    }

    fn configure(&self, config: DecoderConfig) -> DecoderConfig {
        config
            .with_native_double_click(self.native_double_click)
            .with_pair_key_events(self.pair_key_events)
    }
}

/// Cloneable in-memory writer; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CaptureWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
    fail_next: Arc<Mutex<Option<io::ErrorKind>>>,
}

impl CaptureWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Return and clear everything written so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.bytes.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Make the next write fail with `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(kind);
    }
}

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(kind) = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(io::Error::new(kind, "injected write failure"));
        }
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
