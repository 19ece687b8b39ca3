#![forbid(unsafe_code)]

//! Native ANSI adapter: raw bytes from the controlling terminal.
//!
//! Bytes are read from `/dev/tty` after `poll(2)` reports them ready and
//! handed over untouched; escape parsing happens in the decoder. Resize is
//! discovered through SIGWINCH when the handler can be installed, and by
//! comparing the window size on every read otherwise.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::sync::mpsc;
use std::time::Duration;

use signal_hook::consts::signal::SIGWINCH;
use signal_hook::iterator::Signals;

use termio_core::raw::{ConsoleRecord, RawRecord};

use super::InputSource;

const READ_CHUNK: usize = 4096;

// A dedicated signal thread keeps `sigaction` out of this crate.
#[derive(Debug)]
struct ResizeSignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl ResizeSignalGuard {
    fn new(tx: mpsc::SyncSender<()>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("termio-sigwinch".into())
            .spawn(move || {
                for _ in signals.forever() {
                    // One pending notification is enough; the size is
                    // re-read when it is consumed.
                    let _ = tx.try_send(());
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for ResizeSignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Byte-stream input from an ANSI/VT terminal.
#[derive(Debug)]
pub struct AnsiSource {
    tty: File,
    resize_rx: Option<mpsc::Receiver<()>>,
    _resize_guard: Option<ResizeSignalGuard>,
    last_size: Option<(u16, u16)>,
    buf: Vec<u8>,
}

impl AnsiSource {
    /// Open the controlling terminal and watch for SIGWINCH.
    ///
    /// # Errors
    ///
    /// Fails when the process has no controlling terminal.
    pub fn open() -> io::Result<Self> {
        let tty = File::open("/dev/tty")?;
        let mut source = Self::from_file(tty);

        let (tx, rx) = mpsc::sync_channel(1);
        match ResizeSignalGuard::new(tx) {
            Ok(guard) => {
                source.resize_rx = Some(rx);
                source._resize_guard = Some(guard);
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGWINCH unavailable, polling window size");
            }
        }
        source.last_size = source.size().ok();
        Ok(source)
    }

    /// Read from an arbitrary file (a pipe or socket in tests). No signal
    /// handler is installed.
    #[must_use]
    pub fn from_file(tty: File) -> Self {
        Self {
            tty,
            resize_rx: None,
            _resize_guard: None,
            last_size: None,
            buf: vec![0; READ_CHUNK],
        }
    }

    fn check_resize(&mut self, out: &mut Vec<RawRecord>) {
        let signalled = match &self.resize_rx {
            Some(rx) => rx.try_recv().is_ok(),
            None => self.last_size.is_some(),
        };
        if !signalled {
            return;
        }
        let Ok(size) = self.size() else {
            return;
        };
        if self.last_size != Some(size) {
            self.last_size = Some(size);
            let (cols, rows) = size;
            out.push(RawRecord::Console(ConsoleRecord::WindowBufferSize { cols, rows }));
        }
    }

    fn poll_ready(&self, timeout: Duration) -> io::Result<bool> {
        let mut fds = [nix::poll::PollFd::new(
            self.tty.as_fd(),
            nix::poll::PollFlags::POLLIN,
        )];
        let timeout_ms: u16 = timeout.as_millis().try_into().unwrap_or(u16::MAX);
        match nix::poll::poll(&mut fds, nix::poll::PollTimeout::from(timeout_ms)) {
            Ok(n) => Ok(n > 0),
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(err) => Err(io::Error::other(err)),
        }
    }
}

impl InputSource for AnsiSource {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn read(&mut self, timeout: Duration, out: &mut Vec<RawRecord>) -> io::Result<()> {
        self.check_resize(out);
        if !out.is_empty() || !self.poll_ready(timeout)? {
            return Ok(());
        }
        match self.tty.read(&mut self.buf) {
            Ok(0) => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "terminal closed")),
            Ok(n) => {
                out.push(RawRecord::Ansi(self.buf[..n].to_vec()));
                Ok(())
            }
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let ws = rustix::termios::tcgetwinsize(&self.tty)?;
        if ws.ws_col == 0 || ws.ws_row == 0 {
            return Err(io::Error::other("terminal reported a zero window size"));
        }
        Ok((ws.ws_col, ws.ws_row))
    }
}
