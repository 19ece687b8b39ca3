#![forbid(unsafe_code)]

//! Event pump: bridges a blocking platform read into the cooperative loop.
//!
//! One reader thread owns the [`InputSource`]. Each time a read yields
//! records it appends them to the shared queue, sets `data_ready`, and then
//! parks on `probe` until the main thread asks for more. The main thread
//! calls [`events_pending`](EventPump::events_pending), which sets `probe`
//! and waits on `data_ready`, and then [`iteration`](EventPump::iteration),
//! which drains the queue and decodes every record in arrival order.
//!
//! ```text
//! reader thread                       main thread
//! ─────────────                       ───────────
//! source.read() ──push──▶ queue ◀──drain── iteration()
//!        │                  │
//!        └─ data_ready.set ─┴──▶ events_pending() waits here
//! probe.wait ◀──────────────────── events_pending() sets probe
//! ```
//!
//! Decoder timers (continuous press, double-click reset, held escape, held
//! key-down) are folded into the wait timeout, so they fire on the main
//! thread and interleave with input in one serialized order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use termio_core::decoder::{DecoderConfig, InputDecoder};
use termio_core::event::InputEvent;
use termio_core::raw::RawRecord;

use crate::adapter::InputSource;
use crate::error::{DriverError, Result};
use crate::handle::{CancellationToken, Signal};

/// Longest a single blocking read may last before the reader re-checks for
/// cancellation.
pub const READ_SLICE: Duration = Duration::from_millis(50);

type Queue = Arc<Mutex<VecDeque<RawRecord>>>;

fn lock(queue: &Queue) -> MutexGuard<'_, VecDeque<RawRecord>> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background reader plus queue plus decoder.
#[derive(Debug)]
pub struct EventPump {
    queue: Queue,
    data_ready: Signal,
    probe: Signal,
    cancel: CancellationToken,
    reader: Option<thread::JoinHandle<()>>,
    decoder: InputDecoder,
    drained: Vec<RawRecord>,
}

impl Default for EventPump {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl EventPump {
    #[must_use]
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            data_ready: Signal::new(),
            probe: Signal::new(),
            cancel: CancellationToken::new(),
            reader: None,
            decoder: InputDecoder::new(config),
            drained: Vec::new(),
        }
    }

    /// Start the reader thread for `source`.
    ///
    /// The decoder is rebuilt with the source's view of the configuration.
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyRunning`] if a reader is active, or an I/O
    /// error if the thread cannot be spawned.
    pub fn setup<S: InputSource>(&mut self, source: S) -> Result<()> {
        if self.reader.is_some() {
            return Err(DriverError::AlreadyRunning);
        }
        self.decoder = InputDecoder::new(source.configure(*self.decoder.config()));
        self.cancel = CancellationToken::new();
        self.probe.reset();

        let name = source.name();
        let queue = Arc::clone(&self.queue);
        let data_ready = self.data_ready.clone();
        let probe = self.probe.clone();
        let cancel = self.cancel.clone();
        let handle = thread::Builder::new()
            .name(format!("termio-{name}-reader"))
            .spawn(move || read_loop(source, &queue, &data_ready, &probe, &cancel))?;
        self.reader = Some(handle);
        tracing::info!(adapter = name, "event pump started");
        Ok(())
    }

    /// Whether a reader thread is attached.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.reader.is_some()
    }

    #[must_use]
    pub fn decoder(&self) -> &InputDecoder {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut InputDecoder {
        &mut self.decoder
    }

    /// Handle that wakes [`events_pending`](Self::events_pending) from any
    /// thread.
    #[must_use]
    pub fn waker(&self) -> Signal {
        self.data_ready.clone()
    }

    /// Queue a record as if the reader had produced it.
    pub fn inject(&self, record: RawRecord) {
        lock(&self.queue).push_back(record);
        self.data_ready.set();
    }

    /// Let the reader continue, then wait up to `timeout` (`None` waits
    /// until woken) for input or a decoder deadline.
    ///
    /// Returns `true` when [`iteration`](Self::iteration) has work.
    pub fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        self.probe.set();

        let now = Instant::now();
        if self.has_work(now) {
            return true;
        }
        let decoder_wait = self
            .decoder
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now));
        let wait = match (timeout, decoder_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.data_ready.wait(wait);

        self.has_work(Instant::now())
    }

    fn has_work(&mut self, now: Instant) -> bool {
        !lock(&self.queue).is_empty()
            || self.decoder.next_deadline().is_some_and(|deadline| deadline <= now)
    }

    /// Drain the queue, decode every record, run due decoder timers, and
    /// append the resulting events to `out` in order.
    pub fn iteration(&mut self, out: &mut Vec<InputEvent>) {
        // Records pushed after this point set the signal again.
        self.data_ready.reset();
        self.drained.clear();
        self.drained.extend(lock(&self.queue).drain(..));

        let now = Instant::now();
        for record in self.drained.drain(..) {
            self.decoder.decode(record, now, out);
        }
        self.decoder.poll_timers(now, out);
    }

    /// Wake the main thread without touching any state.
    pub fn wakeup(&self) {
        self.data_ready.set();
    }

    /// Stop the reader, join it, and drop anything still queued.
    pub fn teardown(&mut self) {
        self.cancel.cancel();
        self.probe.set();
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                tracing::warn!("input reader thread panicked");
            }
            tracing::info!("event pump stopped");
        }
        lock(&self.queue).clear();
        self.data_ready.reset();
        self.probe.reset();
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn read_loop<S: InputSource>(
    mut source: S,
    queue: &Queue,
    data_ready: &Signal,
    probe: &Signal,
    cancel: &CancellationToken,
) {
    let mut batch = Vec::new();
    while !cancel.is_cancelled() {
        match source.read(READ_SLICE, &mut batch) {
            Ok(()) => {}
            Err(err) => {
                tracing::warn!(adapter = source.name(), error = %err, "input reader stopped");
                return;
            }
        }
        if batch.is_empty() {
            continue;
        }
        lock(queue).extend(batch.drain(..));
        data_ready.set();

        // Hold off until the consumer asks for more.
        while !probe.wait(Some(READ_SLICE)) {
            if cancel.is_cancelled() {
                return;
            }
        }
    }
}
