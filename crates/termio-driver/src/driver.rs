#![forbid(unsafe_code)]

//! Console driver façade.
//!
//! [`ConsoleDriver`] owns the screen buffer, the renderer, the event pump,
//! and the cursor visibility state. The widget layer draws through
//! [`move_to`](ConsoleDriver::move_to) and
//! [`add_str`](ConsoleDriver::add_str), calls
//! [`refresh`](ConsoleDriver::refresh) to push changes to the terminal, and
//! receives input through [`process_events`](ConsoleDriver::process_events),
//! usually via [`MainLoop`](crate::MainLoop).
//!
//! When no terminal is attached (`init` cannot enter raw mode, stdout is a
//! pipe, or the platform is [`Platform::Headless`]) the driver keeps
//! working in headless mode: drawing, refresh, and cursor calls succeed and
//! nothing is written.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use termio_core::event::{InputEvent, KeyCode, KeyModifiers};
use termio_core::geometry::Rect;
use termio_core::raw::{ConsoleKeyInfo, ConsoleRecord, MouseRecord, RawRecord};
use termio_core::terminal_capabilities::TerminalCapabilities;
use termio_core::terminal_session::TerminalSession;
use termio_render::ansi;
use termio_render::attribute::{Attribute, AttributeTable};
use termio_render::buffer::ScreenBuffer;
use termio_render::color::{Color, ColorMode};
use termio_render::counting_writer::RenderStats;
use termio_render::renderer::ScreenRenderer;

#[cfg(unix)]
use crate::adapter::AnsiSource;
use crate::adapter::{ConsoleSource, InputSource, LineSource};
use crate::cursor_visibility::{CursorVisibility, CursorVisibilityState};
use crate::error::{DriverError, Result};
use crate::handle::Signal;
use crate::platform::{DriverConfig, Platform};
use crate::pump::EventPump;

/// Size reported when no terminal is attached.
pub const HEADLESS_SIZE: (u16, u16) = (80, 24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Ended,
}

/// Failures that only cost the current frame.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::BrokenPipe
    )
}

pub struct ConsoleDriver {
    config: DriverConfig,
    platform: Platform,
    lifecycle: Lifecycle,
    buffer: ScreenBuffer,
    renderer: ScreenRenderer,
    attributes: AttributeTable,
    pump: EventPump,
    cursor: CursorVisibilityState,
    output: Option<Box<dyn Write>>,
    source: Option<Box<dyn InputSource>>,
    session: Option<TerminalSession>,
    capabilities: TerminalCapabilities,
    headless_size: (u16, u16),
    last_stats: RenderStats,
}

impl std::fmt::Debug for ConsoleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleDriver")
            .field("platform", &self.platform)
            .field("lifecycle", &self.lifecycle)
            .field("cols", &self.buffer.cols())
            .field("rows", &self.buffer.rows())
            .field("cursor", &self.cursor)
            .field("headless", &self.is_headless())
            .finish_non_exhaustive()
    }
}

impl ConsoleDriver {
    /// A driver for the real terminal. Nothing happens until
    /// [`init`](Self::init).
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            platform: config.platform.resolve(),
            lifecycle: Lifecycle::Created,
            buffer: ScreenBuffer::new(0, 0),
            renderer: ScreenRenderer::new(config.color_mode.unwrap_or_default()),
            attributes: AttributeTable::new(),
            pump: EventPump::new(config.decoder),
            cursor: CursorVisibilityState::new(),
            output: None,
            source: None,
            session: None,
            capabilities: TerminalCapabilities::basic(),
            headless_size: HEADLESS_SIZE,
            last_stats: RenderStats::default(),
            config,
        }
    }

    /// A driver that reads from `source` and writes to `output` instead of
    /// the terminal. The terminal mode is left alone.
    #[must_use]
    pub fn with_io(
        config: DriverConfig,
        source: impl InputSource,
        output: impl Write + 'static,
    ) -> Self {
        let mut driver = Self::new(config);
        driver.source = Some(Box::new(source));
        driver.output = Some(Box::new(output));
        driver
    }

    /// A driver with no terminal and a fixed size.
    #[must_use]
    pub fn headless(cols: u16, rows: u16) -> Self {
        let mut driver = Self::new(DriverConfig::default().with_platform(Platform::Headless));
        driver.headless_size = (cols, rows);
        driver
    }

    /// Bring the terminal up and return its size.
    ///
    /// A missing terminal is not an error: the driver switches to headless
    /// mode and reports [`HEADLESS_SIZE`] (or the size given to
    /// [`headless`](Self::headless)).
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyRunning`] on a second call, or an I/O error
    /// from an injected source.
    pub fn init(&mut self) -> Result<(u16, u16)> {
        if self.lifecycle != Lifecycle::Created {
            return Err(DriverError::AlreadyRunning);
        }

        let (cols, rows) = if let Some(source) = self.source.take() {
            let size = source.size()?;
            self.pump.setup(source)?;
            size
        } else if self.platform == Platform::Headless {
            self.headless_size
        } else {
            match self.open_terminal() {
                Ok(size) => size,
                Err(err) => {
                    tracing::info!(error = %err, "no usable terminal, running headless");
                    self.platform = Platform::Headless;
                    self.output = None;
                    self.session = None;
                    self.headless_size
                }
            }
        };

        let mode = self
            .config
            .color_mode
            .unwrap_or_else(|| ColorMode::from_capabilities(&self.capabilities));
        self.renderer.set_color_mode(mode);
        self.buffer.resize(cols, rows);
        self.lifecycle = Lifecycle::Running;
        self.clear_screen()?;

        tracing::info!(
            platform = ?self.platform,
            cols,
            rows,
            color_mode = ?mode,
            "console driver initialized"
        );
        Ok((cols, rows))
    }

    fn open_terminal(&mut self) -> Result<(u16, u16)> {
        if !io::stdout().is_terminal() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "stdout is not a terminal").into());
        }
        let caps = TerminalCapabilities::detect();
        // Only ask for reports the terminal is known to send.
        let mut options = self.config.session;
        options.mouse_capture &= caps.mouse_sgr;
        options.focus_events &= caps.focus_events;
        let session = TerminalSession::new(options)?;
        let source: Box<dyn InputSource> = match self.platform {
            #[cfg(unix)]
            Platform::Ansi => Box::new(AnsiSource::open()?),
            Platform::WindowsConsole => Box::new(ConsoleSource::new()),
            _ => Box::new(LineSource::new()),
        };
        let size = source.size().or_else(|_| session.size())?;
        tracing::info!(adapter = source.name(), "input adapter ready");
        self.pump.setup(source)?;
        self.session = Some(session);
        self.capabilities = caps;
        self.output = Some(Box::new(io::stdout()));
        Ok(size)
    }

    /// Reset the terminal to blank default-colored cells and treat the
    /// buffer as already shown.
    fn clear_screen(&mut self) -> Result<()> {
        self.write_output(|w| {
            ansi::sgr_reset(w)?;
            ansi::erase_display(w)
        })?;
        self.renderer.invalidate();
        self.renderer.render(&mut self.buffer, &mut io::sink())?;
        Ok(())
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn is_headless(&self) -> bool {
        self.output.is_none()
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.buffer.cols()
    }

    #[must_use]
    pub fn rows(&self) -> u16 {
        self.buffer.rows()
    }

    #[must_use]
    pub fn buffer(&self) -> &ScreenBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        self.renderer.color_mode()
    }

    /// Statistics of the most recent [`refresh`](Self::refresh).
    #[must_use]
    pub fn last_render_stats(&self) -> &RenderStats {
        &self.last_stats
    }

    #[must_use]
    pub fn cursor_state(&self) -> &CursorVisibilityState {
        &self.cursor
    }

    /// Reallocate the buffer for a new terminal size. Every cell is blank
    /// and dirty afterwards.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        tracing::debug!(cols, rows, "resizing screen buffer");
        self.buffer.resize(cols, rows);
        self.renderer.invalidate();
        if let Err(err) = self.write_output(|w| ansi::erase_display(w)) {
            tracing::debug!(error = %err, "erase after resize failed");
        }
    }

    pub fn move_to(&mut self, col: u16, row: u16) {
        self.buffer.move_to(col, row);
    }

    pub fn add_rune(&mut self, ch: char) {
        self.buffer.add_rune(ch);
    }

    pub fn add_str(&mut self, text: &str) {
        self.buffer.add_str(text);
    }

    /// Intern a color pair for this driver.
    pub fn make_attribute(&mut self, foreground: Color, background: Color) -> Attribute {
        self.attributes.make(foreground, background)
    }

    /// The colors an attribute made by this driver stands for.
    #[must_use]
    pub fn decode_attribute(&self, attribute: Attribute) -> Option<(Color, Color)> {
        self.attributes.decode(attribute.value())
    }

    #[must_use]
    pub fn attribute(&self) -> Attribute {
        self.buffer.attribute()
    }

    pub fn set_attribute(&mut self, attribute: Attribute) {
        self.buffer.set_attribute(attribute);
    }

    #[must_use]
    pub fn clip(&self) -> Rect {
        self.buffer.clip()
    }

    pub fn set_clip(&mut self, clip: Rect) {
        self.buffer.set_clip(clip);
    }

    /// Blank every cell with the default attribute.
    pub fn clear_contents(&mut self) {
        self.buffer.clear_contents();
    }

    /// Render every dirty cell, then place the cursor.
    ///
    /// A write that fails with a transient error (interrupted, would block,
    /// broken pipe) drops the frame: the whole buffer is marked dirty so the
    /// next refresh repaints it.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotInitialized`] before `init`, or any other write
    /// failure.
    pub fn refresh(&mut self) -> Result<()> {
        self.ensure_running()?;

        if self.cursor.initial().is_none() {
            // Nothing has moved the cursor yet, so the terminal still shows
            // its own default.
            if let Some(parked) = self.cursor.capture_initial(CursorVisibility::Default) {
                self.write_visibility(parked)?;
            }
        }

        let rendered = match self.output.as_mut() {
            Some(out) => self.renderer.render(&mut self.buffer, out),
            None => self.renderer.render(&mut self.buffer, &mut io::sink()),
        };
        match rendered {
            Ok(stats) => {
                tracing::trace!(
                    bytes = stats.bytes_emitted,
                    runs = stats.run_count,
                    cells = stats.cells_emitted,
                    attribute_changes = stats.attribute_changes,
                    "frame rendered"
                );
                self.last_stats = stats;
            }
            Err(err) if is_transient(&err) => {
                tracing::debug!(error = %err, "frame dropped, repainting next refresh");
                self.buffer.mark_all_dirty();
                self.renderer.invalidate();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        self.update_cursor()
    }

    /// Move the terminal cursor to the buffer's logical cursor.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotInitialized`] before `init`, or a non-transient
    /// write failure.
    pub fn update_cursor(&mut self) -> Result<()> {
        self.ensure_running()?;
        let placed = match self.output.as_mut() {
            Some(out) => self.renderer.place_cursor(&self.buffer, out).map(drop),
            None => Ok(()),
        };
        match placed {
            Err(err) if is_transient(&err) => {
                tracing::debug!(error = %err, "cursor update dropped");
                Ok(())
            }
            other => other.map_err(DriverError::from),
        }
    }

    /// Request a cursor visibility. Returns whether it was applied now;
    /// before the first refresh the request is parked and applied then.
    pub fn set_cursor_visibility(&mut self, visibility: CursorVisibility) -> bool {
        if !self.cursor.request(visibility) {
            return false;
        }
        if let Err(err) = self.write_visibility(visibility) {
            tracing::debug!(error = %err, "cursor visibility write failed");
        }
        true
    }

    #[must_use]
    pub fn cursor_visibility(&self) -> Option<CursorVisibility> {
        self.cursor.current()
    }

    fn write_visibility(&mut self, visibility: CursorVisibility) -> Result<()> {
        self.write_output(|w| visibility.write_to(w))
    }

    fn write_output(&mut self, f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> Result<()> {
        let Some(out) = self.output.as_mut() else {
            return Ok(());
        };
        let mut seq = Vec::with_capacity(32);
        f(&mut seq)?;
        match out.write_all(&seq).and_then(|()| out.flush()) {
            Err(err) if is_transient(&err) => {
                tracing::debug!(error = %err, "terminal write dropped");
                Ok(())
            }
            other => other.map_err(DriverError::from),
        }
    }

    /// Handle that wakes [`events_pending`](Self::events_pending) from any
    /// thread.
    #[must_use]
    pub fn waker(&self) -> Signal {
        self.pump.waker()
    }

    pub fn wakeup(&self) {
        self.pump.wakeup();
    }

    /// Wait up to `timeout` (`None`: until woken) for input. Returns `true`
    /// when [`process_events`](Self::process_events) has work.
    pub fn events_pending(&mut self, timeout: Option<Duration>) -> bool {
        self.pump.events_pending(timeout)
    }

    /// Decode pending input and append the events to `out`.
    ///
    /// Resize events are applied to the buffer before they are returned.
    pub fn process_events(&mut self, out: &mut Vec<InputEvent>) {
        let start = out.len();
        self.pump.iteration(out);
        for event in &out[start..] {
            if let InputEvent::Resize { cols, rows } = *event {
                if (cols, rows) != (self.buffer.cols(), self.buffer.rows()) {
                    self.resize(cols, rows);
                }
            }
        }
    }

    /// Turn continuous-press repeats on or off for the current consumer.
    pub fn set_wants_continuous_press(&mut self, wants: bool) {
        self.pump.decoder_mut().set_continuous_press(wants);
    }

    /// Register a one-shot handler for a terminal response ending in
    /// `terminator`.
    pub fn expect_response(
        &mut self,
        terminator: impl Into<Vec<u8>>,
        callback: impl FnOnce(&[u8]) + 'static,
    ) {
        self.pump.decoder_mut().expect_response(terminator, callback);
    }

    /// Ask an ANSI terminal where its cursor is. `callback` receives the
    /// 0-indexed (col, row), or `None` if the reply is malformed.
    ///
    /// Returns `false` on platforms that cannot answer.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotInitialized`] before `init`, or a write failure.
    pub fn query_cursor_position(
        &mut self,
        callback: impl FnOnce(Option<(u16, u16)>) + 'static,
    ) -> Result<bool> {
        self.ensure_running()?;
        if self.platform != Platform::Ansi || self.is_headless() {
            return Ok(false);
        }
        self.expect_response(ansi::CURSOR_POSITION_TERMINATOR, move |reply| {
            callback(parse_cursor_report(reply));
        });
        self.write_output(|w| w.write_all(ansi::CURSOR_POSITION_QUERY))?;
        Ok(true)
    }

    /// Inject a keystroke as if typed.
    ///
    /// # Errors
    ///
    /// [`DriverError::InvalidKey`] when `key` is a character other than
    /// `ch`, a function key outside F1-F24, or `Null` without a character.
    pub fn send_key(
        &mut self,
        ch: char,
        key: KeyCode,
        shift: bool,
        alt: bool,
        ctrl: bool,
    ) -> Result<()> {
        self.ensure_running()?;
        let code = match key {
            KeyCode::Null if ch == '\0' => return Err(DriverError::InvalidKey { key, ch }),
            KeyCode::Null => KeyCode::Char(ch),
            KeyCode::Char(c) if ch != '\0' && c != ch => {
                return Err(DriverError::InvalidKey { key, ch });
            }
            KeyCode::F(n) if !(1..=24).contains(&n) => {
                return Err(DriverError::InvalidKey { key, ch });
            }
            other => other,
        };
        let mut modifiers = KeyModifiers::empty();
        modifiers.set(KeyModifiers::SHIFT, shift);
        modifiers.set(KeyModifiers::ALT, alt);
        modifiers.set(KeyModifiers::CTRL, ctrl);
        self.pump
            .inject(RawRecord::LineBuffered(ConsoleKeyInfo::new(code, modifiers)));
        Ok(())
    }

    /// Inject a raw mouse sample; it goes through gesture classification
    /// like real input.
    ///
    /// # Errors
    ///
    /// [`DriverError::OutOfBounds`] when the position is off screen.
    pub fn send_mouse(&mut self, record: MouseRecord) -> Result<()> {
        self.ensure_running()?;
        let (x, y) = (record.position.x, record.position.y);
        let (cols, rows) = (self.buffer.cols(), self.buffer.rows());
        if x >= cols || y >= rows {
            return Err(DriverError::OutOfBounds { x, y, cols, rows });
        }
        self.pump.inject(RawRecord::Console(ConsoleRecord::Mouse(record)));
        Ok(())
    }

    /// Restore the terminal: stop input, restore the cursor, reset colors,
    /// leave the alternate screen, and leave raw mode. Safe to call twice.
    ///
    /// # Errors
    ///
    /// The first non-transient write failure. The terminal mode is
    /// restored regardless.
    pub fn end(&mut self) -> Result<()> {
        if self.lifecycle != Lifecycle::Running {
            return Ok(());
        }
        self.lifecycle = Lifecycle::Ended;
        self.pump.teardown();

        let restore = self.cursor.restore_target();
        let written = self.write_output(|w| {
            if let Some(visibility) = restore {
                visibility.write_to(w)?;
            }
            ansi::sgr_reset(w)
        });

        if let Some(session) = self.session.take() {
            drop(session);
        }
        tracing::info!("console driver ended");
        written
    }

    fn ensure_running(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Running => Ok(()),
            Lifecycle::Created | Lifecycle::Ended => Err(DriverError::NotInitialized),
        }
    }
}

impl Drop for ConsoleDriver {
    fn drop(&mut self) {
        if let Err(err) = self.end() {
            tracing::warn!(error = %err, "terminal restore failed");
        }
    }
}

/// Parse `ESC [ row ; col R` into a 0-indexed (col, row).
fn parse_cursor_report(reply: &[u8]) -> Option<(u16, u16)> {
    let body = reply.strip_prefix(b"\x1b[")?.strip_suffix(b"R")?;
    let body = std::str::from_utf8(body).ok()?;
    let (row, col) = body.split_once(';')?;
    let row: u16 = row.parse().ok()?;
    let col: u16 = col.parse().ok()?;
    Some((col.checked_sub(1)?, row.checked_sub(1)?))
}
