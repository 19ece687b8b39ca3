#![forbid(unsafe_code)]

//! termio public facade crate.
//!
//! Re-exports the types an application needs to bring a terminal up, draw
//! into the cell buffer, and react to input, plus a small prelude.

// --- Core re-exports -------------------------------------------------------

pub use termio_core::decoder::{DecoderConfig, InputDecoder};
pub use termio_core::event::{
    Gesture, InputEvent, KeyCode, KeyEvent, KeyModifiers, ModifierKey, MouseButton, MouseEvent,
    MouseFlags,
};
pub use termio_core::geometry::{Point, Rect};
pub use termio_core::raw::{ConsoleKeyInfo, MouseRecord, RawRecord};
pub use termio_core::terminal_capabilities::TerminalCapabilities;
pub use termio_core::terminal_session::{SessionOptions, TerminalSession};

// --- Render re-exports -----------------------------------------------------

pub use termio_render::attribute::{Attribute, AttributeTable};
pub use termio_render::buffer::ScreenBuffer;
pub use termio_render::cell::Cell;
pub use termio_render::color::{Ansi16, Color, ColorMode, Rgb};
pub use termio_render::counting_writer::RenderStats;
pub use termio_render::renderer::ScreenRenderer;

// --- Driver re-exports -----------------------------------------------------

pub use termio_driver::{
    CancellationToken, ConsoleDriver, CursorVisibility, DriverConfig, DriverError, EventPump,
    IdleToken, InputSource, LoopHandle, MainLoop, Platform, Signal, TimeoutToken,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for termio apps.
pub type Error = DriverError;

/// Standard result type for termio APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Ansi16, Attribute, Color, ConsoleDriver, CursorVisibility, DriverConfig, Error,
        InputEvent, KeyCode, KeyEvent, KeyModifiers, MainLoop, MouseEvent, MouseFlags, Rect,
        Result,
    };

    pub use crate::{core, driver, render};
}

pub use termio_core as core;
pub use termio_driver as driver;
pub use termio_render as render;
