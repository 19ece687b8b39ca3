#![forbid(unsafe_code)]

//! Driver layer: platform input adapters, the threaded event pump, the
//! main loop, and the [`ConsoleDriver`] façade that ties input and output
//! together.

pub mod adapter;
pub mod cursor_visibility;
pub mod driver;
pub mod error;
pub mod handle;
pub mod main_loop;
pub mod platform;
pub mod pump;

pub use adapter::InputSource;
pub use cursor_visibility::{CursorVisibility, CursorVisibilityState};
pub use driver::{ConsoleDriver, HEADLESS_SIZE};
pub use error::{DriverError, Result};
pub use handle::{CancellationToken, Signal};
pub use main_loop::{IdleToken, LoopHandle, MainLoop, TimeoutToken};
pub use platform::{DriverConfig, Platform};
pub use pump::EventPump;
