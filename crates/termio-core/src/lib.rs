#![forbid(unsafe_code)]

//! Core: events, raw input records, input decoding, and terminal lifecycle.

pub mod decoder;
pub mod event;
pub mod geometry;
pub mod gesture;
pub mod input_parser;
pub mod key_decoder;
pub mod logging;
pub mod raw;
pub mod response_parser;
pub mod terminal_capabilities;
#[cfg(not(target_arch = "wasm32"))]
pub mod terminal_session;
pub mod timer;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, error, info, trace, trace_span, warn};
