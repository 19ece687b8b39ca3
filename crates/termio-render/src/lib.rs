#![forbid(unsafe_code)]

//! Render layer: colors, attributes, the cell buffer, escape encoding, and
//! the dirty-cell renderer.

pub mod ansi;
pub mod attribute;
pub mod buffer;
pub mod cell;
pub mod color;
pub mod counting_writer;
pub mod renderer;
