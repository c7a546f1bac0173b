//! quadlay engine crate.
//!
//! Runtime shader compilation with dirty-flag caching ([`shader`]), plus the
//! window, GPU and rendering pieces that draw a CPU-painted canvas as a
//! transparent overlay.

pub mod core;
pub mod device;
pub mod logging;
pub mod render;
pub mod shader;
pub mod time;
pub mod window;

pub use wgpu;
