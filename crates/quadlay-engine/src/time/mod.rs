//! Frame timing.
//!
//! - one `FrameClock` per window; call `tick()` once per presented frame
//! - `FpsMeter` turns ticks into a once-per-window frame rate figure

mod fps;
mod frame_clock;

pub use fps::FpsMeter;
pub use frame_clock::{FrameClock, FrameTime};
