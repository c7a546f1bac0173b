//! GPU rendering for the overlay.
//!
//! - `Canvas`: CPU-painted BGRA8 surface with GDI semantics (painting leaves alpha
//!   alone unless asked)
//! - `QuadRenderer`: uploads a canvas and draws it as one alpha-blended quad using
//!   shaders compiled at runtime by [`crate::shader::ShaderUnit`]

mod canvas;
mod ctx;
mod font;
mod quad;

pub use canvas::{Canvas, Rgba8};
pub use ctx::{RenderCtx, RenderTarget};
pub use font::{Font, FontLoadError};
pub use quad::QuadRenderer;
