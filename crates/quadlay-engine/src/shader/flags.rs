//! `flags1` bits understood by [`NagaCompiler`](super::NagaCompiler).
//!
//! Other bits, and all of `flags2`, are forwarded untouched and ignored by the
//! default backend.

/// Emit debug names into the SPIR-V output.
pub const DEBUG: u32 = 1 << 0;

/// Skip IR validation before code generation.
pub const SKIP_VALIDATION: u32 = 1 << 1;

/// Flip the Y axis of vertex output positions.
pub const ADJUST_COORDINATE_SPACE: u32 = 1 << 2;
