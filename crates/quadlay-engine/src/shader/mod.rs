//! Runtime shader compilation.
//!
//! The central type is [`ShaderUnit`]: a bundle of shader configuration that
//! compiles lazily and caches its bytecode until the configuration changes.
//!
//! Compilation itself is delegated to a [`ShaderCompiler`]. The default backend,
//! [`NagaCompiler`], turns GLSL into SPIR-V; tests and tools can plug in their own.

mod backend;
mod compiler;
mod error;
pub mod flags;
mod include;
mod macros;
mod pp;
mod profile;
mod unit;

pub use backend::NagaCompiler;
pub use compiler::{
    Blob, Bytecode, CompileFailure, CompileOutput, CompileRequest, CompileStatus,
    IncludeResolver, ShaderCompiler,
};
pub use error::ShaderCompilationError;
pub use include::{FileInclude, IncludeHandler, IncludeKind};
pub use macros::{CompiledMacro, ShaderMacro};
pub use profile::{ShaderStage, TargetProfile};
pub use unit::ShaderUnit;
