use std::fmt;
use std::sync::Arc;

use super::include::IncludeHandler;
use super::macros::CompiledMacro;

/// Opaque compiler output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob(Vec<u8>);

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Builds a blob from 32-bit words (SPIR-V), in native byte order.
    pub fn from_words(words: &[u32]) -> Self {
        Self(bytemuck::cast_slice(words).to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Shared handle to a compiled artifact.
///
/// The artifact lives as long as its last holder.
pub type Bytecode = Arc<Blob>;

/// How `#include` directives are resolved.
#[derive(Clone, Copy)]
pub enum IncludeResolver<'a> {
    /// A caller-supplied handler.
    Handler(&'a dyn IncludeHandler),
    /// The backend's standard file-based resolver.
    Standard,
}

impl fmt::Debug for IncludeResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Standard => f.write_str("Standard"),
        }
    }
}

/// Everything a backend needs for one compiler invocation.
#[derive(Debug, Clone, Copy)]
pub struct CompileRequest<'a> {
    pub source: &'a [u8],
    pub name: &'a str,
    /// Sentinel-terminated macro array, `None` when there are no macros.
    pub macros: Option<&'a [CompiledMacro]>,
    pub include: IncludeResolver<'a>,
    pub entry_point: &'a str,
    pub target: &'a str,
    pub flags1: u32,
    pub flags2: u32,
}

/// Successful compiler output.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub bytecode: Blob,
    /// Non-fatal diagnostics (warnings), if the compiler produced any.
    pub diagnostics: Option<String>,
}

/// Status code reported by a failed compiler invocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompileStatus {
    /// The source did not compile.
    Failed,
    /// A request field (profile, entry point, encoding) was rejected.
    InvalidArgument,
    /// An included file could not be resolved.
    NotFound,
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Failed => "failed",
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
        })
    }
}

/// Failed compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub status: CompileStatus,
    pub diagnostics: Option<String>,
}

impl CompileFailure {
    pub fn new(status: CompileStatus, diagnostics: impl Into<String>) -> Self {
        Self {
            status,
            diagnostics: Some(diagnostics.into()),
        }
    }
}

/// A shader compiler backend.
pub trait ShaderCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileFailure>;
}

impl<C: ShaderCompiler + ?Sized> ShaderCompiler for &C {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileFailure> {
        (**self).compile(request)
    }
}
