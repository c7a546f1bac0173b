use std::fmt;

use super::compiler::{CompileFailure, CompileStatus};

const PREFIX: &str = "shader compilation failed";

/// Error returned by [`ShaderUnit::compile`](super::ShaderUnit::compile).
///
/// The message is a fixed prefix followed by the compiler's diagnostic text,
/// verbatim, when the compiler produced any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderCompilationError {
    status: CompileStatus,
    message: String,
    diagnostics: Option<String>,
}

impl ShaderCompilationError {
    pub(crate) fn new(status: CompileStatus, diagnostics: Option<String>) -> Self {
        let message = match &diagnostics {
            Some(text) => format!("{PREFIX}: {text}"),
            None => PREFIX.to_string(),
        };
        Self {
            status,
            message,
            diagnostics,
        }
    }

    pub fn status(&self) -> CompileStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw diagnostic text from the compiler, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        self.diagnostics.as_deref()
    }
}

impl From<CompileFailure> for ShaderCompilationError {
    fn from(failure: CompileFailure) -> Self {
        Self::new(failure.status, failure.diagnostics)
    }
}

impl fmt::Display for ShaderCompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.status)
    }
}

impl std::error::Error for ShaderCompilationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_without_diagnostics_is_prefix() {
        let e = ShaderCompilationError::new(CompileStatus::Failed, None);
        assert_eq!(e.message(), "shader compilation failed");
        assert!(e.diagnostics().is_none());
    }

    #[test]
    fn message_ends_with_diagnostics() {
        let e: ShaderCompilationError =
            CompileFailure::new(CompileStatus::NotFound, "missing.glsl").into();
        assert_eq!(e.status(), CompileStatus::NotFound);
        assert!(e.message().starts_with("shader compilation failed"));
        assert!(e.message().ends_with("missing.glsl"));
        assert!(e.to_string().contains("not found"));
    }
}
