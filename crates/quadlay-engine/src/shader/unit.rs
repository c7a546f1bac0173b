use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use super::compiler::{Bytecode, CompileRequest, CompileStatus, IncludeResolver, ShaderCompiler};
use super::error::ShaderCompilationError;
use super::include::IncludeHandler;
use super::macros::{CompiledMacro, ShaderMacro};
use super::backend::NagaCompiler;

/// Derived state rebuilt by [`ShaderUnit::compile`].
struct CompileCache {
    macros_dirty: bool,
    config_dirty: bool,
    /// Sentinel-terminated projection of `ShaderUnit::macros`; empty when there are none.
    macros: Vec<CompiledMacro>,
    bytecode: Option<Bytecode>,
}

impl Default for CompileCache {
    fn default() -> Self {
        Self {
            macros_dirty: true,
            config_dirty: true,
            macros: Vec::new(),
            bytecode: None,
        }
    }
}

/// Shader configuration plus a lazily rebuilt compilation cache.
///
/// Mutators only mark the unit dirty. [`compile`](Self::compile) invokes the
/// compiler when the configuration changed since the last successful compile and
/// otherwise hands out the cached artifact.
///
/// `compile` takes `&self`; the cache sits in a `RefCell`, so a unit must not be
/// shared across threads (it is `!Sync`). The compiler and include handler may
/// read the unit's state probes while a compile runs, but must not call
/// `compile` on the same unit again.
pub struct ShaderUnit<C = NagaCompiler> {
    code: String,
    entry_point: String,
    name: String,
    target: String,
    macros: Vec<ShaderMacro>,
    flags1: u32,
    flags2: u32,
    include: Option<Rc<dyn IncludeHandler>>,

    compiler: C,
    cache: RefCell<CompileCache>,
}

impl ShaderUnit {
    /// Creates an empty unit compiled by the default backend.
    pub fn new() -> Self {
        Self::with_compiler(NagaCompiler::new())
    }
}

impl Default for ShaderUnit {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ShaderCompiler> ShaderUnit<C> {
    pub fn with_compiler(compiler: C) -> Self {
        Self {
            code: String::new(),
            entry_point: String::new(),
            name: String::new(),
            target: String::new(),
            macros: Vec::new(),
            flags1: 0,
            flags2: 0,
            include: None,
            compiler,
            cache: RefCell::new(CompileCache::default()),
        }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    // ── configuration ─────────────────────────────────────────────────────

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn set_code(&mut self, code: impl Into<String>) -> &mut Self {
        self.code = code.into();
        self.touch()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn set_entry_point(&mut self, entry_point: impl Into<String>) -> &mut Self {
        self.entry_point = entry_point.into();
        self.touch()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self.touch()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<String>) -> &mut Self {
        self.target = target.into();
        self.touch()
    }

    pub fn macros(&self) -> &[ShaderMacro] {
        &self.macros
    }

    pub fn add_macro(&mut self, m: ShaderMacro) -> &mut Self {
        self.macros.push(m);
        self.touch_macros()
    }

    /// Removes every macro named exactly `name`.
    pub fn delete_macro(&mut self, name: &str) -> &mut Self {
        self.macros.retain(|m| m.name != name);
        self.touch_macros()
    }

    pub fn flags1(&self) -> u32 {
        self.flags1
    }

    pub fn set_flags1(&mut self, flags1: u32) -> &mut Self {
        self.flags1 = flags1;
        self.touch()
    }

    pub fn flags2(&self) -> u32 {
        self.flags2
    }

    pub fn set_flags2(&mut self, flags2: u32) -> &mut Self {
        self.flags2 = flags2;
        self.touch()
    }

    pub fn include(&self) -> Option<&Rc<dyn IncludeHandler>> {
        self.include.as_ref()
    }

    /// Sets the `#include` handler; `None` selects the standard file resolver.
    pub fn set_include(&mut self, include: Option<Rc<dyn IncludeHandler>>) -> &mut Self {
        self.include = include;
        self.touch()
    }

    fn touch(&mut self) -> &mut Self {
        self.cache.get_mut().config_dirty = true;
        self
    }

    fn touch_macros(&mut self) -> &mut Self {
        self.cache.get_mut().macros_dirty = true;
        self.touch()
    }

    // ── cache state ───────────────────────────────────────────────────────

    /// True when the next `compile` will invoke the compiler.
    pub fn is_config_dirty(&self) -> bool {
        self.cache.borrow().config_dirty
    }

    /// True when the macro array is stale relative to [`macros`](Self::macros).
    pub fn is_macros_dirty(&self) -> bool {
        self.cache.borrow().macros_dirty
    }

    /// The macro array as last handed to the compiler (sentinel-terminated).
    pub fn compiled_macros(&self) -> Ref<'_, [CompiledMacro]> {
        Ref::map(self.cache.borrow(), |c| c.macros.as_slice())
    }

    /// The cached artifact, if the last compile attempt succeeded.
    pub fn cached_bytecode(&self) -> Option<Bytecode> {
        self.cache.borrow().bytecode.clone()
    }

    // ── compile ───────────────────────────────────────────────────────────

    /// Returns the compiled bytecode, compiling first if the configuration changed.
    ///
    /// On failure the unit stays dirty, so the next call retries.
    pub fn compile(&self) -> Result<Bytecode, ShaderCompilationError> {
        let macros = {
            let mut cache = self.cache.borrow_mut();
            if cache.macros_dirty {
                if self.macros.is_empty() {
                    cache.macros.clear();
                } else {
                    cache.macros = CompiledMacro::project(&self.macros);
                }
                cache.macros_dirty = false;
            }
            if !cache.config_dirty {
                return cached(&cache.bytecode);
            }
            // The cache is not borrowed while the compiler runs.
            cache.macros.clone()
        };

        let include = match &self.include {
            Some(handler) => IncludeResolver::Handler(handler.as_ref()),
            None => IncludeResolver::Standard,
        };
        let request = CompileRequest {
            source: self.code.as_bytes(),
            name: &self.name,
            macros: (!macros.is_empty()).then_some(macros.as_slice()),
            include,
            entry_point: &self.entry_point,
            target: &self.target,
            flags1: self.flags1,
            flags2: self.flags2,
        };

        log::debug!(
            "compiling shader '{}' ({}, entry '{}')",
            self.name,
            self.target,
            self.entry_point
        );

        let result = self.compiler.compile(&request);
        let mut cache = self.cache.borrow_mut();
        match result {
            Ok(output) => {
                if let Some(warnings) = output.diagnostics.as_deref() {
                    log::warn!("shader '{}': {warnings}", self.name);
                }
                cache.bytecode = Some(Arc::new(output.bytecode));
                cache.config_dirty = false;
                cached(&cache.bytecode)
            }
            Err(failure) => {
                cache.bytecode = None;
                Err(failure.into())
            }
        }
    }
}

// Clean state always carries an artifact.
fn cached(bytecode: &Option<Bytecode>) -> Result<Bytecode, ShaderCompilationError> {
    match bytecode {
        Some(bytecode) => Ok(Arc::clone(bytecode)),
        None => Err(ShaderCompilationError::new(CompileStatus::Failed, None)),
    }
}
