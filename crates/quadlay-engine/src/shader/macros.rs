/// A preprocessor definition passed to the shader compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderMacro {
    pub name: String,
    pub definition: String,
}

impl ShaderMacro {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// One slot of the macro array handed to a compiler backend.
///
/// The array is terminated by a sentinel slot whose fields are both `None`.
/// Backends should walk it with [`CompiledMacro::defines`] rather than relying on
/// the slice length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledMacro {
    pub name: Option<String>,
    pub definition: Option<String>,
}

impl CompiledMacro {
    pub const SENTINEL: Self = Self {
        name: None,
        definition: None,
    };

    pub fn is_sentinel(&self) -> bool {
        self.name.is_none() && self.definition.is_none()
    }

    /// Projects `macros` into a sentinel-terminated array of `macros.len() + 1` slots.
    pub(crate) fn project(macros: &[ShaderMacro]) -> Vec<Self> {
        macros
            .iter()
            .map(|m| Self {
                name: Some(m.name.clone()),
                definition: Some(m.definition.clone()),
            })
            .chain(std::iter::once(Self::SENTINEL))
            .collect()
    }

    /// Iterates `(name, definition)` pairs up to the sentinel.
    ///
    /// A slot with a name but no definition yields an empty definition.
    pub fn defines(array: &[Self]) -> impl Iterator<Item = (&str, &str)> {
        array.iter().map_while(|m| {
            let name = m.name.as_deref()?;
            Some((name, m.definition.as_deref().unwrap_or("")))
        })
    }
}
