use std::io;
use std::path::{Path, PathBuf};

use super::compiler::{CompileFailure, CompileStatus, IncludeResolver};
use super::pp::{strip_comments, Conditionals, Defines, Directive};

/// Maximum `#include` nesting before expansion gives up.
const MAX_INCLUDE_DEPTH: usize = 32;

/// Form of an `#include` directive.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IncludeKind {
    /// `#include "path"`
    Local,
    /// `#include <path>`
    System,
}

/// Resolves `#include` directives to source text.
pub trait IncludeHandler {
    /// Opens `path`. `parent` is the file containing the directive, or `None` for
    /// the top-level source.
    fn open(&self, kind: IncludeKind, path: &str, parent: Option<&Path>) -> io::Result<String>;
}

/// The standard file-based include handler.
///
/// Local includes resolve against the including file's directory; the top-level
/// source and system includes resolve against `root`.
#[derive(Debug, Clone, Default)]
pub struct FileInclude {
    root: PathBuf,
}

impl FileInclude {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Handler rooted at the directory of `source_name`, if it names a path.
    pub(crate) fn for_source(source_name: &str) -> Self {
        let root = Path::new(source_name)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { root }
    }

    pub(crate) fn resolve(&self, kind: IncludeKind, path: &str, parent: Option<&Path>) -> PathBuf {
        let base = match (kind, parent.and_then(Path::parent)) {
            (IncludeKind::Local, Some(dir)) => self.root.join(dir),
            _ => self.root.clone(),
        };
        base.join(path)
    }
}

impl IncludeHandler for FileInclude {
    fn open(&self, kind: IncludeKind, path: &str, parent: Option<&Path>) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(kind, path, parent))
    }
}

/// Source text after `#include` expansion, with the origin of every line.
#[derive(Debug, Clone)]
pub(crate) struct Expanded {
    pub(crate) text: String,
    origins: Vec<LineOrigin>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct LineOrigin {
    /// Included file, or `None` for the top-level source.
    file: Option<PathBuf>,
    line: u32,
}

impl Expanded {
    /// Maps a 1-based line of `text` to the file it came from and the 1-based
    /// line within that file.
    pub(crate) fn locate(&self, line: u32) -> (Option<&Path>, u32) {
        match (line as usize).checked_sub(1).and_then(|i| self.origins.get(i)) {
            Some(origin) => (origin.file.as_deref(), origin.line),
            None => (None, line),
        }
    }
}

/// Expands `#include` lines in `source`, recursively.
///
/// Only directives in active preprocessor regions are followed: `#include` inside
/// comments or inside `#if` branches that are off under `defines` (plus any
/// `#define`s seen so far) is blanked out instead. The preprocessor state is
/// shared across files, so include guards work.
///
/// The standard resolver is a [`FileInclude`] rooted next to `name`. The
/// `parent` handed to a handler is the includer's path relative to that root.
pub(crate) fn expand_includes<'d>(
    source: &str,
    name: &str,
    resolver: IncludeResolver<'_>,
    defines: impl IntoIterator<Item = (&'d str, &'d str)>,
) -> Result<Expanded, CompileFailure> {
    let standard;
    let handler: &dyn IncludeHandler = match resolver {
        IncludeResolver::Handler(h) => h,
        IncludeResolver::Standard => {
            standard = FileInclude::for_source(name);
            &standard
        }
    };

    let mut expander = Expander {
        handler,
        defines: defines
            .into_iter()
            .map(|(n, d)| (n.to_string(), d.to_string()))
            .collect(),
        out: Expanded {
            text: String::with_capacity(source.len()),
            origins: Vec::new(),
        },
    };
    expander.expand(source, None, 0)?;
    Ok(expander.out)
}

struct Expander<'h> {
    handler: &'h dyn IncludeHandler,
    defines: Defines,
    out: Expanded,
}

impl Expander<'_> {
    fn expand(&mut self, source: &str, file: Option<&Path>, depth: usize) -> Result<(), CompileFailure> {
        let mut in_comment = false;
        let mut conds = Conditionals::default();

        for (index, line) in source.lines().enumerate() {
            let code = strip_comments(line, &mut in_comment);
            let Some(directive) = Directive::parse(&code) else {
                self.emit(line, file, index);
                continue;
            };

            let Directive::Include(kind, path) = directive else {
                conds.apply(directive, &mut self.defines);
                self.emit(line, file, index);
                continue;
            };

            if !conds.active() {
                self.emit("", file, index);
                continue;
            }

            if depth >= MAX_INCLUDE_DEPTH {
                return Err(CompileFailure::new(
                    CompileStatus::Failed,
                    format!("#include nested too deeply at '{path}'"),
                ));
            }

            let text = self.handler.open(kind, path, file).map_err(|e| {
                CompileFailure::new(CompileStatus::NotFound, format!("cannot open include '{path}': {e}"))
            })?;

            let child = match file.and_then(Path::parent) {
                Some(dir) if kind == IncludeKind::Local => dir.join(path),
                _ => PathBuf::from(path),
            };
            self.expand(&text, Some(&child), depth + 1)?;
        }
        Ok(())
    }

    fn emit(&mut self, line: &str, file: Option<&Path>, index: usize) {
        self.out.text.push_str(line);
        self.out.text.push('\n');
        self.out.origins.push(LineOrigin {
            file: file.map(Path::to_path_buf),
            line: index as u32 + 1,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// In-memory include handler keyed by the resolved path.
    struct MemoryInclude {
        files: HashMap<PathBuf, String>,
        resolver: FileInclude,
    }

    impl MemoryInclude {
        fn new(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(p, s)| (PathBuf::from(p), s.to_string()))
                    .collect(),
                resolver: FileInclude::default(),
            }
        }
    }

    impl IncludeHandler for MemoryInclude {
        fn open(&self, kind: IncludeKind, path: &str, parent: Option<&Path>) -> io::Result<String> {
            let resolved = self.resolver.resolve(kind, path, parent);
            self.files
                .get(&resolved)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, resolved.display().to_string()))
        }
    }

    // ── expansion ─────────────────────────────────────────────────────────

    #[test]
    fn expands_nested_relative_to_includer() {
        let mem = MemoryInclude::new(&[
            ("lib/common.glsl", "#include \"math.glsl\"\nfloat common;"),
            ("lib/math.glsl", "float math;"),
        ]);
        let out = expand_includes(
            "#include \"lib/common.glsl\"\nvoid main() {}",
            "shader",
            IncludeResolver::Handler(&mem),
            [],
        )
        .unwrap();
        assert_eq!(out.text, "float math;\nfloat common;\nvoid main() {}\n");
    }

    #[test]
    fn system_include_uses_root() {
        let mem = MemoryInclude::new(&[
            ("sub/a.glsl", "#include <b.glsl>"),
            ("b.glsl", "float b;"),
        ]);
        let out = expand_includes("#include \"sub/a.glsl\"", "x", IncludeResolver::Handler(&mem), [])
            .unwrap();
        assert_eq!(out.text, "float b;\n");
    }

    #[test]
    fn missing_include_is_not_found() {
        let mem = MemoryInclude::new(&[]);
        let err = expand_includes("#include \"gone.glsl\"", "x", IncludeResolver::Handler(&mem), [])
            .unwrap_err();
        assert_eq!(err.status, CompileStatus::NotFound);
        assert!(err.diagnostics.unwrap().contains("gone.glsl"));
    }

    #[test]
    fn recursive_include_is_capped() {
        let mem = MemoryInclude::new(&[("self.glsl", "#include \"self.glsl\"")]);
        let err = expand_includes("#include \"self.glsl\"", "x", IncludeResolver::Handler(&mem), [])
            .unwrap_err();
        assert_eq!(err.status, CompileStatus::Failed);
    }

    #[test]
    fn include_in_block_comment_is_not_followed() {
        let mem = MemoryInclude::new(&[]);
        let src = "/*\n#include \"old.glsl\"\n*/\nfloat x;";
        let out = expand_includes(src, "x", IncludeResolver::Handler(&mem), []).unwrap();
        assert_eq!(out.text, "/*\n#include \"old.glsl\"\n*/\nfloat x;\n");
    }

    #[test]
    fn include_in_inactive_branch_is_blanked() {
        let mem = MemoryInclude::new(&[]);
        let src = "#ifdef USE_EXTRA\n#include \"extra.glsl\"\n#endif";
        let out = expand_includes(src, "x", IncludeResolver::Handler(&mem), []).unwrap();
        assert_eq!(out.text, "#ifdef USE_EXTRA\n\n#endif\n");
    }

    #[test]
    fn request_defines_select_branch() {
        let mem = MemoryInclude::new(&[("extra.glsl", "float extra;")]);
        let src = "#ifdef USE_EXTRA\n#include \"extra.glsl\"\n#else\n#include \"gone.glsl\"\n#endif";
        let out = expand_includes(src, "x", IncludeResolver::Handler(&mem), [("USE_EXTRA", "1")])
            .unwrap();
        assert_eq!(out.text, "#ifdef USE_EXTRA\nfloat extra;\n#else\n\n#endif\n");
    }

    #[test]
    fn source_defines_select_branch() {
        let mem = MemoryInclude::new(&[("extra.glsl", "float extra;")]);
        let src = "#define USE_EXTRA\n#if defined(USE_EXTRA)\n#include \"extra.glsl\"\n#endif";
        let out = expand_includes(src, "x", IncludeResolver::Handler(&mem), []).unwrap();
        assert!(out.text.contains("float extra;"));
    }

    #[test]
    fn include_guards_stop_mutual_recursion() {
        let mem = MemoryInclude::new(&[
            ("a.glsl", "#ifndef A_GLSL\n#define A_GLSL\n#include \"b.glsl\"\nfloat a;\n#endif"),
            ("b.glsl", "#ifndef B_GLSL\n#define B_GLSL\n#include \"a.glsl\"\nfloat b;\n#endif"),
        ]);
        let out = expand_includes("#include \"a.glsl\"", "x", IncludeResolver::Handler(&mem), [])
            .unwrap();
        assert_eq!(out.text.matches("float b;").count(), 1);
    }

    // ── line mapping ──────────────────────────────────────────────────────

    #[test]
    fn locate_maps_lines_back_to_files() {
        let mem = MemoryInclude::new(&[("h.glsl", "h1\nh2")]);
        let out = expand_includes("#include \"h.glsl\"\nline2", "x", IncludeResolver::Handler(&mem), [])
            .unwrap();
        assert_eq!(out.text, "h1\nh2\nline2\n");
        assert_eq!(out.locate(1), (Some(Path::new("h.glsl")), 1));
        assert_eq!(out.locate(2), (Some(Path::new("h.glsl")), 2));
        assert_eq!(out.locate(3), (None, 2));
        assert_eq!(out.locate(99), (None, 99));
    }

    #[test]
    fn for_source_roots_next_to_name() {
        let inc = FileInclude::for_source("shaders/quad.vert");
        assert_eq!(
            inc.resolve(IncludeKind::System, "x.glsl", None),
            Path::new("shaders").join("x.glsl")
        );
        let bare = FileInclude::for_source("QuadVS");
        assert_eq!(bare.resolve(IncludeKind::Local, "x.glsl", None), PathBuf::from("x.glsl"));
    }

    #[test]
    fn standard_resolver_reads_files() {
        let dir = std::env::temp_dir().join(format!("quadlay-include-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub/inc.glsl"), "#include \"leaf.glsl\"\nfloat inc;").unwrap();
        std::fs::write(dir.join("sub/leaf.glsl"), "float leaf;").unwrap();

        let name = dir.join("main.glsl");
        let out = expand_includes(
            "#include \"sub/inc.glsl\"",
            name.to_str().unwrap(),
            IncludeResolver::Standard,
            [],
        )
        .unwrap();
        assert_eq!(out.text, "float leaf;\nfloat inc;\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
