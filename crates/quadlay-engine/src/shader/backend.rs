use std::error::Error as StdError;
use std::fmt::Write;

use naga::back::spv;
use naga::front::glsl;
use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::compiler::{
    Blob, CompileFailure, CompileOutput, CompileRequest, CompileStatus, ShaderCompiler,
};
use super::flags;
use super::include::expand_includes;
use super::macros::CompiledMacro;
use super::profile::{ShaderStage, TargetProfile};

/// Default backend: Vulkan-flavoured GLSL in, SPIR-V out, via `naga`.
///
/// The request is handled in four steps:
/// - `#include` expansion through the request's resolver
/// - GLSL parsing with the request's macros as preprocessor defines
/// - IR validation (unless [`flags::SKIP_VALIDATION`] is set)
/// - SPIR-V generation for the requested entry point
#[derive(Debug, Copy, Clone, Default)]
pub struct NagaCompiler;

impl NagaCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl ShaderCompiler for NagaCompiler {
    fn compile(&self, request: &CompileRequest<'_>) -> Result<CompileOutput, CompileFailure> {
        let name = display_name(request.name);

        let profile = TargetProfile::parse(request.target).ok_or_else(|| {
            CompileFailure::new(
                CompileStatus::InvalidArgument,
                format!("{name}: unknown target profile '{}'", request.target),
            )
        })?;
        let stage = naga_stage(profile.stage);

        let source = std::str::from_utf8(request.source).map_err(|e| {
            CompileFailure::new(
                CompileStatus::InvalidArgument,
                format!("{name}: source is not valid UTF-8: {e}"),
            )
        })?;
        let defines = request.macros.into_iter().flat_map(CompiledMacro::defines);
        let expanded = expand_includes(source, request.name, request.include, defines)?;
        let source = expanded.text.as_str();

        let mut options = glsl::Options::from(stage);
        if let Some(macros) = request.macros {
            options.defines = CompiledMacro::defines(macros)
                .map(|(n, d)| (n.to_string(), d.to_string()))
                .collect();
        }

        let module = glsl::Frontend::default()
            .parse(&options, source)
            .map_err(|e| {
                let text = e
                    .errors
                    .iter()
                    .map(|err| {
                        let loc = err.meta.location(source);
                        let (file, line) = expanded.locate(loc.line_number);
                        let file = file.map_or_else(|| name.to_string(), |f| f.display().to_string());
                        format!("{file}({line},{}): error: {}", loc.line_position, err.kind)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                CompileFailure::new(CompileStatus::Failed, text)
            })?;

        let has_entry = module
            .entry_points
            .iter()
            .any(|ep| ep.name == request.entry_point && ep.stage == stage);
        if !has_entry {
            return Err(CompileFailure::new(
                CompileStatus::InvalidArgument,
                format!(
                    "{name}: entry point '{}' not found for {:?} stage",
                    request.entry_point, profile.stage
                ),
            ));
        }

        let validation = if request.flags1 & flags::SKIP_VALIDATION != 0 {
            ValidationFlags::empty()
        } else {
            ValidationFlags::all()
        };
        let info = Validator::new(validation, Capabilities::all())
            .validate(&module)
            .map_err(|e| failed(name, &e))?;

        let mut spv_options = spv::Options::default();
        spv_options.lang_version = profile.version;
        spv_options
            .flags
            .set(spv::WriterFlags::DEBUG, request.flags1 & flags::DEBUG != 0);
        spv_options.flags.set(
            spv::WriterFlags::ADJUST_COORDINATE_SPACE,
            request.flags1 & flags::ADJUST_COORDINATE_SPACE != 0,
        );

        let pipeline = spv::PipelineOptions {
            shader_stage: stage,
            entry_point: request.entry_point.to_string(),
        };

        let words = spv::write_vec(&module, &info, &spv_options, Some(&pipeline))
            .map_err(|e| failed(name, &e))?;

        Ok(CompileOutput {
            bytecode: Blob::from_words(&words),
            diagnostics: None,
        })
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "<shader>" } else { name }
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
        ShaderStage::Compute => naga::ShaderStage::Compute,
    }
}

/// Formats `err` and its source chain as `name: outer: inner: ...`.
fn failed<E: StdError>(name: &str, err: &E) -> CompileFailure {
    let mut text = format!("{name}: {err}");
    let mut cause = err.source();
    while let Some(c) = cause {
        let _ = write!(text, ": {c}");
        cause = c.source();
    }
    CompileFailure::new(CompileStatus::Failed, text)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::path::Path;
    use std::rc::Rc;

    use super::*;
    use crate::shader::{IncludeHandler, IncludeKind, IncludeResolver, ShaderMacro, ShaderUnit};

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    const VS: &str = "#version 450
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;
layout(location = 0) out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = vec4(a_position * SCALE, 1.0);
}
";

    const FS: &str = "#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 o_color;
layout(set = 0, binding = 0) uniform texture2D t_canvas;
layout(set = 0, binding = 1) uniform sampler s_canvas;
void main() {
    vec4 color = texture(sampler2D(t_canvas, s_canvas), v_uv);
    o_color = color;
}
";

    fn request<'a>(source: &'a str, target: &'a str, macros: Option<&'a [CompiledMacro]>) -> CompileRequest<'a> {
        CompileRequest {
            source: source.as_bytes(),
            name: "test",
            macros,
            include: IncludeResolver::Standard,
            entry_point: "main",
            target,
            flags1: 0,
            flags2: 0,
        }
    }

    fn first_word(blob: &Blob) -> u32 {
        let b = blob.as_bytes();
        u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
    }

    #[test]
    fn compiles_vertex_with_define() {
        let macros = CompiledMacro::project(&[ShaderMacro::new("SCALE", "0.5")]);
        let out = NagaCompiler.compile(&request(VS, "vs_1_0", Some(&macros))).unwrap();
        assert_eq!(out.bytecode.len() % 4, 0);
        assert_eq!(first_word(&out.bytecode), SPIRV_MAGIC);
    }

    #[test]
    fn compiles_fragment() {
        let out = NagaCompiler.compile(&request(FS, "ps_1_0", None)).unwrap();
        assert_eq!(first_word(&out.bytecode), SPIRV_MAGIC);
    }

    #[test]
    fn missing_define_fails() {
        let err = NagaCompiler.compile(&request(VS, "vs_1_0", None)).unwrap_err();
        assert_eq!(err.status, CompileStatus::Failed);
        assert!(err.diagnostics.unwrap().starts_with("test("));
    }

    #[test]
    fn syntax_error_fails() {
        let err = NagaCompiler
            .compile(&request("#version 450\nvoid main() { int x = ; }\n", "ps_1_0", None))
            .unwrap_err();
        assert_eq!(err.status, CompileStatus::Failed);
        assert!(err.diagnostics.is_some());
    }

    #[test]
    fn unknown_profile_is_invalid_argument() {
        let err = NagaCompiler.compile(&request(FS, "ps_4_0", None)).unwrap_err();
        assert_eq!(err.status, CompileStatus::InvalidArgument);
        assert!(err.diagnostics.unwrap().contains("ps_4_0"));
    }

    #[test]
    fn wrong_entry_point_is_invalid_argument() {
        let mut req = request(FS, "ps_1_0", None);
        req.entry_point = "PS";
        let err = NagaCompiler.compile(&req).unwrap_err();
        assert_eq!(err.status, CompileStatus::InvalidArgument);
    }

    #[test]
    fn non_utf8_source_is_invalid_argument() {
        let mut req = request("", "vs_1_0", None);
        req.source = &[0xff, 0xfe, 0x00];
        let err = NagaCompiler.compile(&req).unwrap_err();
        assert_eq!(err.status, CompileStatus::InvalidArgument);
    }

    // ── through ShaderUnit ────────────────────────────────────────────────

    struct Headers(HashMap<&'static str, &'static str>);

    impl IncludeHandler for Headers {
        fn open(&self, _kind: IncludeKind, path: &str, _parent: Option<&Path>) -> io::Result<String> {
            self.0
                .get(path)
                .map(|s| s.to_string())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
        }
    }

    #[test]
    fn unit_compiles_with_include_and_macros() {
        let headers = Headers(HashMap::from([(
            "io.glsl",
            "layout(location = 0) in vec3 a_position;\nlayout(location = 1) in vec2 a_uv;\nlayout(location = 0) out vec2 v_uv;",
        )]));

        let mut unit = ShaderUnit::new();
        unit.set_code(
            "#version 450\n#include \"io.glsl\"\nvoid main() { v_uv = a_uv; gl_Position = vec4(a_position * SCALE, 1.0); }\n",
        )
        .set_entry_point("main")
        .set_name("QuadVS")
        .set_target("vs_1_0")
        .set_flags1(flags::DEBUG)
        .add_macro(ShaderMacro::new("SCALE", "1.0"))
        .set_include(Some(Rc::new(headers)));

        let a = unit.compile().unwrap();
        let b = unit.compile().unwrap();
        assert!(std::sync::Arc::ptr_eq(&a, &b));
        assert_eq!(first_word(&a), SPIRV_MAGIC);
    }

    #[test]
    fn unit_surfaces_compiler_text() {
        let mut unit = ShaderUnit::new();
        unit.set_code("#version 450\nvoid main() { undefined_fn(); }\n")
            .set_entry_point("main")
            .set_name("Broken")
            .set_target("ps_1_0");

        let err = unit.compile().unwrap_err();
        assert_eq!(err.status(), CompileStatus::Failed);
        assert!(err.message().starts_with("shader compilation failed: Broken("));
        assert!(unit.is_config_dirty());
    }

    // ── preprocessor-aware includes ───────────────────────────────────────

    const FS_BODY: &str = "layout(location = 0) out vec4 o_color;
void main() { o_color = vec4(VALUE); }
";

    fn fragment_unit(code: String, headers: Headers) -> ShaderUnit {
        let mut unit = ShaderUnit::new();
        unit.set_code(code)
            .set_entry_point("main")
            .set_name("Overlay")
            .set_target("ps_1_0")
            .set_include(Some(Rc::new(headers)));
        unit
    }

    #[test]
    fn include_inside_comment_is_ignored() {
        let code = format!("#version 450\n#define VALUE 1.0\n/*\n#include \"old.glsl\"\n*/\n{FS_BODY}");
        let unit = fragment_unit(code, Headers(HashMap::new()));
        assert!(unit.compile().is_ok());
    }

    #[test]
    fn include_follows_unit_macros() {
        let code = format!(
            "#version 450\n#ifdef USE_EXTRA\n#include \"extra.glsl\"\n#else\n#define VALUE 0.0\n#endif\n{FS_BODY}"
        );

        let unit = fragment_unit(code.clone(), Headers(HashMap::new()));
        assert!(unit.compile().is_ok());

        let mut unit = fragment_unit(code, Headers(HashMap::from([("extra.glsl", "#define VALUE 0.5")])));
        unit.add_macro(ShaderMacro::new("USE_EXTRA", "1"));
        assert!(unit.compile().is_ok());

        unit.set_include(Some(Rc::new(Headers(HashMap::new()))));
        let err = unit.compile().unwrap_err();
        assert_eq!(err.status(), CompileStatus::NotFound);
    }

    #[test]
    fn guarded_mutual_includes_compile() {
        let headers = Headers(HashMap::from([
            (
                "a.glsl",
                "#ifndef A_GLSL\n#define A_GLSL\n#include \"b.glsl\"\nfloat a_value() { return 0.25; }\n#endif",
            ),
            (
                "b.glsl",
                "#ifndef B_GLSL\n#define B_GLSL\n#include \"a.glsl\"\nfloat b_value() { return 0.5; }\n#endif",
            ),
        ]));
        let code = format!("#version 450\n#include \"a.glsl\"\n#define VALUE (a_value() + b_value())\n{FS_BODY}");
        let unit = fragment_unit(code, headers);
        assert!(unit.compile().is_ok());
    }

    // ── diagnostics locations ─────────────────────────────────────────────

    #[test]
    fn error_line_refers_to_user_source() {
        let headers = Headers(HashMap::from([("io.glsl", "const float a = 1.0;\nconst float b = 2.0;\nconst float c = 3.0;")]));
        let unit = fragment_unit(
            "#version 450\n#include \"io.glsl\"\nvoid main() { int x = ; }\n".to_string(),
            headers,
        );
        let err = unit.compile().unwrap_err();
        let text = err.diagnostics().unwrap_or_default();
        assert!(text.starts_with("Overlay(3,"), "{text}");
    }

    #[test]
    fn error_line_refers_to_included_file() {
        let headers = Headers(HashMap::from([("bad.glsl", "const float ok = 1.0;\nfloat = ;")]));
        let unit = fragment_unit(
            "#version 450\n#include \"bad.glsl\"\nvoid main() {}\n".to_string(),
            headers,
        );
        let err = unit.compile().unwrap_err();
        let text = err.diagnostics().unwrap_or_default();
        assert!(text.starts_with("bad.glsl(2,"), "{text}");
    }
}
