use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::render::{Canvas, RenderCtx, RenderTarget};
use crate::shader::{flags, Bytecode, ShaderCompilationError, ShaderMacro, ShaderUnit};

/// Added to sampled alpha so GDI-painted (alpha 0) texels stay visible.
const ALPHA_BIAS: &str = "0.0039215687";

// ── blend ─────────────────────────────────────────────────────────────────

fn overlay_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusDstAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::Zero,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

// ── quad vertex ───────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    position: [f32; 3],
    uv: [f32; 2],
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x2  // uv
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// Bottom-left, top-left, top-right, bottom-right.
const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 0.0] },
    QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Draws a [`Canvas`] as one alpha-blended quad covering the whole target.
///
/// Both stages are [`ShaderUnit`]s compiled every frame. Compilation is a cache
/// hit unless a unit was reconfigured, in which case the pipeline is rebuilt
/// from the fresh bytecode.
pub struct QuadRenderer {
    vertex: ShaderUnit,
    fragment: ShaderUnit,

    pipeline_format: Option<wgpu::TextureFormat>,
    pipeline_shaders: Option<(Bytecode, Bytecode)>,
    pipeline: Option<wgpu::RenderPipeline>,
    bind_group_layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,

    sampler: Option<wgpu::Sampler>,
    texture: Option<wgpu::Texture>,
    texture_view: Option<wgpu::TextureView>,
    texture_size: (u32, u32),

    quad_vbo: Option<wgpu::Buffer>,
    quad_ibo: Option<wgpu::Buffer>,
}

impl Default for QuadRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl QuadRenderer {
    pub fn new() -> Self {
        let debug = if cfg!(debug_assertions) { flags::DEBUG } else { 0 };

        let mut vertex = ShaderUnit::new();
        vertex
            .set_code(include_str!("shaders/quad.vert"))
            .set_name("quad.vert")
            .set_entry_point("main")
            .set_target("vs_1_0")
            .set_flags1(debug);

        let mut fragment = ShaderUnit::new();
        fragment
            .set_code(include_str!("shaders/quad.frag"))
            .set_name("quad.frag")
            .set_entry_point("main")
            .set_target("ps_1_0")
            .add_macro(ShaderMacro::new("ALPHA_BIAS", ALPHA_BIAS))
            .set_flags1(debug);

        Self {
            vertex,
            fragment,
            pipeline_format: None,
            pipeline_shaders: None,
            pipeline: None,
            bind_group_layout: None,
            bind_group: None,
            sampler: None,
            texture: None,
            texture_view: None,
            texture_size: (0, 0),
            quad_vbo: None,
            quad_ibo: None,
        }
    }

    pub fn vertex_shader(&self) -> &ShaderUnit {
        &self.vertex
    }

    /// Reconfiguring the unit triggers a recompile and pipeline rebuild on the next frame.
    pub fn vertex_shader_mut(&mut self) -> &mut ShaderUnit {
        &mut self.vertex
    }

    pub fn fragment_shader(&self) -> &ShaderUnit {
        &self.fragment
    }

    pub fn fragment_shader_mut(&mut self) -> &mut ShaderUnit {
        &mut self.fragment
    }

    /// Uploads `canvas` if it changed and draws it into `target`.
    ///
    /// A shader compilation error leaves the previous pipeline in place and is
    /// returned to the caller.
    pub fn render(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        canvas: &mut Canvas,
    ) -> Result<(), ShaderCompilationError> {
        let vs = self.vertex.compile()?;
        let fs = self.fragment.compile()?;

        self.ensure_pipeline(ctx, vs, fs);
        self.ensure_static_buffers(ctx);
        self.ensure_sampler(ctx);
        self.ensure_texture(ctx, canvas);
        self.upload(ctx, canvas);
        self.ensure_bindings(ctx);

        let Some(pipeline) = self.pipeline.as_ref() else { return Ok(()) };
        let Some(bind_group) = self.bind_group.as_ref() else { return Ok(()) };
        let Some(quad_vbo) = self.quad_vbo.as_ref() else { return Ok(()) };
        let Some(quad_ibo) = self.quad_ibo.as_ref() else { return Ok(()) };

        let mut rpass = target.begin_overlay_pass("quadlay quad pass");

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, quad_vbo.slice(..));
        rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);

        Ok(())
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>, vs: Bytecode, fs: Bytecode) {
        let same_shaders = self
            .pipeline_shaders
            .as_ref()
            .is_some_and(|(v, f)| Arc::ptr_eq(v, &vs) && Arc::ptr_eq(f, &fs));
        if same_shaders && self.pipeline_format == Some(ctx.surface_format) && self.pipeline.is_some() {
            return;
        }
        log::debug!("QuadRenderer: building pipeline for {:?}", ctx.surface_format);

        let vs_module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quadlay quad vs"),
            source: wgpu::util::make_spirv(vs.as_bytes()),
        });
        let fs_module = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quadlay quad fs"),
            source: wgpu::util::make_spirv(fs.as_bytes()),
        });

        let bgl = ctx.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadlay quad bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = ctx.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quadlay quad pipeline layout"),
            bind_group_layouts: &[&bgl],
            immediate_size: 0,
        });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quadlay quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: Some(self.vertex.entry_point()),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: Some(self.fragment.entry_point()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(overlay_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipeline_format = Some(ctx.surface_format);
        self.pipeline_shaders = Some((vs, fs));
        self.pipeline = Some(pipeline);
        self.bind_group_layout = Some(bgl);
        self.bind_group = None;
    }

    fn ensure_texture(&mut self, ctx: &RenderCtx<'_>, canvas: &mut Canvas) {
        let size = (canvas.width().max(1), canvas.height().max(1));
        if self.texture.is_some() && self.texture_size == size {
            return;
        }

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quadlay canvas"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Bgra8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.texture_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.texture = Some(texture);
        self.texture_size = size;
        self.bind_group = None;

        // New texture is empty; force a full upload.
        canvas.mark_dirty();
    }

    fn upload(&mut self, ctx: &RenderCtx<'_>, canvas: &mut Canvas) {
        if canvas.width() == 0 || canvas.height() == 0 || !canvas.take_dirty() {
            return;
        }
        let Some(texture) = self.texture.as_ref() else { return };

        ctx.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            canvas.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(canvas.width() * 4),
                rows_per_image: Some(canvas.height()),
            },
            wgpu::Extent3d {
                width: canvas.width(),
                height: canvas.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn ensure_sampler(&mut self, ctx: &RenderCtx<'_>) {
        if self.sampler.is_some() {
            return;
        }
        self.sampler = Some(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quadlay canvas sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        }));
    }

    fn ensure_bindings(&mut self, ctx: &RenderCtx<'_>) {
        if self.bind_group.is_some() {
            return;
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };
        let Some(view) = self.texture_view.as_ref() else { return };
        let Some(sampler) = self.sampler.as_ref() else { return };

        self.bind_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quadlay quad bind group"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        }));
    }

    fn ensure_static_buffers(&mut self, ctx: &RenderCtx<'_>) {
        if self.quad_vbo.is_some() && self.quad_ibo.is_some() {
            return;
        }

        self.quad_vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadlay quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }));

        self.quad_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quadlay quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangles_share_the_diagonal() {
        assert_eq!(QUAD_INDICES, [0, 1, 2, 2, 3, 0]);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
    }

    #[test]
    fn quad_covers_clip_space_with_flipped_v() {
        let bl = QUAD_VERTICES[0];
        let tr = QUAD_VERTICES[2];
        assert_eq!(bl.position, [-1.0, -1.0, 0.0]);
        assert_eq!(bl.uv, [0.0, 1.0]);
        assert_eq!(tr.position, [1.0, 1.0, 0.0]);
        assert_eq!(tr.uv, [1.0, 0.0]);
    }

    #[test]
    fn blend_keeps_source_alpha() {
        let b = overlay_blend();
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::OneMinusDstAlpha);
        assert_eq!(b.alpha.src_factor, wgpu::BlendFactor::One);
        assert_eq!(b.alpha.dst_factor, wgpu::BlendFactor::Zero);
    }

    // ── shaders ───────────────────────────────────────────────────────────

    #[test]
    fn bundled_shaders_compile() {
        let r = QuadRenderer::new();
        let vs = r.vertex_shader().compile().expect("vertex shader");
        let fs = r.fragment_shader().compile().expect("fragment shader");
        assert!(!vs.is_empty());
        assert!(!fs.is_empty());
        assert!(!r.fragment_shader().is_config_dirty());
    }

    #[test]
    fn fragment_needs_alpha_bias() {
        let mut r = QuadRenderer::new();
        r.fragment_shader_mut().delete_macro("ALPHA_BIAS");
        assert!(r.fragment_shader().compile().is_err());
    }
}
