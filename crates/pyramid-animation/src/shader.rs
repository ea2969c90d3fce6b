//! Shader program: embedded WGSL, per-stage compilation, linking and
//! uniform lookup.
//!
//! Each stage is parsed and validated with naga before wgpu sees it, so a
//! broken shader surfaces as a `ShaderError` with the diagnostic text instead
//! of an unusable pipeline. Linking checks the stage interfaces against the
//! vertex buffer layout and resolves uniform slots by name exactly once.

use std::collections::BTreeSet;

use glam::Mat4;

use pyramid_engine::render::RenderCtx;

use crate::error::{ShaderError, Stage};
use crate::transform::Transforms;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

pub const MODEL_UNIFORM: &str = "model";
pub const VIEW_UNIFORM: &str = "view";
pub const PROJECTION_UNIFORM: &str = "projection";
pub const TEXTURE_UNIFORM: &str = "uTexture";

pub const VERTEX_SHADER: &str = r#"
struct Transforms {
    model: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> transforms: Transforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coords: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(2) texture_coordinates: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = transforms.projection * transforms.view * transforms.model
        * vec4<f32>(position, 1.0);
    out.tex_coords = vec2<f32>(texture_coordinates.x, 1.0 - texture_coordinates.y);
    return out;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"
@group(0) @binding(1) var uTexture: texture_2d<f32>;
@group(0) @binding(2) var uSampler: sampler;

@fragment
fn fs_main(@location(0) tex_coords: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(uTexture, uSampler, tex_coords);
}
"#;

// ── compile ───────────────────────────────────────────────────────────────

/// One validated stage plus the interface reflected from it.
#[derive(Debug)]
pub struct CompiledStage {
    pub stage: Stage,
    pub module: naga::Module,
    /// `@location` inputs of the entry point.
    pub inputs: BTreeSet<u32>,
    /// `@location` outputs of the entry point.
    pub outputs: BTreeSet<u32>,
}

/// Parses and validates `source`, requiring `entry_point` for `stage`.
pub fn compile(
    stage: Stage,
    source: &str,
    entry_point: &'static str,
) -> Result<CompiledStage, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage,
        message: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| ShaderError::Compile {
            stage,
            message: format!("{e:?}"),
        })?;

    let naga_stage = match stage {
        Stage::Vertex => naga::ShaderStage::Vertex,
        Stage::Fragment => naga::ShaderStage::Fragment,
    };

    let ep = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga_stage && ep.name == entry_point)
        .ok_or(ShaderError::MissingEntryPoint { stage, entry_point })?;

    let mut inputs = BTreeSet::new();
    for arg in &ep.function.arguments {
        collect_locations(&module, arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    let mut outputs = BTreeSet::new();
    if let Some(result) = &ep.function.result {
        collect_locations(&module, result.ty, result.binding.as_ref(), &mut outputs);
    }

    Ok(CompiledStage {
        stage,
        module,
        inputs,
        outputs,
    })
}

/// Adds the `@location`s of a value, looking through struct members when the
/// value itself carries no binding.
fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(_) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for m in members {
                    if let Some(naga::Binding::Location { location, .. }) = &m.binding {
                        out.insert(*location);
                    }
                }
            }
        }
    }
}

// ── link ──────────────────────────────────────────────────────────────────

/// Uniform slots and offsets resolved once at link time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformLocations {
    pub transforms_binding: u32,
    pub transforms_size: u32,
    pub model_offset: u32,
    pub view_offset: u32,
    pub projection_offset: u32,
    pub texture_binding: u32,
    pub sampler_binding: u32,
}

impl UniformLocations {
    /// Packs the matrices into the uniform block at their reflected offsets.
    pub fn pack(&self, transforms: &Transforms) -> Vec<u8> {
        let mut block = vec![0u8; self.transforms_size as usize];
        let mut put = |offset: u32, m: &Mat4| {
            let start = offset as usize;
            let bytes = bytemuck::bytes_of(m);
            block[start..start + bytes.len()].copy_from_slice(bytes);
        };
        put(self.model_offset, &transforms.model);
        put(self.view_offset, &transforms.view);
        put(self.projection_offset, &transforms.projection);
        block
    }
}

/// Checks that both stages fit together and with the vertex layout, then
/// resolves the uniform locations.
pub fn link(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
    attributes: &[wgpu::VertexAttribute],
) -> Result<UniformLocations, ShaderError> {
    let provided: BTreeSet<u32> = attributes.iter().map(|a| a.shader_location).collect();

    if let Some(&location) = vertex.inputs.difference(&provided).next() {
        return Err(ShaderError::UnboundAttribute { location });
    }
    if let Some(&location) = provided.difference(&vertex.inputs).next() {
        return Err(ShaderError::UnusedAttribute { location });
    }
    if let Some(&location) = fragment.inputs.difference(&vertex.outputs).next() {
        return Err(ShaderError::UnlinkedVarying { location });
    }

    let modules = [&vertex.module, &fragment.module];

    let (transforms_binding, transforms_size, members) = modules
        .iter()
        .find_map(|m| find_uniform_block(m, MODEL_UNIFORM))
        .ok_or(ShaderError::MissingUniform { name: MODEL_UNIFORM })?;

    // `pack` writes a full mat4x4<f32> at each offset.
    let member_offset = |name: &'static str| {
        let member = members
            .iter()
            .find(|m| m.name == name)
            .ok_or(ShaderError::MissingUniform { name })?;
        if !member.is_mat4 {
            return Err(ShaderError::UniformType {
                name,
                expected: "mat4x4<f32>",
            });
        }
        Ok(member.offset)
    };

    let model_offset = member_offset(MODEL_UNIFORM)?;
    let view_offset = member_offset(VIEW_UNIFORM)?;
    let projection_offset = member_offset(PROJECTION_UNIFORM)?;

    let texture_binding = modules
        .iter()
        .find_map(|m| find_named_global(m, TEXTURE_UNIFORM))
        .ok_or(ShaderError::MissingUniform { name: TEXTURE_UNIFORM })?;

    let sampler_binding = modules
        .iter()
        .find_map(|m| find_sampler(m))
        .ok_or(ShaderError::MissingUniform { name: "sampler" })?;

    for (name, binding) in [
        (MODEL_UNIFORM, transforms_binding),
        (TEXTURE_UNIFORM, texture_binding),
        ("sampler", sampler_binding),
    ] {
        if binding.group != 0 {
            return Err(ShaderError::UnsupportedGroup {
                name,
                group: binding.group,
            });
        }
    }

    Ok(UniformLocations {
        transforms_binding: transforms_binding.binding,
        transforms_size,
        model_offset,
        view_offset,
        projection_offset,
        texture_binding: texture_binding.binding,
        sampler_binding: sampler_binding.binding,
    })
}

/// Uniform-space struct containing a member called `member`:
/// `(binding, block size, [(member name, offset)])`.
/// A named member of a uniform block.
struct BlockMember {
    name: String,
    offset: u32,
    is_mat4: bool,
}

fn find_uniform_block(
    module: &naga::Module,
    member: &str,
) -> Option<(naga::ResourceBinding, u32, Vec<BlockMember>)> {
    module.global_variables.iter().find_map(|(_, var)| {
        if var.space != naga::AddressSpace::Uniform {
            return None;
        }
        let binding = var.binding.clone()?;
        let naga::TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
            return None;
        };
        let members: Vec<BlockMember> = members
            .iter()
            .filter_map(|m| {
                Some(BlockMember {
                    name: m.name.clone()?,
                    offset: m.offset,
                    is_mat4: is_mat4_f32(&module.types[m.ty].inner),
                })
            })
            .collect();
        members
            .iter()
            .any(|m| m.name == member)
            .then_some((binding, *span, members))
    })
}

fn is_mat4_f32(inner: &naga::TypeInner) -> bool {
    matches!(
        inner,
        naga::TypeInner::Matrix {
            columns: naga::VectorSize::Quad,
            rows: naga::VectorSize::Quad,
            scalar,
        } if *scalar == naga::Scalar::F32
    )
}

fn find_named_global(module: &naga::Module, name: &str) -> Option<naga::ResourceBinding> {
    module
        .global_variables
        .iter()
        .find(|(_, var)| var.name.as_deref() == Some(name))
        .and_then(|(_, var)| var.binding.clone())
}

fn find_sampler(module: &naga::Module) -> Option<naga::ResourceBinding> {
    module.global_variables.iter().find_map(|(_, var)| {
        match module.types[var.ty].inner {
            naga::TypeInner::Sampler { comparison: false } => var.binding.clone(),
            _ => None,
        }
    })
}

// ── program ───────────────────────────────────────────────────────────────

/// Linked render pipeline with its bind-group layout and cached uniform slots.
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniforms: UniformLocations,
}

impl ShaderProgram {
    /// Compiles the embedded stages and links them against `vertex_layout`.
    pub fn new(
        ctx: &RenderCtx<'_>,
        vertex_layout: wgpu::VertexBufferLayout<'static>,
    ) -> Result<Self, ShaderError> {
        Self::from_sources(ctx, VERTEX_SHADER, FRAGMENT_SHADER, vertex_layout)
    }

    pub fn from_sources(
        ctx: &RenderCtx<'_>,
        vertex_src: &str,
        fragment_src: &str,
        vertex_layout: wgpu::VertexBufferLayout<'static>,
    ) -> Result<Self, ShaderError> {
        let vertex = compile(Stage::Vertex, vertex_src, VERTEX_ENTRY)?;
        let fragment = compile(Stage::Fragment, fragment_src, FRAGMENT_ENTRY)?;
        let uniforms = link(&vertex, &fragment, vertex_layout.attributes)?;

        let vs = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pyramid vertex shader"),
            source: wgpu::ShaderSource::Wgsl(vertex_src.into()),
        });
        let fs = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pyramid fragment shader"),
            source: wgpu::ShaderSource::Wgsl(fragment_src.into()),
        });

        let bind_group_layout =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("pyramid bgl"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: uniforms.transforms_binding,
                            visibility: wgpu::ShaderStages::VERTEX,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: wgpu::BufferSize::new(
                                    uniforms.transforms_size as u64,
                                ),
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: uniforms.texture_binding,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: uniforms.sampler_binding,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let pipeline_layout =
            ctx.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("pyramid pipeline layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    immediate_size: 0,
                });

        let depth_stencil = ctx.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("pyramid pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            // No culling: face windings are mixed.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        log::info!(
            "shader program linked (transforms @{}, {} @{}, sampler @{})",
            uniforms.transforms_binding,
            TEXTURE_UNIFORM,
            uniforms.texture_binding,
            uniforms.sampler_binding,
        );

        Ok(Self {
            pipeline,
            bind_group_layout,
            uniforms,
        })
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn uniforms(&self) -> &UniformLocations {
        &self.uniforms
    }
}
