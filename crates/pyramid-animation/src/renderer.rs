//! Per-frame rendering.
//!
//! A frame is first planned (pure: viewport, clear values, transforms, draw
//! calls) and then encoded into a wgpu render pass. Resources are created once
//! in `PyramidRenderer::new` and never modified afterwards, apart from the
//! uniform block rewritten each frame.

use anyhow::{Context, Result};

use pyramid_engine::coords::Viewport;
use pyramid_engine::render::{RenderCtx, RenderTarget};

use crate::config::PyramidConfig;
use crate::geometry::{PyramidMesh, Vertex};
use crate::shader::ShaderProgram;
use crate::texture::PyramidTexture;
use crate::transform::Transforms;

/// One non-indexed draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DrawCall {
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub instance_count: u32,
}

/// Everything a frame does, computed before any GPU work.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    pub viewport: Viewport,
    pub clear_color: wgpu::Color,
    pub clear_depth: f32,
    pub transforms: Transforms,
    pub draws: Vec<DrawCall>,
}

impl FramePlan {
    pub fn new(
        config: &PyramidConfig,
        elapsed_ms: f32,
        viewport: Viewport,
        vertex_count: u32,
    ) -> Self {
        Self {
            viewport,
            clear_color: config.clear_color,
            clear_depth: 1.0,
            transforms: Transforms::compute(config, elapsed_ms, viewport),
            draws: vec![DrawCall {
                first_vertex: 0,
                vertex_count,
                instance_count: 1,
            }],
        }
    }
}

/// Owns the program, mesh, texture and uniform block for the pyramid.
pub struct PyramidRenderer {
    program: ShaderProgram,
    mesh: PyramidMesh,
    texture: PyramidTexture,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PyramidRenderer {
    /// Builds the program, uploads the geometry and loads the texture, in
    /// that order. Any failure aborts initialization.
    pub fn new(ctx: &RenderCtx<'_>, config: &PyramidConfig) -> Result<Self> {
        let program = ShaderProgram::new(ctx, Vertex::layout())
            .context("failed to build shader program")?;

        let mesh = PyramidMesh::upload(ctx.device);

        let texture = PyramidTexture::load(ctx, &config.texture_path)
            .context("failed to create pyramid texture")?;

        let uniforms = program.uniforms();
        let uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pyramid transforms ubo"),
            size: uniforms.transforms_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pyramid bind group"),
            layout: program.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: uniforms.transforms_binding,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: uniforms.texture_binding,
                    resource: wgpu::BindingResource::TextureView(texture.view()),
                },
                wgpu::BindGroupEntry {
                    binding: uniforms.sampler_binding,
                    resource: wgpu::BindingResource::Sampler(texture.sampler()),
                },
            ],
        });

        Ok(Self {
            program,
            mesh,
            texture,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.mesh.vertex_count()
    }

    /// Uploads the plan's transforms and records its draws into `target`.
    pub fn encode(&self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, plan: &FramePlan) {
        let block = self.program.uniforms().pack(&plan.transforms);
        ctx.queue.write_buffer(&self.uniform_buffer, 0, &block);

        let depth_stencil_attachment =
            target
                .depth_view
                .map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(plan.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pyramid pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(plan.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        // The plan's dimensions can trail the surface by one resize event.
        let (w, h) = plan.viewport.extent_f32();
        let (max_w, max_h) = ctx.viewport.extent_f32();
        let (w, h) = (w.min(max_w), h.min(max_h));
        if plan.viewport.is_renderable() && ctx.viewport.is_renderable() {
            rpass.set_viewport(0.0, 0.0, w, h, 0.0, 1.0);
        }

        rpass.set_pipeline(self.program.pipeline());
        rpass.set_bind_group(0, &self.bind_group, &[]);
        rpass.set_vertex_buffer(0, self.mesh.buffer().slice(..));

        for draw in &plan.draws {
            rpass.draw(
                draw.first_vertex..draw.first_vertex + draw.vertex_count,
                0..draw.instance_count,
            );
        }
    }

    /// Destroys the GPU buffers and texture. The renderer must not be used
    /// afterwards.
    pub fn release(&self) {
        self.mesh.release();
        self.uniform_buffer.destroy();
        self.texture.release();
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::geometry::VERTEX_COUNT;

    fn plan(elapsed_ms: f32, viewport: Viewport) -> FramePlan {
        FramePlan::new(&PyramidConfig::default(), elapsed_ms, viewport, VERTEX_COUNT)
    }

    #[test]
    fn one_draw_of_eighteen_vertices() {
        let p = plan(1_000.0, Viewport::new(800, 600));
        assert_eq!(
            p.draws,
            vec![DrawCall {
                first_vertex: 0,
                vertex_count: 18,
                instance_count: 1,
            }]
        );
    }

    #[test]
    fn clears_to_opaque_black_and_far_depth() {
        let p = plan(0.0, Viewport::new(800, 600));
        assert_eq!(p.clear_color, wgpu::Color::BLACK);
        assert_eq!(p.clear_depth, 1.0);
    }

    #[test]
    fn viewport_follows_window() {
        assert_eq!(plan(0.0, Viewport::new(400, 400)).viewport, Viewport::new(400, 400));
        assert_eq!(plan(0.0, Viewport::new(1024, 768)).viewport, Viewport::new(1024, 768));
    }

    #[test]
    fn model_changes_with_time_view_does_not() {
        let a = plan(0.0, Viewport::new(800, 600));
        let b = plan(500.0, Viewport::new(800, 600));
        assert_ne!(a.transforms.model, b.transforms.model);
        assert_eq!(a.transforms.view, b.transforms.view);
        assert!(a
            .transforms
            .view
            .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)), 1e-6));
    }

    #[test]
    fn planning_is_deterministic() {
        assert_eq!(plan(321.0, Viewport::new(640, 480)), plan(321.0, Viewport::new(640, 480)));
    }

    // ── encode (headless GPU) ────────────────────────────────────────────

    /// A device on any available adapter, or `None` when the machine has no
    /// GPU (software adapters count).
    fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
            .ok()?;

        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("pyramid test device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .ok()
    }

    fn offscreen_view(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("offscreen target"),
                size: wgpu::Extent3d {
                    width: viewport.width,
                    height: viewport.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Encodes and submits one frame of `plan` into fresh targets sized to
    /// `surface`, standing in for the swapchain after a resize.
    fn draw_frame(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        renderer: &PyramidRenderer,
        surface: Viewport,
        plan: &FramePlan,
    ) {
        const COLOR: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
        const DEPTH: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

        let ctx = RenderCtx::new(device, queue, COLOR, Some(DEPTH), surface);
        let color = offscreen_view(device, COLOR, surface);
        let depth = offscreen_view(device, DEPTH, surface);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("pyramid test encoder"),
        });
        {
            let mut target = RenderTarget::new(&mut encoder, &color, Some(&depth));
            renderer.encode(&ctx, &mut target, plan);
        }
        queue.submit(Some(encoder.finish()));
    }

    fn write_texture(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("snhu.jpg");
        image::RgbImage::from_pixel(16, 8, image::Rgb([40, 90, 160]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn frame_encodes_without_validation_errors() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter available; skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig {
            texture_path: write_texture(&dir),
            ..PyramidConfig::default()
        };
        let surface = Viewport::new(800, 600);

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let ctx = RenderCtx::new(
            &device,
            &queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some(wgpu::TextureFormat::Depth32Float),
            surface,
        );
        let renderer = PyramidRenderer::new(&ctx, &config).unwrap();
        assert_eq!(renderer.vertex_count(), 18);

        let plan = FramePlan::new(&config, 1_000.0, surface, renderer.vertex_count());
        assert_eq!(plan.draws.len(), 1);
        draw_frame(&device, &queue, &renderer, surface, &plan);

        let error = pollster::block_on(error_scope.pop());
        assert!(error.is_none(), "validation error: {error:?}");

        renderer.release();
    }

    #[test]
    fn resized_frames_set_a_valid_viewport() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter available; skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let config = PyramidConfig {
            texture_path: write_texture(&dir),
            ..PyramidConfig::default()
        };

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let ctx = RenderCtx::new(
            &device,
            &queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            Some(wgpu::TextureFormat::Depth32Float),
            Viewport::new(800, 600),
        );
        let renderer = PyramidRenderer::new(&ctx, &config).unwrap();

        for size in [Viewport::new(400, 400), Viewport::new(1024, 768)] {
            let plan = FramePlan::new(&config, 250.0, size, renderer.vertex_count());
            draw_frame(&device, &queue, &renderer, size, &plan);
        }

        // A plan still sized for the old window is clamped to the new surface.
        let stale = FramePlan::new(
            &config,
            250.0,
            Viewport::new(1024, 768),
            renderer.vertex_count(),
        );
        draw_frame(&device, &queue, &renderer, Viewport::new(400, 400), &stale);

        let error = pollster::block_on(error_scope.pop());
        assert!(error.is_none(), "validation error: {error:?}");

        renderer.release();
    }
}
