//! Application context: window dimensions plus the GPU resources, driven by
//! the engine runtime.

use anyhow::Result;

use pyramid_engine::coords::Viewport;
use pyramid_engine::core::{App, AppControl, FrameCtx};
use pyramid_engine::render::RenderCtx;

use crate::config::{PyramidConfig, WINDOW_HEIGHT, WINDOW_WIDTH};
use crate::geometry::VERTEX_COUNT;
use crate::renderer::{FramePlan, PyramidRenderer};

/// Reports a run failure with its full cause chain.
///
/// Goes through the logger when error records are enabled, otherwise straight
/// to stderr so `RUST_LOG=off` cannot hide why the process exited.
pub fn report_failure(err: &anyhow::Error) {
    let message = failure_message(err);
    if log::log_enabled!(log::Level::Error) {
        log::error!("{message}");
    } else {
        eprintln!("error: {message}");
    }
}

fn failure_message(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

pub struct PyramidApp {
    config: PyramidConfig,
    dimensions: Viewport,
    renderer: Option<PyramidRenderer>,
}

impl PyramidApp {
    pub fn new(config: PyramidConfig) -> Self {
        Self {
            config,
            dimensions: Viewport::new(WINDOW_WIDTH, WINDOW_HEIGHT),
            renderer: None,
        }
    }

    /// Current window dimensions, as last reported by a resize.
    pub fn dimensions(&self) -> Viewport {
        self.dimensions
    }

    /// Plans the frame at `elapsed_ms` against the current dimensions.
    pub fn plan(&self, elapsed_ms: f32) -> FramePlan {
        let vertex_count = self
            .renderer
            .as_ref()
            .map_or(VERTEX_COUNT, PyramidRenderer::vertex_count);
        FramePlan::new(&self.config, elapsed_ms, self.dimensions, vertex_count)
    }
}

impl App for PyramidApp {
    fn on_init(&mut self, ctx: &RenderCtx<'_>) -> Result<()> {
        self.dimensions = ctx.viewport;
        self.renderer = Some(PyramidRenderer::new(ctx, &self.config)?);
        log::info!(
            "pyramid ready at {}x{}",
            self.dimensions.width,
            self.dimensions.height
        );
        Ok(())
    }

    fn on_resize(&mut self, viewport: Viewport) {
        self.dimensions = viewport;
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let plan = self.plan(ctx.time.elapsed_ms());
        let Some(renderer) = self.renderer.as_ref() else {
            return AppControl::Continue;
        };

        ctx.render(|rctx, target| renderer.encode(rctx, target, &plan))
    }

    fn on_exit(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.release();
            log::info!("released GPU buffers");
        }
    }
}
