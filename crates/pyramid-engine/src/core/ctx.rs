use winit::window::{Window, WindowId};

use crate::coords::Viewport;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::render::{RenderCtx, RenderTarget};
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires a frame, calls `draw` with a ready [`RenderCtx`] and
    /// [`RenderTarget`], then presents it.
    ///
    /// Nothing is drawn while the surface is zero-sized. Surface errors are
    /// resolved through [`Gpu::handle_surface_error`]; fatal ones are recorded
    /// on the [`RuntimeCtx`] and stop the loop with an error.
    pub fn render<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&RenderCtx<'_>, &mut RenderTarget<'_>),
    {
        let viewport = Viewport::from(self.gpu.size());
        if !viewport.is_renderable() {
            return AppControl::Continue;
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                let message = err.to_string();
                let action = self.gpu.handle_surface_error(err);
                return apply_surface_action(action, &message, self.runtime);
            }
        };

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            self.gpu.depth_format(),
            viewport,
        );

        // RenderTarget borrows frame.encoder; dropped before submit() takes frame.
        {
            let mut target =
                RenderTarget::new(&mut frame.encoder, &frame.view, self.gpu.depth_view());
            draw(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}

/// Maps a resolved surface error to loop control. Fatal errors are recorded on
/// `runtime` so the loop ends with a failure.
fn apply_surface_action(
    action: SurfaceErrorAction,
    message: &str,
    runtime: &mut RuntimeCtx,
) -> AppControl {
    match action {
        SurfaceErrorAction::Fatal => {
            runtime.fail(anyhow::anyhow!("surface frame acquisition failed: {message}"));
            AppControl::Exit
        }
        SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => AppControl::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── surface error mapping ────────────────────────────────────────────

    #[test]
    fn out_of_memory_fails_the_runtime() {
        let err = wgpu::SurfaceError::OutOfMemory;
        let mut runtime = RuntimeCtx::default();

        let control =
            apply_surface_action(SurfaceErrorAction::classify(&err), &err.to_string(), &mut runtime);

        assert_eq!(control, AppControl::Exit);
        let err = runtime.take_error().expect("fatal error recorded");
        assert!(err.to_string().starts_with("surface frame acquisition failed"));
    }

    #[test]
    fn recoverable_errors_keep_running() {
        for err in [
            wgpu::SurfaceError::Lost,
            wgpu::SurfaceError::Outdated,
            wgpu::SurfaceError::Timeout,
            wgpu::SurfaceError::Other,
        ] {
            let mut runtime = RuntimeCtx::default();
            let control = apply_surface_action(
                SurfaceErrorAction::classify(&err),
                &err.to_string(),
                &mut runtime,
            );
            assert_eq!(control, AppControl::Continue, "{err:?}");
            assert!(runtime.take_error().is_none(), "{err:?}");
        }
    }
}
