use anyhow::Result;
use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::coords::Viewport;
use crate::render::RenderCtx;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by `window::Runtime`.
///
/// Call order: `on_init` once, then any number of `on_resize` / `on_frame`,
/// then `on_exit` once when the window closes.
pub trait App {
    /// Called once after the window and GPU context exist.
    ///
    /// Returning an error aborts the runtime; `Runtime::run` returns it.
    fn on_init(&mut self, ctx: &RenderCtx<'_>) -> Result<()>;

    /// Called after the surface has been resized.
    fn on_resize(&mut self, viewport: Viewport) {
        let _ = viewport;
    }

    /// Called for window events.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per rendered frame.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called once before the window and GPU context are dropped.
    fn on_exit(&mut self) {}
}
