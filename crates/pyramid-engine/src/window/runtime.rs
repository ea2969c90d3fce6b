use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App as CoreApp, AppControl, FrameCtx, WindowCtx};
use crate::device::{Gpu, GpuInit};
use crate::render::RenderCtx;
use crate::time::{FrameClock, FrameTime};

const FPS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "pyramid".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Runtime context passed to the application.
///
/// Requests are applied after the current callback returns.
#[derive(Debug, Default)]
pub struct RuntimeCtx {
    fatal: Option<anyhow::Error>,
}

impl RuntimeCtx {
    /// Stops the loop once the callback returns; `Runtime::run` yields `err`.
    ///
    /// The first error wins.
    pub fn fail(&mut self, err: anyhow::Error) {
        if self.fatal.is_none() {
            self.fatal = Some(err);
        }
    }

    pub(crate) fn take_error(&mut self) -> Option<anyhow::Error> {
        self.fatal.take()
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window, initializes the app and drives frames until the
    /// window closes.
    ///
    /// Errors raised while creating the window, the GPU context or inside
    /// `App::on_init` stop the loop and are returned here.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

/// Frames presented since the last rate report.
struct FpsCounter {
    since: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            since: Instant::now(),
            frames: 0,
        }
    }

    fn record(&mut self, now: Instant) {
        self.frames += 1;
        let span = now.saturating_duration_since(self.since);
        if span >= FPS_LOG_INTERVAL {
            log::debug!("{:.1} fps", self.frames as f64 / span.as_secs_f64());
            self.since = now;
            self.frames = 0;
        }
    }
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    window: Option<WindowEntry>,
    initialized: bool,
    fps: FpsCounter,

    fatal: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            window: None,
            initialized: false,
            fps: FpsCounter::new(),
            fatal: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::debug!("runtime stopping on error");
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    /// Releases app resources before the GPU context they were created on.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if self.initialized {
            self.app.on_exit();
            self.initialized = false;
        }
        self.window = None;
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();

        WindowEntryTryBuilder {
            clock: FrameClock::new(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init))
                    .context("GPU initialization failed for window")
            },
        }
        .try_build()
    }

    fn init_app(&mut self) -> Result<()> {
        let (app, window) = (&mut self.app, &self.window);
        let Some(entry) = window else {
            anyhow::bail!("no window to initialize against");
        };

        entry.with_gpu(|gpu| {
            let ctx = RenderCtx::new(
                gpu.device(),
                gpu.queue(),
                gpu.surface_format(),
                gpu.depth_format(),
                gpu.size().into(),
            );
            app.on_init(&ctx)
        })?;

        self.initialized = true;
        Ok(())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(entry) = self.window.as_mut() else {
            return;
        };

        log::debug!("resized to {}x{}", new_size.width, new_size.height);
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        self.app.on_resize(new_size.into());
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId) {
        let mut runtime_ctx = RuntimeCtx::default();
        let mut app_control = AppControl::Continue;

        let (app, window, fps) = (&mut self.app, &mut self.window, &mut self.fps);
        let Some(entry) = window.as_mut() else {
            return;
        };

        // Drive one frame.
        entry.with_mut(|fields| {
            let ft: FrameTime = fields.clock.tick();

            let mut ctx = FrameCtx {
                window: WindowCtx {
                    id: window_id,
                    window: fields.window,
                },
                gpu: fields.gpu,
                time: ft,
                runtime: &mut runtime_ctx,
            };

            app_control = app.on_frame(&mut ctx);
            fps.record(ft.now);
        });

        if let Some(err) = runtime_ctx.take_error() {
            self.fail(event_loop, err);
        } else if app_control == AppControl::Exit {
            self.shutdown(event_loop);
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exit_requested {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(entry) => self.window = Some(entry),
            Err(e) => {
                self.fail(event_loop, e.context("failed to create initial window"));
                return;
            }
        }

        if let Err(e) = self.init_app() {
            self.fail(event_loop, e.context("application initialization failed"));
            return;
        }

        if let Some(entry) = self.window.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw: every frame schedules the next one.
        if let Some(entry) = self.window.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(window_id, &event) == AppControl::Exit {
            self.shutdown(event_loop);
            return;
        }

        match &event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => self.resize(*new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(new_size) = self
                    .window
                    .as_ref()
                    .map(|entry| entry.with_window(|w| w.inner_size()))
                {
                    self.resize(new_size);
                }
            }

            WindowEvent::RedrawRequested if self.initialized => {
                self.redraw(event_loop, window_id);
            }

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── RuntimeCtx ───────────────────────────────────────────────────────

    #[test]
    fn runtime_ctx_starts_clean() {
        let mut ctx = RuntimeCtx::default();
        assert!(ctx.take_error().is_none());
    }

    #[test]
    fn runtime_ctx_keeps_first_error() {
        let mut ctx = RuntimeCtx::default();
        ctx.fail(anyhow::anyhow!("first"));
        ctx.fail(anyhow::anyhow!("second"));

        let err = ctx.take_error().expect("error recorded");
        assert_eq!(err.to_string(), "first");
        assert!(ctx.take_error().is_none());
    }

    // ── FpsCounter ───────────────────────────────────────────────────────

    #[test]
    fn fps_counter_resets_after_interval() {
        let mut fps = FpsCounter::new();
        let start = fps.since;

        fps.record(start + Duration::from_millis(500));
        assert_eq!(fps.frames, 1);

        fps.record(start + FPS_LOG_INTERVAL);
        assert_eq!(fps.frames, 0);
        assert_eq!(fps.since, start + FPS_LOG_INTERVAL);
    }
}
